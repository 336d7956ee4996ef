//! Whole-app JSON backups.
//!
//! The document layout is shared with earlier releases, so field names are camelCase
//! and rating maps that older files lack default to empty.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::database::{Database, DatabaseError};
use crate::models::{ALL_DAYS, AlarmKind, Task, TaskCategory};
use crate::prefs::{CategoryRatings, DailyRatings};
use crate::utils;

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed backup file: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid backup data: {0}")]
    InvalidData(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettings {
    pub is_alarm_enabled: bool,
    pub alarm_hour: u32,
    pub alarm_minute: u32,
    pub selected_days: Vec<u8>,
    pub is_vibration_enabled: bool,
    pub alarm_sound_uri: Option<String>,
    #[serde(default)]
    pub motivational_texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EveningSettings {
    pub is_evening_enabled: bool,
    pub evening_hour: u32,
    pub evening_minute: u32,
    pub current_step: u8,
    pub success_count: u32,
    #[serde(default)]
    pub selected_days: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsData {
    pub total_tasks_created: usize,
    pub total_tasks_completed: usize,
    /// category id -> every rating it received
    pub category_ratings: BTreeMap<String, Vec<u8>>,
    pub last_backup_date: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPreferences {
    pub is_dark_mode: bool,
    pub language: String,
    pub notifications_enabled: bool,
    pub auto_backup_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub created_at: i64,
    pub device_info: String,
    pub tasks: Vec<Task>,
    pub categories: Vec<TaskCategory>,
    pub alarm_settings: AlarmSettings,
    pub evening_settings: EveningSettings,
    pub statistics: StatisticsData,
    pub preferences: AppPreferences,
    #[serde(default)]
    pub daily_ratings: DailyRatings,
    #[serde(default)]
    pub category_ratings: CategoryRatings,
}

impl BackupDocument {
    /// Tasks need an id and a title, categories an id and a name. Alarm times
    /// must be real clock times and days must fall in 1 (Sunday)..=7.
    pub fn validate(&self) -> Result<(), BackupError> {
        let alarm = &self.alarm_settings;
        check_alarm("alarm", alarm.alarm_hour, alarm.alarm_minute, &alarm.selected_days)?;
        let evening = &self.evening_settings;
        check_alarm(
            "evening",
            evening.evening_hour,
            evening.evening_minute,
            &evening.selected_days,
        )?;

        if let Some(task) = self.tasks.iter().find(|t| t.id.is_empty() || t.title.is_empty()) {
            return Err(BackupError::InvalidData(format!(
                "task '{}' is missing its id or title",
                task.id
            )));
        }
        if let Some(category) = self
            .categories
            .iter()
            .find(|c| c.id.is_empty() || c.name.is_empty())
        {
            return Err(BackupError::InvalidData(format!(
                "category '{}' is missing its id or name",
                category.id
            )));
        }
        Ok(())
    }
}

fn check_alarm(name: &str, hour: u32, minute: u32, days: &[u8]) -> Result<(), BackupError> {
    if hour > 23 || minute > 59 {
        return Err(BackupError::InvalidData(format!(
            "{} time {:02}:{:02} is out of range",
            name, hour, minute
        )));
    }
    if let Some(day) = days.iter().find(|d| !ALL_DAYS.contains(d)) {
        return Err(BackupError::InvalidData(format!("{} day {} is not a weekday", name, day)));
    }
    Ok(())
}

fn device_info() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Snapshot everything the app stores
pub fn create_backup(db: &Database, now_millis: i64) -> Result<BackupDocument, BackupError> {
    let tasks = db.get_all_tasks()?;
    let morning = db.alarm_config(AlarmKind::Morning)?;
    let evening = db.alarm_config(AlarmKind::Evening)?;

    Ok(BackupDocument {
        version: BACKUP_VERSION.to_string(),
        created_at: now_millis,
        device_info: device_info(),
        categories: db.get_categories()?,
        alarm_settings: AlarmSettings {
            is_alarm_enabled: morning.enabled,
            alarm_hour: morning.hour,
            alarm_minute: morning.minute,
            selected_days: morning.selected_days,
            is_vibration_enabled: morning.vibration,
            alarm_sound_uri: morning.sound_uri,
            motivational_texts: db.motivational_texts()?,
        },
        evening_settings: EveningSettings {
            is_evening_enabled: evening.enabled,
            evening_hour: evening.hour,
            evening_minute: evening.minute,
            current_step: db.get_evening_step()?,
            success_count: db.success_count()?,
            selected_days: evening.selected_days,
        },
        statistics: StatisticsData {
            total_tasks_created: tasks.len(),
            total_tasks_completed: tasks.iter().filter(|t| t.is_completed).count(),
            category_ratings: db.ratings_by_category()?,
            last_backup_date: now_millis,
        },
        preferences: AppPreferences {
            is_dark_mode: db.dark_mode()?,
            language: db.language()?,
            notifications_enabled: db.notifications_enabled()?,
            auto_backup_enabled: db.auto_backup_enabled()?,
        },
        daily_ratings: db.get_all_ratings()?,
        category_ratings: db.get_category_ratings()?,
        tasks,
    })
}

/// Replace the stored data with `doc`. Everything happens in one transaction.
pub fn restore(db: &Database, doc: &BackupDocument) -> Result<(), BackupError> {
    doc.validate()?;

    let tx = db.conn().unchecked_transaction()?;
    db.replace_tasks_and_categories(&doc.tasks, &doc.categories)?;
    db.set_pref(crate::prefs::keys::DAILY_RATINGS, &doc.daily_ratings)?;
    db.set_pref(crate::prefs::keys::CATEGORY_RATINGS, &doc.category_ratings)?;

    let alarm = &doc.alarm_settings;
    let mut morning = db.alarm_config(AlarmKind::Morning)?;
    morning.enabled = alarm.is_alarm_enabled;
    morning.hour = alarm.alarm_hour;
    morning.minute = alarm.alarm_minute;
    morning.selected_days = alarm.selected_days.clone();
    morning.vibration = alarm.is_vibration_enabled;
    if alarm.alarm_sound_uri.is_some() {
        morning.sound_uri = alarm.alarm_sound_uri.clone();
    }
    db.save_alarm_config(AlarmKind::Morning, &morning)?;
    db.save_motivational_texts(&alarm.motivational_texts)?;

    let evening_settings = &doc.evening_settings;
    let mut evening = db.alarm_config(AlarmKind::Evening)?;
    evening.enabled = evening_settings.is_evening_enabled;
    evening.hour = evening_settings.evening_hour;
    evening.minute = evening_settings.evening_minute;
    if !evening_settings.selected_days.is_empty() {
        evening.selected_days = evening_settings.selected_days.clone();
    }
    db.save_alarm_config(AlarmKind::Evening, &evening)?;
    db.save_evening_step(evening_settings.current_step)?;
    db.set_success_count(evening_settings.success_count)?;

    let prefs = &doc.preferences;
    db.set_dark_mode(prefs.is_dark_mode)?;
    db.set_language(&prefs.language)?;
    db.set_notifications_enabled(prefs.notifications_enabled)?;
    db.set_auto_backup_enabled(prefs.auto_backup_enabled)?;

    tx.commit()?;
    tracing::info!(
        tasks = doc.tasks.len(),
        categories = doc.categories.len(),
        "backup restored"
    );
    Ok(())
}

pub fn export_to_file(db: &Database, path: &Path, now_millis: i64) -> Result<BackupDocument, BackupError> {
    let doc = create_backup(db, now_millis)?;
    let json = serde_json::to_string_pretty(&doc)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, json)?;
    db.set_last_backup_date(now_millis)?;
    tracing::info!(path = %path.display(), "backup written");
    Ok(doc)
}

pub fn read_backup(path: &Path) -> Result<(BackupDocument, u64), BackupError> {
    let json = std::fs::read_to_string(path)?;
    let doc = serde_json::from_str(&json)?;
    Ok((doc, json.len() as u64))
}

pub fn import_from_file(db: &Database, path: &Path) -> Result<BackupDocument, BackupError> {
    let (doc, _) = read_backup(path)?;
    restore(db, &doc)?;
    Ok(doc)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub version: String,
    pub created_at: i64,
    pub device_info: String,
    pub tasks_count: usize,
    pub categories_count: usize,
    pub file_size: u64,
}

impl BackupInfo {
    pub fn formatted_file_size(&self) -> String {
        format_file_size(self.file_size)
    }

    pub fn formatted_date<Tz: TimeZone>(&self, reference: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        utils::format_millis(self.created_at, reference)
    }
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} MB", bytes / (1024 * 1024))
    }
}

pub fn backup_info(path: &Path) -> Result<BackupInfo, BackupError> {
    let (doc, file_size) = read_backup(path)?;
    Ok(BackupInfo {
        version: doc.version,
        created_at: doc.created_at,
        device_info: doc.device_info,
        tasks_count: doc.tasks.len(),
        categories_count: doc.categories.len(),
        file_size,
    })
}

/// `Power_App_Backup_yyyy-MM-dd_HH-mm.json`
pub fn generate_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Power_App_Backup_{}.json", now.format("%Y-%m-%d_%H-%M"))
}
