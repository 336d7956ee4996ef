//! Key/value preferences on top of the `preferences` table.
//!
//! Each key holds one JSON document. Values that fail to decode read as absent,
//! so a damaged entry falls back to its default instead of failing the caller.

use rusqlite::OptionalExtension;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::database::{Database, DatabaseError};
use crate::models::{ALL_DAYS, AlarmConfig, AlarmKind};
use crate::utils;

pub mod keys {
    pub const QUOTES_LIST: &str = "quotes_list";
    pub const QUOTES_INITIALIZED: &str = "quotes_initialized";
    pub const CATEGORIES_INITIALIZED: &str = "categories_initialized";
    pub const MOTIVATIONAL_TEXTS: &str = "motivational_texts";

    pub const DAILY_RATINGS: &str = "daily_ratings";
    pub const CATEGORY_RATINGS: &str = "category_ratings";
    pub const LAST_SUCCESS_DATE: &str = "last_success_date";
    pub const SUCCESS_COUNT: &str = "success_count";
    pub const AVERAGE_RATING: &str = "average_rating";
    pub const TOTAL_RATING_DAYS: &str = "total_rating_days";
    pub const EVENING_STEP: &str = "evening_step";

    pub const MORNING_ALARM_TIME: &str = "morning_alarm_time";
    pub const MORNING_ALARM_ENABLED: &str = "morning_alarm_enabled";
    pub const ALARM_HOUR: &str = "alarm_hour";
    pub const ALARM_MINUTE: &str = "alarm_minute";
    pub const SELECTED_DAYS: &str = "selected_days";

    pub const EVENING_ALARM_TIME: &str = "evening_alarm_time";
    pub const EVENING_ALARM_ENABLED: &str = "evening_alarm_enabled";
    pub const EVENING_HOUR: &str = "evening_hour";
    pub const EVENING_MINUTE: &str = "evening_minute";
    pub const EVENING_SELECTED_DAYS: &str = "evening_selected_days";

    pub const VIBRATION_ENABLED: &str = "vibration_enabled";
    pub const ALARM_SOUND_URI: &str = "alarm_sound_uri";

    pub const DARK_MODE: &str = "dark_mode";
    pub const LANGUAGE: &str = "language";
    pub const NOTIFICATIONS_ENABLED: &str = "notifications_enabled";
    pub const AUTO_BACKUP_ENABLED: &str = "auto_backup_enabled";
    pub const LAST_BACKUP_DATE: &str = "last_backup_date";

    pub const USER_EMAIL: &str = "user_email";
    pub const USER_LOGGED_IN: &str = "user_logged_in";
}

/// `yyyy-MM-dd -> rating`
pub type DailyRatings = BTreeMap<String, u8>;
/// `yyyy-MM-dd -> (category id -> rating)`
pub type CategoryRatings = BTreeMap<String, BTreeMap<String, u8>>;

pub const DEFAULT_LANGUAGE: &str = "fa";
const DEFAULT_DISPLAY_NAME: &str = "User";

struct AlarmKeys {
    time: &'static str,
    enabled: &'static str,
    hour: &'static str,
    minute: &'static str,
    days: &'static str,
}

fn alarm_keys(kind: AlarmKind) -> AlarmKeys {
    match kind {
        AlarmKind::Morning => AlarmKeys {
            time: keys::MORNING_ALARM_TIME,
            enabled: keys::MORNING_ALARM_ENABLED,
            hour: keys::ALARM_HOUR,
            minute: keys::ALARM_MINUTE,
            days: keys::SELECTED_DAYS,
        },
        AlarmKind::Evening => AlarmKeys {
            time: keys::EVENING_ALARM_TIME,
            enabled: keys::EVENING_ALARM_ENABLED,
            hour: keys::EVENING_HOUR,
            minute: keys::EVENING_MINUTE,
            days: keys::EVENING_SELECTED_DAYS,
        },
    }
}

fn check_rating(rating: u8) -> Result<(), DatabaseError> {
    if rating > 10 {
        return Err(DatabaseError::RatingOutOfRange(i64::from(rating)));
    }
    Ok(())
}

impl Database {
    pub fn get_pref<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring malformed preference value");
                Ok(None)
            }
        }
    }

    pub fn set_pref<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, json, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    pub fn remove_pref(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM preferences WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
    }

    pub fn has_pref(&self, key: &str) -> Result<bool, DatabaseError> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM preferences WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn pref_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, DatabaseError> {
        Ok(self.get_pref(key)?.unwrap_or(default))
    }

    // --- quotes ---

    pub fn save_quotes(&self, quotes: &[String]) -> Result<(), DatabaseError> {
        self.set_pref(keys::QUOTES_LIST, quotes)?;
        self.set_pref(keys::QUOTES_INITIALIZED, &true)
    }

    pub fn get_quotes(&self) -> Result<Vec<String>, DatabaseError> {
        self.pref_or(keys::QUOTES_LIST, Vec::new())
    }

    pub fn quotes_initialized(&self) -> Result<bool, DatabaseError> {
        self.pref_or(keys::QUOTES_INITIALIZED, false)
    }

    pub fn motivational_texts(&self) -> Result<Vec<String>, DatabaseError> {
        self.pref_or(keys::MOTIVATIONAL_TEXTS, Vec::new())
    }

    pub fn save_motivational_texts(&self, texts: &[String]) -> Result<(), DatabaseError> {
        self.set_pref(keys::MOTIVATIONAL_TEXTS, texts)
    }

    // --- ratings ---

    /// Record the rating for `date`, overwriting any earlier rating of that day
    pub fn save_daily_rating(&self, date: &str, rating: u8) -> Result<(), DatabaseError> {
        check_rating(rating)?;
        let mut ratings = self.get_all_ratings()?;
        ratings.insert(date.to_string(), rating);
        self.set_pref(keys::DAILY_RATINGS, &ratings)
    }

    pub fn get_all_ratings(&self) -> Result<DailyRatings, DatabaseError> {
        self.pref_or(keys::DAILY_RATINGS, DailyRatings::new())
    }

    pub fn save_category_rating(&self, date: &str, category_id: &str, rating: u8) -> Result<(), DatabaseError> {
        check_rating(rating)?;
        let mut ratings = self.get_category_ratings()?;
        ratings
            .entry(date.to_string())
            .or_default()
            .insert(category_id.to_string(), rating);
        self.set_pref(keys::CATEGORY_RATINGS, &ratings)
    }

    pub fn get_category_ratings(&self) -> Result<CategoryRatings, DatabaseError> {
        self.pref_or(keys::CATEGORY_RATINGS, CategoryRatings::new())
    }

    /// Rating of one category on one day, 0 when unrated
    pub fn get_category_rating(&self, date: &str, category_id: &str) -> Result<u8, DatabaseError> {
        Ok(self
            .get_category_ratings()?
            .get(date)
            .and_then(|day| day.get(category_id))
            .copied()
            .unwrap_or(0))
    }

    /// Every rating a category received, in date order
    pub fn ratings_by_category(&self) -> Result<BTreeMap<String, Vec<u8>>, DatabaseError> {
        let mut out: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for day in self.get_category_ratings()?.values() {
            for (id, rating) in day {
                out.entry(id.clone()).or_default().push(*rating);
            }
        }
        Ok(out)
    }

    // --- success counters ---

    pub fn success_count(&self) -> Result<u32, DatabaseError> {
        self.pref_or(keys::SUCCESS_COUNT, 0)
    }

    pub fn set_success_count(&self, count: u32) -> Result<(), DatabaseError> {
        self.set_pref(keys::SUCCESS_COUNT, &count)
    }

    pub fn last_success_date(&self) -> Result<Option<String>, DatabaseError> {
        self.get_pref(keys::LAST_SUCCESS_DATE)
    }

    pub fn set_last_success_date(&self, date: &str) -> Result<(), DatabaseError> {
        self.set_pref(keys::LAST_SUCCESS_DATE, date)
    }

    pub fn average_rating(&self) -> Result<f64, DatabaseError> {
        self.pref_or(keys::AVERAGE_RATING, 0.0)
    }

    pub fn set_average_rating(&self, average: f64) -> Result<(), DatabaseError> {
        self.set_pref(keys::AVERAGE_RATING, &average)
    }

    pub fn total_rating_days(&self) -> Result<u32, DatabaseError> {
        self.pref_or(keys::TOTAL_RATING_DAYS, 0)
    }

    pub fn set_total_rating_days(&self, days: u32) -> Result<(), DatabaseError> {
        self.set_pref(keys::TOTAL_RATING_DAYS, &days)
    }

    // --- evening step ---

    pub fn save_evening_step(&self, step: u8) -> Result<(), DatabaseError> {
        self.set_pref(keys::EVENING_STEP, &step)
    }

    pub fn get_evening_step(&self) -> Result<u8, DatabaseError> {
        self.pref_or(keys::EVENING_STEP, 1)
    }

    pub fn reset_evening_step(&self) -> Result<(), DatabaseError> {
        self.save_evening_step(1)
    }

    // --- alarms ---

    pub fn alarm_config(&self, kind: AlarmKind) -> Result<AlarmConfig, DatabaseError> {
        let k = alarm_keys(kind);
        let default = AlarmConfig::default_for(kind);
        let legacy = self
            .alarm_time_string(kind)?
            .as_deref()
            .and_then(utils::parse_time_of_day);

        Ok(AlarmConfig {
            enabled: self.pref_or(k.enabled, false)?,
            hour: self.pref_or(k.hour, legacy.map_or(default.hour, |(h, _)| h))?,
            minute: self.pref_or(k.minute, legacy.map_or(default.minute, |(_, m)| m))?,
            selected_days: self.pref_or(k.days, ALL_DAYS.to_vec())?,
            sound_uri: self.get_pref(keys::ALARM_SOUND_URI)?,
            vibration: self.pref_or(keys::VIBRATION_ENABLED, true)?,
        })
    }

    pub fn save_alarm_config(&self, kind: AlarmKind, config: &AlarmConfig) -> Result<(), DatabaseError> {
        let k = alarm_keys(kind);
        self.set_alarm_time(kind, config.hour, config.minute)?;
        self.set_pref(k.enabled, &config.enabled)?;
        self.set_pref(k.days, &config.selected_days)?;
        match &config.sound_uri {
            Some(uri) => self.set_pref(keys::ALARM_SOUND_URI, uri)?,
            None => self.remove_pref(keys::ALARM_SOUND_URI)?,
        }
        self.set_pref(keys::VIBRATION_ENABLED, &config.vibration)
    }

    /// Raw "HH:MM" string as last written, if any
    pub fn alarm_time_string(&self, kind: AlarmKind) -> Result<Option<String>, DatabaseError> {
        self.get_pref(alarm_keys(kind).time)
    }

    pub fn set_alarm_enabled(&self, kind: AlarmKind, enabled: bool) -> Result<(), DatabaseError> {
        self.set_pref(alarm_keys(kind).enabled, &enabled)
    }

    pub fn set_alarm_time(&self, kind: AlarmKind, hour: u32, minute: u32) -> Result<(), DatabaseError> {
        let k = alarm_keys(kind);
        self.set_pref(k.time, &utils::format_time_of_day(hour, minute))?;
        self.set_pref(k.hour, &hour)?;
        self.set_pref(k.minute, &minute)
    }

    pub fn set_selected_days(&self, kind: AlarmKind, days: &[u8]) -> Result<(), DatabaseError> {
        let mut days: Vec<u8> = days.iter().copied().filter(|d| ALL_DAYS.contains(d)).collect();
        days.sort_unstable();
        days.dedup();
        self.set_pref(alarm_keys(kind).days, &days)
    }

    /// Installs that stored only a time string get their alarm switched on.
    /// Returns the kinds that were migrated.
    pub fn migrate_old_alarm_settings(&self) -> Result<Vec<AlarmKind>, DatabaseError> {
        let mut migrated = Vec::new();
        for kind in [AlarmKind::Morning, AlarmKind::Evening] {
            let k = alarm_keys(kind);
            let has_time = self
                .alarm_time_string(kind)?
                .is_some_and(|t| !t.trim().is_empty());
            if has_time && !self.has_pref(k.enabled)? {
                self.set_pref(k.enabled, &true)?;
                migrated.push(kind);
            }
        }
        if !migrated.is_empty() {
            tracing::info!(?migrated, "legacy alarm settings migrated");
        }
        Ok(migrated)
    }

    pub fn disable_all_alarms(&self) -> Result<(), DatabaseError> {
        self.set_alarm_enabled(AlarmKind::Morning, false)?;
        self.set_alarm_enabled(AlarmKind::Evening, false)
    }

    pub fn has_active_alarms(&self) -> Result<bool, DatabaseError> {
        Ok(self.alarm_config(AlarmKind::Morning)?.enabled || self.alarm_config(AlarmKind::Evening)?.enabled)
    }

    // --- app preferences ---

    pub fn dark_mode(&self) -> Result<bool, DatabaseError> {
        self.pref_or(keys::DARK_MODE, false)
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<(), DatabaseError> {
        self.set_pref(keys::DARK_MODE, &enabled)
    }

    pub fn language(&self) -> Result<String, DatabaseError> {
        self.pref_or(keys::LANGUAGE, DEFAULT_LANGUAGE.to_string())
    }

    pub fn set_language(&self, language: &str) -> Result<(), DatabaseError> {
        self.set_pref(keys::LANGUAGE, language)
    }

    pub fn notifications_enabled(&self) -> Result<bool, DatabaseError> {
        self.pref_or(keys::NOTIFICATIONS_ENABLED, true)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<(), DatabaseError> {
        self.set_pref(keys::NOTIFICATIONS_ENABLED, &enabled)
    }

    pub fn auto_backup_enabled(&self) -> Result<bool, DatabaseError> {
        self.pref_or(keys::AUTO_BACKUP_ENABLED, false)
    }

    pub fn set_auto_backup_enabled(&self, enabled: bool) -> Result<(), DatabaseError> {
        self.set_pref(keys::AUTO_BACKUP_ENABLED, &enabled)
    }

    pub fn last_backup_date(&self) -> Result<Option<i64>, DatabaseError> {
        self.get_pref(keys::LAST_BACKUP_DATE)
    }

    pub fn set_last_backup_date(&self, millis: i64) -> Result<(), DatabaseError> {
        self.set_pref(keys::LAST_BACKUP_DATE, &millis)
    }

    // --- session ---

    pub fn save_user_email(&self, email: &str) -> Result<(), DatabaseError> {
        self.set_pref(keys::USER_EMAIL, email)
    }

    pub fn user_email(&self) -> Result<Option<String>, DatabaseError> {
        self.get_pref(keys::USER_EMAIL)
    }

    pub fn set_user_logged_in(&self, logged_in: bool) -> Result<(), DatabaseError> {
        self.set_pref(keys::USER_LOGGED_IN, &logged_in)
    }

    pub fn is_user_logged_in(&self) -> Result<bool, DatabaseError> {
        self.pref_or(keys::USER_LOGGED_IN, false)
    }

    pub fn logout_user(&self) -> Result<(), DatabaseError> {
        self.remove_pref(keys::USER_EMAIL)?;
        self.set_user_logged_in(false)
    }

    /// Local part of the stored email with its first letter upper-cased
    pub fn user_display_name(&self) -> Result<String, DatabaseError> {
        let name = self
            .user_email()?
            .and_then(|email| email.split('@').next().map(str::to_string))
            .filter(|local| !local.is_empty());
        Ok(match name {
            Some(local) => {
                let mut chars = local.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => DEFAULT_DISPLAY_NAME.to_string(),
                }
            }
            None => DEFAULT_DISPLAY_NAME.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_read_as_absent() {
        let db = Database::in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO preferences (key, value, updated_at) VALUES (?1, 'not json', 0)",
                rusqlite::params![keys::DAILY_RATINGS],
            )
            .unwrap();
        assert!(db.get_all_ratings().unwrap().is_empty());
        assert!(db.has_pref(keys::DAILY_RATINGS).unwrap());
    }

    #[test]
    fn rerating_a_day_overwrites() {
        let db = Database::in_memory().unwrap();
        db.save_daily_rating("2026-10-19", 4).unwrap();
        db.save_daily_rating("2026-10-19", 9).unwrap();
        let ratings = db.get_all_ratings().unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings["2026-10-19"], 9);
        assert!(matches!(
            db.save_daily_rating("2026-10-19", 11),
            Err(DatabaseError::RatingOutOfRange(11))
        ));
    }

    #[test]
    fn ratings_group_by_category() {
        let db = Database::in_memory().unwrap();
        db.save_category_rating("2026-10-18", "work", 6).unwrap();
        db.save_category_rating("2026-10-19", "work", 8).unwrap();
        db.save_category_rating("2026-10-19", "health", 3).unwrap();
        let grouped = db.ratings_by_category().unwrap();
        assert_eq!(grouped["work"], vec![6, 8]);
        assert_eq!(grouped["health"], vec![3]);
        assert_eq!(db.get_category_rating("2026-10-17", "work").unwrap(), 0);
    }

    #[test]
    fn evening_step_defaults_to_one() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_evening_step().unwrap(), 1);
        db.save_evening_step(2).unwrap();
        assert_eq!(db.get_evening_step().unwrap(), 2);
        db.reset_evening_step().unwrap();
        assert_eq!(db.get_evening_step().unwrap(), 1);
    }

    #[test]
    fn alarm_defaults_and_round_trip() {
        let db = Database::in_memory().unwrap();
        let morning = db.alarm_config(AlarmKind::Morning).unwrap();
        assert_eq!((morning.hour, morning.minute, morning.enabled), (7, 0, false));
        assert_eq!(db.alarm_config(AlarmKind::Evening).unwrap().hour, 21);

        db.set_alarm_time(AlarmKind::Evening, 22, 15).unwrap();
        db.set_selected_days(AlarmKind::Evening, &[6, 2, 2, 9]).unwrap();
        let evening = db.alarm_config(AlarmKind::Evening).unwrap();
        assert_eq!((evening.hour, evening.minute), (22, 15));
        assert_eq!(evening.selected_days, vec![2, 6]);
        assert_eq!(db.alarm_time_string(AlarmKind::Evening).unwrap().as_deref(), Some("22:15"));
    }

    #[test]
    fn legacy_time_string_enables_alarm_once() {
        let db = Database::in_memory().unwrap();
        db.set_pref(keys::MORNING_ALARM_TIME, "06:30").unwrap();
        assert_eq!(db.migrate_old_alarm_settings().unwrap(), vec![AlarmKind::Morning]);
        let cfg = db.alarm_config(AlarmKind::Morning).unwrap();
        assert!(cfg.enabled);
        assert_eq!((cfg.hour, cfg.minute), (6, 30));
        assert!(db.has_active_alarms().unwrap());

        db.set_alarm_enabled(AlarmKind::Morning, false).unwrap();
        assert!(db.migrate_old_alarm_settings().unwrap().is_empty());
        assert!(!db.has_active_alarms().unwrap());
    }

    #[test]
    fn display_name_capitalises_local_part() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.user_display_name().unwrap(), "User");
        db.save_user_email("sara.k@example.com").unwrap();
        assert_eq!(db.user_display_name().unwrap(), "Sara.k");
        db.logout_user().unwrap();
        assert_eq!(db.user_email().unwrap(), None);
        assert!(!db.is_user_logged_in().unwrap());
    }

    #[test]
    fn app_preference_defaults() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.language().unwrap(), "fa");
        assert!(db.notifications_enabled().unwrap());
        assert!(!db.auto_backup_enabled().unwrap());
        assert!(!db.dark_mode().unwrap());
    }
}
