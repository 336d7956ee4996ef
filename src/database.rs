use chrono::{DateTime, NaiveDate, TimeZone, Weekday};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Task, TaskCategory, TaskPriority, TimePeriod};
use crate::prefs::keys;
use crate::utils;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Failed to encode preference value: {0}")]
    EncodeError(#[from] serde_json::Error),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Rating out of range (0-10): {0}")]
    RatingOutOfRange(i64),
}

pub struct Database {
    conn: Connection,
}

const TASK_COLUMNS: &str = "id, title, description, category_id, time_period, is_completed, completion_date, \
     created_at, due_date, priority, rating, notes, moved_from_date";

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        let db = Database { conn };
        db.initialize_schema()?;
        tracing::debug!(path = %db_path.display(), "database opened");

        Ok(db)
    }

    /// Open a throwaway in-memory database with the full schema
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let db = Database { conn: Connection::open_in_memory()? };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id               TEXT PRIMARY KEY,
                title            TEXT NOT NULL,
                description      TEXT NOT NULL DEFAULT '',
                category_id      TEXT NOT NULL DEFAULT '',
                time_period      TEXT NOT NULL DEFAULT 'today',
                is_completed     INTEGER NOT NULL DEFAULT 0,
                completion_date  INTEGER,
                created_at       INTEGER NOT NULL,
                due_date         INTEGER,
                priority         TEXT NOT NULL DEFAULT 'normal',
                rating           INTEGER NOT NULL DEFAULT 0,
                notes            TEXT NOT NULL DEFAULT '',
                moved_from_date  TEXT
            );

            CREATE TABLE IF NOT EXISTS categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                color       TEXT NOT NULL DEFAULT '',
                icon        TEXT NOT NULL DEFAULT '📌',
                is_default  INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL,
                \"order\"     INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS preferences (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduled_alarms (
                kind        TEXT NOT NULL,
                weekday     INTEGER,
                trigger_at  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_category_id ON tasks(category_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            CREATE INDEX IF NOT EXISTS idx_scheduled_alarms_trigger ON scheduled_alarms(trigger_at);",
        )?;
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        let period: String = row.get(4)?;
        let priority: String = row.get(9)?;
        let rating: i64 = row.get(10)?;
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category_id: row.get(3)?,
            time_period: TimePeriod::parse(&period).unwrap_or_default(),
            is_completed: row.get::<_, i64>(5)? != 0,
            completion_date: row.get(6)?,
            created_at: row.get(7)?,
            due_date: row.get(8)?,
            priority: TaskPriority::parse(&priority).unwrap_or_default(),
            rating: rating.clamp(0, 10) as u8,
            notes: row.get(11)?,
            moved_from_date: row.get(12)?,
        })
    }

    fn row_to_category(row: &rusqlite::Row) -> Result<TaskCategory, rusqlite::Error> {
        Ok(TaskCategory {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            icon: row.get(3)?,
            is_default: row.get::<_, i64>(4)? != 0,
            created_at: row.get(5)?,
            order: row.get(6)?,
        })
    }

    fn upsert_task(conn: &Connection, task: &Task) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO tasks (id, title, description, category_id, time_period, is_completed, completion_date,
                                created_at, due_date, priority, rating, notes, moved_from_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title, description = excluded.description,
                category_id = excluded.category_id, time_period = excluded.time_period,
                is_completed = excluded.is_completed, completion_date = excluded.completion_date,
                created_at = excluded.created_at, due_date = excluded.due_date,
                priority = excluded.priority, rating = excluded.rating,
                notes = excluded.notes, moved_from_date = excluded.moved_from_date",
            rusqlite::params![
                task.id,
                task.title,
                task.description,
                task.category_id,
                task.time_period.as_str(),
                if task.is_completed { 1 } else { 0 },
                task.completion_date,
                task.created_at,
                task.due_date,
                task.priority.as_str(),
                i64::from(task.rating.min(10)),
                task.notes,
                task.moved_from_date,
            ],
        )?;
        Ok(())
    }

    fn upsert_category(conn: &Connection, category: &TaskCategory) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO categories (id, name, color, icon, is_default, created_at, \"order\")
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, color = excluded.color, icon = excluded.icon,
                is_default = excluded.is_default, created_at = excluded.created_at,
                \"order\" = excluded.\"order\"",
            rusqlite::params![
                category.id,
                category.name,
                category.color,
                category.icon,
                if category.is_default { 1 } else { 0 },
                category.created_at,
                category.order,
            ],
        )?;
        Ok(())
    }

    // --- tasks ---

    /// Insert or replace a task by id
    pub fn save_task(&self, task: &Task) -> Result<(), DatabaseError> {
        Self::upsert_task(&self.conn, task)?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, DatabaseError> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                rusqlite::params![id],
                Self::row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// All tasks, oldest first
    pub fn get_all_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM tasks ORDER BY created_at ASC, id ASC", TASK_COLUMNS))?;
        let tasks = stmt.query_map([], Self::row_to_task)?.collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn delete_task(&self, id: &str) -> Result<bool, DatabaseError> {
        let removed = self.conn.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        Ok(removed > 0)
    }

    pub fn delete_tasks_in_category(&self, category_id: &str) -> Result<usize, DatabaseError> {
        let removed = self
            .conn
            .execute("DELETE FROM tasks WHERE category_id = ?1", rusqlite::params![category_id])?;
        Ok(removed)
    }

    /// Tasks of one category filed under `period` whose creation time falls in that period
    pub fn tasks_for_period<Tz: TimeZone>(
        &self,
        category_id: &str,
        period: TimePeriod,
        now: &DateTime<Tz>,
        week_start: Weekday,
    ) -> Result<Vec<Task>, DatabaseError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE category_id = ?1 AND time_period = ?2 ORDER BY created_at ASC",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(rusqlite::params![category_id, period.as_str()], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks
            .into_iter()
            .filter(|t| period.contains_at(t.created_at, now, week_start))
            .collect())
    }

    /// Tasks filed under Today that were created on today's date
    pub fn today_tasks<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<Task>, DatabaseError>
    where
        Tz::Offset: std::fmt::Display,
    {
        Ok(self
            .get_all_tasks()?
            .into_iter()
            .filter(|t| t.time_period == TimePeriod::Today && t.is_today(now))
            .collect())
    }

    /// Tasks of any period created on `date`, read in the timezone of `reference`
    pub fn tasks_for_date<Tz: TimeZone>(&self, date: NaiveDate, reference: &DateTime<Tz>) -> Result<Vec<Task>, DatabaseError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let key = date.format(utils::DATE_KEY_FORMAT).to_string();
        Ok(self
            .get_all_tasks()?
            .into_iter()
            .filter(|t| utils::date_key_of_millis(t.created_at, reference).as_deref() == Some(key.as_str()))
            .collect())
    }

    pub fn incomplete_today_tasks<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<Task>, DatabaseError>
    where
        Tz::Offset: std::fmt::Display,
    {
        Ok(self.today_tasks(now)?.into_iter().filter(|t| !t.is_completed).collect())
    }

    /// Persist a copy of `task` dated tomorrow and return it; the original row stays
    pub fn move_task_to_tomorrow<Tz: TimeZone>(&self, task: &Task, now: &DateTime<Tz>) -> Result<Task, DatabaseError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let moved = task.moved_to_tomorrow(now);
        self.save_task(&moved)?;
        tracing::debug!(from = %task.id, to = %moved.id, "task moved to tomorrow");
        Ok(moved)
    }

    pub fn set_task_completed(&self, id: &str, completed: bool, now_millis: i64) -> Result<Task, DatabaseError> {
        let mut task = self
            .get_task(id)?
            .ok_or_else(|| DatabaseError::TaskNotFound(id.to_string()))?;
        if completed {
            task.mark_completed(now_millis);
        } else {
            task.mark_incomplete();
        }
        self.save_task(&task)?;
        Ok(task)
    }

    // --- categories ---

    pub fn save_category(&self, category: &TaskCategory) -> Result<(), DatabaseError> {
        Self::upsert_category(&self.conn, category)?;
        self.set_pref(keys::CATEGORIES_INITIALIZED, &true)?;
        Ok(())
    }

    pub fn get_categories(&self) -> Result<Vec<TaskCategory>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, icon, is_default, created_at, \"order\"
             FROM categories ORDER BY \"order\" ASC, created_at ASC",
        )?;
        let categories = stmt.query_map([], Self::row_to_category)?.collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_category(&self, id: &str) -> Result<Option<TaskCategory>, DatabaseError> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, color, icon, is_default, created_at, \"order\" FROM categories WHERE id = ?1",
                rusqlite::params![id],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Delete a category and every task filed under it, atomically
    pub fn delete_category(&self, id: &str) -> Result<usize, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM categories WHERE id = ?1", rusqlite::params![id])?;
        let tasks_removed = tx.execute("DELETE FROM tasks WHERE category_id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        tracing::info!(category = id, tasks_removed, "category deleted");
        Ok(tasks_removed)
    }

    /// Seed the default categories on an empty install; returns how many were created
    pub fn create_default_categories_if_needed(&self, now_millis: i64) -> Result<usize, DatabaseError> {
        if !self.get_categories()?.is_empty() {
            return Ok(0);
        }
        let defaults = TaskCategory::defaults(now_millis);
        for category in &defaults {
            self.save_category(category)?;
        }
        Ok(defaults.len())
    }

    /// Replace every task and category. The caller owns the surrounding transaction.
    pub(crate) fn replace_tasks_and_categories(
        &self,
        tasks: &[Task],
        categories: &[TaskCategory],
    ) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM tasks", [])?;
        self.conn.execute("DELETE FROM categories", [])?;
        for category in categories {
            Self::upsert_category(&self.conn, category)?;
        }
        for task in tasks {
            Self::upsert_task(&self.conn, task)?;
        }
        Ok(())
    }

    // --- maintenance ---

    /// Wipe every table, including preferences
    pub fn clear_all_data(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch(
            "DELETE FROM tasks; DELETE FROM categories; DELETE FROM preferences; DELETE FROM scheduled_alarms;",
        )?;
        tracing::warn!("all data cleared");
        Ok(())
    }

    /// Remove tasks, categories and category ratings; daily ratings and settings survive
    pub fn clear_task_data(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch("DELETE FROM tasks; DELETE FROM categories;")?;
        self.remove_pref(keys::CATEGORY_RATINGS)?;
        self.reset_evening_step()?;
        Ok(())
    }

    /// Drop malformed and orphaned records, returning a description of each fix applied
    pub fn validate_and_repair(&self) -> Result<Vec<String>, DatabaseError> {
        let mut issues = Vec::new();

        let invalid_tasks = self.conn.execute("DELETE FROM tasks WHERE id = '' OR trim(title) = ''", [])?;
        if invalid_tasks > 0 {
            issues.push(format!("{} invalid task(s) removed", invalid_tasks));
        }

        let invalid_categories = self
            .conn
            .execute("DELETE FROM categories WHERE id = '' OR trim(name) = ''", [])?;
        if invalid_categories > 0 {
            issues.push(format!("{} invalid categor(ies) removed", invalid_categories));
        }

        let step = self.get_evening_step()?;
        if !(1..=3).contains(&step) {
            self.reset_evening_step()?;
            issues.push("evening step reset to 1".to_string());
        }

        let orphans = self.conn.execute(
            "DELETE FROM tasks WHERE category_id != '' AND category_id NOT IN (SELECT id FROM categories)",
            [],
        )?;
        if orphans > 0 {
            issues.push(format!("{} task(s) without a valid category removed", orphans));
        }

        let valid_ids: HashSet<String> = self.get_categories()?.into_iter().map(|c| c.id).collect();
        let ratings = self.get_category_ratings()?;
        let cleaned: std::collections::BTreeMap<_, _> = ratings
            .iter()
            .map(|(date, day)| {
                let kept: std::collections::BTreeMap<String, u8> = day
                    .iter()
                    .filter(|(id, _)| valid_ids.contains(*id))
                    .map(|(id, r)| (id.clone(), *r))
                    .collect();
                (date.clone(), kept)
            })
            .filter(|(_, day)| !day.is_empty())
            .collect();
        if cleaned != ratings {
            self.set_pref(keys::CATEGORY_RATINGS, &cleaned)?;
            issues.push("ratings for unknown categories removed".to_string());
        }

        if !issues.is_empty() {
            tracing::warn!(?issues, "stored data repaired");
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap()
    }

    fn task_in(db: &Database, category: &str, title: &str) -> Task {
        let task = Task::new(title.into(), category.into(), TimePeriod::Today, now().timestamp_millis());
        db.save_task(&task).unwrap();
        task
    }

    #[test]
    fn save_task_upserts_by_id() {
        let db = Database::in_memory().unwrap();
        let mut task = task_in(&db, "", "Walk");
        task.title = "Walk the dog".into();
        db.save_task(&task).unwrap();

        let all = db.get_all_tasks().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Walk the dog");
    }

    #[test]
    fn deleting_category_cascades_to_its_tasks() {
        let db = Database::in_memory().unwrap();
        let keep = TaskCategory::new("Work".into(), "#2196F3".into(), 0);
        let drop = TaskCategory::new("Health".into(), "#4CAF50".into(), 0);
        db.save_category(&keep).unwrap();
        db.save_category(&drop).unwrap();
        task_in(&db, &keep.id, "Report");
        task_in(&db, &drop.id, "Run");
        task_in(&db, &drop.id, "Stretch");

        assert_eq!(db.delete_category(&drop.id).unwrap(), 2);
        let remaining = db.get_all_tasks().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|t| t.category_id != drop.id));
        assert!(db.get_category(&drop.id).unwrap().is_none());
    }

    #[test]
    fn today_tasks_excludes_other_days_and_periods() {
        let db = Database::in_memory().unwrap();
        let today = task_in(&db, "", "Today");
        let mut yesterday = Task::new("Old".into(), String::new(), TimePeriod::Today, now().timestamp_millis());
        yesterday.created_at -= crate::utils::DAY_MILLIS;
        db.save_task(&yesterday).unwrap();
        let week = Task::new("Week".into(), String::new(), TimePeriod::ThisWeek, now().timestamp_millis());
        db.save_task(&week).unwrap();

        let found = db.today_tasks(&now()).unwrap();
        assert_eq!(found, vec![today]);
    }

    #[test]
    fn tasks_for_date_ignores_period() {
        let db = Database::in_memory().unwrap();
        let today = task_in(&db, "", "Today");
        let week = Task::new("Week".into(), String::new(), TimePeriod::ThisWeek, now().timestamp_millis());
        db.save_task(&week).unwrap();
        let mut earlier = Task::new("Earlier".into(), String::new(), TimePeriod::Today, now().timestamp_millis());
        earlier.created_at -= 3 * crate::utils::DAY_MILLIS;
        db.save_task(&earlier).unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let ids: Vec<_> = db.tasks_for_date(date, &now()).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&today.id) && ids.contains(&week.id));

        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(db.tasks_for_date(date, &now()).unwrap(), vec![earlier]);
    }

    #[test]
    fn move_to_tomorrow_keeps_original() {
        let db = Database::in_memory().unwrap();
        let task = task_in(&db, "", "Write");
        let moved = db.move_task_to_tomorrow(&task, &now()).unwrap();
        assert_eq!(db.get_all_tasks().unwrap().len(), 2);
        assert!(db.today_tasks(&now()).unwrap().iter().all(|t| t.id != moved.id));
    }

    #[test]
    fn default_categories_seed_once() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.create_default_categories_if_needed(0).unwrap(), 4);
        assert_eq!(db.create_default_categories_if_needed(0).unwrap(), 0);
        let names: Vec<_> = db.get_categories().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Health", "Work", "Education", "Personal"]);
    }

    #[test]
    fn repair_drops_orphans_and_stale_ratings() {
        let db = Database::in_memory().unwrap();
        let cat = TaskCategory::new("Work".into(), "#000".into(), 0);
        db.save_category(&cat).unwrap();
        task_in(&db, &cat.id, "ok");
        task_in(&db, "ghost", "orphan");
        task_in(&db, "", "uncategorised");
        db.save_category_rating("2026-10-19", &cat.id, 7).unwrap();
        db.save_category_rating("2026-10-18", "ghost", 3).unwrap();
        db.save_evening_step(9).unwrap();

        let issues = db.validate_and_repair().unwrap();
        assert_eq!(issues.len(), 3);
        assert_eq!(db.get_all_tasks().unwrap().len(), 2);
        assert_eq!(db.get_evening_step().unwrap(), 1);
        let ratings = db.get_category_ratings().unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(db.get_category_rating("2026-10-19", &cat.id).unwrap(), 7);

        assert!(db.validate_and_repair().unwrap().is_empty());
    }
}
