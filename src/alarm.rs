use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use thiserror::Error;

use crate::database::{Database, DatabaseError};
use crate::models::{ALL_DAYS, AlarmConfig, AlarmKind};

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("Hour must be between 0 and 23, got {0}")]
    InvalidHour(u32),
    #[error("Minute must be between 0 and 59, got {0}")]
    InvalidMinute(u32),
    #[error("Weekday must be between 1 (Sunday) and 7 (Saturday), got {0}")]
    InvalidWeekday(u8),
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
}

fn validate_time(hour: u32, minute: u32) -> Result<(), AlarmError> {
    if hour > 23 {
        return Err(AlarmError::InvalidHour(hour));
    }
    if minute > 59 {
        return Err(AlarmError::InvalidMinute(minute));
    }
    Ok(())
}

fn at_time<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32, minute: u32) -> Result<DateTime<Tz>, AlarmError> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or(AlarmError::InvalidHour(hour))?;
    Ok(tz
        .from_local_datetime(&naive)
        .earliest()
        // wall-clock time skipped by a DST jump
        .unwrap_or_else(|| tz.from_utc_datetime(&naive)))
}

/// Today at `hour:minute:00`, or tomorrow when that moment is already behind `now`
pub fn next_trigger<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Result<DateTime<Tz>, AlarmError> {
    validate_time(hour, minute)?;
    let tz = now.timezone();
    let today = at_time(&tz, now.date_naive(), hour, minute)?;
    if today < *now {
        at_time(&tz, now.date_naive() + chrono::Days::new(1), hour, minute)
    } else {
        Ok(today)
    }
}

/// Next `hour:minute` falling on `weekday` (1 = Sunday .. 7 = Saturday).
/// The same day only counts while its time has not passed.
pub fn next_trigger_for_weekday<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    minute: u32,
    weekday: u8,
) -> Result<DateTime<Tz>, AlarmError> {
    validate_time(hour, minute)?;
    if !(1..=7).contains(&weekday) {
        return Err(AlarmError::InvalidWeekday(weekday));
    }
    let tz = now.timezone();
    let current = now.weekday().number_from_sunday() as i64;
    let mut days_to_add = i64::from(weekday) - current;
    if days_to_add < 0 {
        days_to_add += 7;
    }
    if days_to_add == 0 && at_time(&tz, now.date_naive(), hour, minute)? < *now {
        days_to_add = 7;
    }
    at_time(&tz, now.date_naive() + chrono::Days::new(days_to_add as u64), hour, minute)
}

/// One concrete alarm instance waiting to fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAlarm {
    pub kind: AlarmKind,
    /// `None` for the single daily instance
    pub weekday: Option<u8>,
    pub trigger_at: i64,
}

/// Instances to register for `config`: one daily alarm when every (or no) day is
/// selected, otherwise one per selected weekday
pub fn plan<Tz: TimeZone>(
    kind: AlarmKind,
    config: &AlarmConfig,
    now: &DateTime<Tz>,
) -> Result<Vec<PlannedAlarm>, AlarmError> {
    if config.is_daily() {
        let at = next_trigger(now, config.hour, config.minute)?;
        return Ok(vec![PlannedAlarm {
            kind,
            weekday: None,
            trigger_at: at.timestamp_millis(),
        }]);
    }

    config
        .selected_days
        .iter()
        .map(|&day| {
            let at = next_trigger_for_weekday(now, config.hour, config.minute, day)?;
            Ok(PlannedAlarm {
                kind,
                weekday: Some(day),
                trigger_at: at.timestamp_millis(),
            })
        })
        .collect()
}

/// The facility that actually wakes the user at a planned instant
pub trait AlarmBackend {
    fn can_schedule_exact(&self) -> bool;
    fn schedule(&self, alarm: &PlannedAlarm) -> Result<(), AlarmError>;
    fn cancel_all(&self, kind: AlarmKind) -> Result<(), AlarmError>;
    fn pending(&self, kind: AlarmKind) -> Result<Vec<PlannedAlarm>, AlarmError>;
}

/// Keeps pending instances in the `scheduled_alarms` table; `watch` polls it with [`due`](Self::due)
pub struct SqliteAlarmBackend<'a> {
    db: &'a Database,
}

impl<'a> SqliteAlarmBackend<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn row_to_alarm(row: &rusqlite::Row) -> Result<Option<PlannedAlarm>, rusqlite::Error> {
        let kind: String = row.get(0)?;
        let weekday: Option<i64> = row.get(1)?;
        let trigger_at: i64 = row.get(2)?;
        Ok(AlarmKind::parse(&kind).map(|kind| PlannedAlarm {
            kind,
            weekday: weekday.and_then(|d| u8::try_from(d).ok()),
            trigger_at,
        }))
    }

    /// Remove and return every instance whose trigger time is at or before `now_millis`
    pub fn due(&self, now_millis: i64) -> Result<Vec<PlannedAlarm>, AlarmError> {
        let tx = self.db.conn().unchecked_transaction()?;
        let fired = {
            let mut stmt = tx.prepare(
                "SELECT kind, weekday, trigger_at FROM scheduled_alarms
                 WHERE trigger_at <= ?1 ORDER BY trigger_at ASC",
            )?;
            stmt.query_map(rusqlite::params![now_millis], Self::row_to_alarm)?
                .collect::<Result<Vec<_>, _>>()?
        };
        tx.execute(
            "DELETE FROM scheduled_alarms WHERE trigger_at <= ?1",
            rusqlite::params![now_millis],
        )?;
        tx.commit()?;
        Ok(fired.into_iter().flatten().collect())
    }
}

impl AlarmBackend for SqliteAlarmBackend<'_> {
    fn can_schedule_exact(&self) -> bool {
        true
    }

    fn schedule(&self, alarm: &PlannedAlarm) -> Result<(), AlarmError> {
        self.db.conn().execute(
            "INSERT INTO scheduled_alarms (kind, weekday, trigger_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![alarm.kind.as_str(), alarm.weekday.map(i64::from), alarm.trigger_at],
        )?;
        Ok(())
    }

    fn cancel_all(&self, kind: AlarmKind) -> Result<(), AlarmError> {
        self.db.conn().execute(
            "DELETE FROM scheduled_alarms WHERE kind = ?1",
            rusqlite::params![kind.as_str()],
        )?;
        Ok(())
    }

    fn pending(&self, kind: AlarmKind) -> Result<Vec<PlannedAlarm>, AlarmError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT kind, weekday, trigger_at FROM scheduled_alarms
             WHERE kind = ?1 ORDER BY trigger_at ASC",
        )?;
        let alarms = stmt
            .query_map(rusqlite::params![kind.as_str()], Self::row_to_alarm)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alarms.into_iter().flatten().collect())
    }
}

#[derive(Debug, Clone)]
pub struct AlarmStatus {
    pub kind: AlarmKind,
    pub config: AlarmConfig,
    /// Earliest pending instance, epoch millis
    pub next_trigger: Option<i64>,
}

/// Persists alarm settings and keeps the backend's pending instances in line with them
pub struct AlarmScheduler<'a, B: AlarmBackend> {
    db: &'a Database,
    backend: B,
}

impl<'a, B: AlarmBackend> AlarmScheduler<'a, B> {
    pub fn new(db: &'a Database, backend: B) -> Self {
        Self { db, backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn arm<Tz: TimeZone>(&self, kind: AlarmKind, config: &AlarmConfig, now: &DateTime<Tz>) -> Result<(), AlarmError> {
        self.backend.cancel_all(kind)?;
        for alarm in plan(kind, config, now)? {
            self.backend.schedule(&alarm)?;
        }
        tracing::debug!(kind = kind.as_str(), "alarm armed");
        Ok(())
    }

    /// Store a new time for `kind`, replace its pending instances and enable it
    pub fn set_alarm<Tz: TimeZone>(
        &self,
        kind: AlarmKind,
        hour: u32,
        minute: u32,
        now: &DateTime<Tz>,
    ) -> Result<(), AlarmError> {
        validate_time(hour, minute)?;
        if !self.backend.can_schedule_exact() {
            tracing::info!(kind = kind.as_str(), "exact alarms unavailable, not scheduling");
            return Ok(());
        }

        self.db.set_alarm_time(kind, hour, minute)?;
        let mut config = self.db.alarm_config(kind)?;
        config.enabled = true;
        self.arm(kind, &config, now)?;
        self.db.set_alarm_enabled(kind, true)?;
        tracing::info!(kind = kind.as_str(), hour, minute, "alarm set");
        Ok(())
    }

    pub fn toggle<Tz: TimeZone>(&self, kind: AlarmKind, enable: bool, now: &DateTime<Tz>) -> Result<(), AlarmError> {
        if !enable {
            return self.cancel(kind);
        }
        let config = self.db.alarm_config(kind)?;
        self.set_alarm(kind, config.hour, config.minute, now)
    }

    /// Drop every pending instance of `kind` and mark it disabled
    pub fn cancel(&self, kind: AlarmKind) -> Result<(), AlarmError> {
        self.backend.cancel_all(kind)?;
        self.db.set_alarm_enabled(kind, false)?;
        tracing::info!(kind = kind.as_str(), "alarm cancelled");
        Ok(())
    }

    /// Exact alarms fire once; arm the next occurrence from the persisted settings
    pub fn reschedule_after_fire<Tz: TimeZone>(&self, kind: AlarmKind, now: &DateTime<Tz>) -> Result<(), AlarmError> {
        let config = self.db.alarm_config(kind)?;
        if !config.enabled {
            return Ok(());
        }
        self.arm(kind, &config, now)
    }

    /// Re-register every enabled alarm after a restart. An alarm whose stored time
    /// cannot be read is switched off. Returns the kinds that were armed.
    pub fn rearm_on_boot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<AlarmKind>, AlarmError> {
        self.db.migrate_old_alarm_settings()?;

        let mut armed = Vec::new();
        for kind in [AlarmKind::Morning, AlarmKind::Evening] {
            let config = self.db.alarm_config(kind)?;
            if !config.enabled {
                continue;
            }

            let stored = self.db.alarm_time_string(kind)?;
            let corrupt = stored
                .as_deref()
                .is_some_and(|t| crate::utils::parse_time_of_day(t).is_none());
            if corrupt || validate_time(config.hour, config.minute).is_err() {
                tracing::warn!(kind = kind.as_str(), ?stored, "unreadable alarm time, disabling");
                self.cancel(kind)?;
                continue;
            }
            if let Some(day) = config.selected_days.iter().find(|d| !ALL_DAYS.contains(d)) {
                tracing::warn!(kind = kind.as_str(), day, "unknown weekday in alarm days, disabling");
                self.cancel(kind)?;
                continue;
            }

            self.arm(kind, &config, now)?;
            armed.push(kind);
        }
        Ok(armed)
    }

    pub fn status(&self, kind: AlarmKind) -> Result<AlarmStatus, AlarmError> {
        let config = self.db.alarm_config(kind)?;
        let next_trigger = self
            .backend
            .pending(kind)?
            .into_iter()
            .map(|a| a.trigger_at)
            .min();
        Ok(AlarmStatus {
            kind,
            config,
            next_trigger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::keys;
    use chrono::{Timelike, Utc};
    use std::cell::RefCell;

    // 2026-10-19 is a Monday (weekday 2)
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    #[test]
    fn next_trigger_rolls_to_tomorrow_once_passed() {
        let at = next_trigger(&monday(6, 0), 7, 30).unwrap();
        assert_eq!(at, monday(7, 30));
        let at = next_trigger(&monday(8, 0), 7, 30).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 10, 20, 7, 30, 0).unwrap());
        assert!(matches!(next_trigger(&monday(8, 0), 24, 0), Err(AlarmError::InvalidHour(24))));
        assert!(matches!(next_trigger(&monday(8, 0), 7, 60), Err(AlarmError::InvalidMinute(60))));
    }

    #[test]
    fn weekday_trigger_uses_sunday_as_one() {
        // later today
        assert_eq!(next_trigger_for_weekday(&monday(6, 0), 7, 0, 2).unwrap(), monday(7, 0));
        // passed today -> next week
        let at = next_trigger_for_weekday(&monday(8, 0), 7, 0, 2).unwrap();
        assert_eq!(at.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 26).unwrap());
        // Sunday is behind Monday -> six days ahead
        let at = next_trigger_for_weekday(&monday(8, 0), 7, 0, 1).unwrap();
        assert_eq!(at.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 25).unwrap());
        // Saturday
        let at = next_trigger_for_weekday(&monday(8, 0), 7, 0, 7).unwrap();
        assert_eq!(at.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 24).unwrap());
        assert_eq!(at.hour(), 7);
        assert!(matches!(
            next_trigger_for_weekday(&monday(8, 0), 7, 0, 0),
            Err(AlarmError::InvalidWeekday(0))
        ));
    }

    #[test]
    fn plan_collapses_full_week_into_daily() {
        let mut config = AlarmConfig::default_for(AlarmKind::Morning);
        let daily = plan(AlarmKind::Morning, &config, &monday(6, 0)).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].weekday, None);

        config.selected_days = vec![2, 4, 6];
        let per_day = plan(AlarmKind::Morning, &config, &monday(6, 0)).unwrap();
        assert_eq!(per_day.iter().map(|a| a.weekday).collect::<Vec<_>>(), vec![Some(2), Some(4), Some(6)]);
    }

    struct NoExactAlarms {
        scheduled: RefCell<usize>,
    }

    impl AlarmBackend for NoExactAlarms {
        fn can_schedule_exact(&self) -> bool {
            false
        }
        fn schedule(&self, _: &PlannedAlarm) -> Result<(), AlarmError> {
            *self.scheduled.borrow_mut() += 1;
            Ok(())
        }
        fn cancel_all(&self, _: AlarmKind) -> Result<(), AlarmError> {
            Ok(())
        }
        fn pending(&self, _: AlarmKind) -> Result<Vec<PlannedAlarm>, AlarmError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn missing_exact_capability_is_a_silent_no_op() {
        let db = Database::in_memory().unwrap();
        let scheduler = AlarmScheduler::new(&db, NoExactAlarms { scheduled: RefCell::new(0) });
        scheduler.set_alarm(AlarmKind::Morning, 6, 45, &monday(5, 0)).unwrap();
        assert_eq!(*scheduler.backend().scheduled.borrow(), 0);
        assert!(!db.alarm_config(AlarmKind::Morning).unwrap().enabled);
    }

    #[test]
    fn set_alarm_replaces_pending_instances() {
        let db = Database::in_memory().unwrap();
        let scheduler = AlarmScheduler::new(&db, SqliteAlarmBackend::new(&db));
        scheduler.set_alarm(AlarmKind::Morning, 6, 45, &monday(5, 0)).unwrap();
        scheduler.set_alarm(AlarmKind::Morning, 7, 15, &monday(5, 0)).unwrap();

        let status = scheduler.status(AlarmKind::Morning).unwrap();
        assert!(status.config.enabled);
        assert_eq!(status.next_trigger, Some(monday(7, 15).timestamp_millis()));
        assert_eq!(scheduler.backend().pending(AlarmKind::Morning).unwrap().len(), 1);

        scheduler.cancel(AlarmKind::Morning).unwrap();
        assert!(scheduler.backend().pending(AlarmKind::Morning).unwrap().is_empty());
        assert!(!db.has_active_alarms().unwrap());
    }

    #[test]
    fn due_pops_fired_instances_and_reschedule_rearms() {
        let db = Database::in_memory().unwrap();
        let scheduler = AlarmScheduler::new(&db, SqliteAlarmBackend::new(&db));
        scheduler.set_alarm(AlarmKind::Evening, 21, 0, &monday(20, 0)).unwrap();

        assert!(scheduler.backend().due(monday(20, 59).timestamp_millis()).unwrap().is_empty());
        let fired = scheduler.backend().due(monday(21, 0).timestamp_millis()).unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, AlarmKind::Evening);

        scheduler.reschedule_after_fire(AlarmKind::Evening, &monday(21, 1)).unwrap();
        let next = scheduler.status(AlarmKind::Evening).unwrap().next_trigger;
        assert_eq!(next, Some(Utc.with_ymd_and_hms(2026, 10, 20, 21, 0, 0).unwrap().timestamp_millis()));
    }

    #[test]
    fn boot_rearms_enabled_and_disables_corrupt() {
        let db = Database::in_memory().unwrap();
        db.set_pref(keys::MORNING_ALARM_TIME, "06:30").unwrap();
        db.set_pref(keys::EVENING_ALARM_TIME, "9pm").unwrap();
        db.set_alarm_enabled(AlarmKind::Evening, true).unwrap();

        let scheduler = AlarmScheduler::new(&db, SqliteAlarmBackend::new(&db));
        let armed = scheduler.rearm_on_boot(&monday(5, 0)).unwrap();
        assert_eq!(armed, vec![AlarmKind::Morning]);
        assert!(!db.alarm_config(AlarmKind::Evening).unwrap().enabled);
        assert_eq!(
            scheduler.status(AlarmKind::Morning).unwrap().next_trigger,
            Some(monday(6, 30).timestamp_millis())
        );
    }

    #[test]
    fn boot_disables_alarm_with_unknown_weekday() {
        let db = Database::in_memory().unwrap();
        db.set_alarm_time(AlarmKind::Morning, 6, 30).unwrap();
        db.set_alarm_enabled(AlarmKind::Morning, true).unwrap();
        db.set_pref(keys::SELECTED_DAYS, &vec![2u8, 9]).unwrap();
        db.set_alarm_time(AlarmKind::Evening, 21, 0).unwrap();
        db.set_alarm_enabled(AlarmKind::Evening, true).unwrap();

        let scheduler = AlarmScheduler::new(&db, SqliteAlarmBackend::new(&db));
        let armed = scheduler.rearm_on_boot(&monday(5, 0)).unwrap();
        assert_eq!(armed, vec![AlarmKind::Evening]);
        assert!(!db.alarm_config(AlarmKind::Morning).unwrap().enabled);
        assert!(scheduler.backend().pending(AlarmKind::Morning).unwrap().is_empty());
    }
}
