use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::utils::{self, DAY_MILLIS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn display_name(self) -> &'static str {
        match self {
            TaskPriority::Normal => "Normal",
            TaskPriority::High => "High",
            TaskPriority::Urgent => "Urgent",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            TaskPriority::Normal => "#2196F3",
            TaskPriority::High => "#FF9800",
            TaskPriority::Urgent => "#F44336",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            TaskPriority::Normal => "📋",
            TaskPriority::High => "⚠️",
            TaskPriority::Urgent => "🚨",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Some(TaskPriority::Normal),
            "high" => Some(TaskPriority::High),
            "urgent" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }
}

/// Classification bucket for a task. Membership checks live in `crate::period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    #[default]
    Today,
    ThisWeek,
    ThisMonth,
    ThisSeason,
    ThisYear,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 5] = [
        TimePeriod::Today,
        TimePeriod::ThisWeek,
        TimePeriod::ThisMonth,
        TimePeriod::ThisSeason,
        TimePeriod::ThisYear,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            TimePeriod::Today => "Today",
            TimePeriod::ThisWeek => "This week",
            TimePeriod::ThisMonth => "This month",
            TimePeriod::ThisSeason => "This season",
            TimePeriod::ThisYear => "This year",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            TimePeriod::Today => "📅",
            TimePeriod::ThisWeek => "🗓️",
            TimePeriod::ThisMonth => "📆",
            TimePeriod::ThisSeason => "🍂",
            TimePeriod::ThisYear => "📅",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            TimePeriod::Today => "#1976D2",
            TimePeriod::ThisWeek => "#388E3C",
            TimePeriod::ThisMonth => "#F57C00",
            TimePeriod::ThisSeason => "#7B1FA2",
            TimePeriod::ThisYear => "#D32F2F",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimePeriod::Today => "today",
            TimePeriod::ThisWeek => "this_week",
            TimePeriod::ThisMonth => "this_month",
            TimePeriod::ThisSeason => "this_season",
            TimePeriod::ThisYear => "this_year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "today" => Some(TimePeriod::Today),
            "this_week" | "week" => Some(TimePeriod::ThisWeek),
            "this_month" | "month" => Some(TimePeriod::ThisMonth),
            "this_season" | "season" => Some(TimePeriod::ThisSeason),
            "this_year" | "year" => Some(TimePeriod::ThisYear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub time_period: TimePeriod,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completion_date: Option<i64>,
    pub created_at: i64,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub rating: u8, // 0-10, for completed tasks
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub moved_from_date: Option<String>,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Task {}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

impl Task {
    pub fn new(title: String, category_id: String, time_period: TimePeriod, created_at: i64) -> Self {
        Self {
            id: new_id("task"),
            title,
            description: String::new(),
            category_id,
            time_period,
            is_completed: false,
            completion_date: None,
            created_at,
            due_date: None,
            priority: TaskPriority::Normal,
            rating: 0,
            notes: String::new(),
            moved_from_date: None,
        }
    }

    /// True when the task was created on the calendar day of `now`
    pub fn is_today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool
    where
        Tz::Offset: std::fmt::Display,
    {
        utils::date_key_of_millis(self.created_at, now).as_deref() == Some(utils::date_key(now).as_str())
    }

    /// Clone this task into tomorrow: fresh id, created_at one day later, completion cleared
    pub fn moved_to_tomorrow<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Task
    where
        Tz::Offset: std::fmt::Display,
    {
        Task {
            id: new_id("task"),
            created_at: self.created_at + DAY_MILLIS,
            moved_from_date: Some(utils::date_key(now)),
            is_completed: false,
            completion_date: None,
            ..self.clone()
        }
    }

    pub fn mark_completed(&mut self, now_millis: i64) {
        self.is_completed = true;
        self.completion_date = Some(now_millis);
    }

    pub fn mark_incomplete(&mut self) {
        self.is_completed = false;
        self.completion_date = None;
    }

    pub fn is_overdue(&self, now_millis: i64) -> bool {
        match self.due_date {
            Some(due) if !self.is_completed => now_millis > due,
            _ => false,
        }
    }

    /// Whole days until the due date (truncated toward zero)
    pub fn days_until_due(&self, now_millis: i64) -> Option<i64> {
        self.due_date.map(|due| (due - now_millis) / DAY_MILLIS)
    }

    pub fn status_emoji(&self) -> &'static str {
        if self.is_completed {
            "✅"
        } else {
            self.priority.emoji()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_category_icon")]
    pub icon: String,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: i64,
    #[serde(default)]
    pub order: i64,
}

fn default_category_icon() -> String {
    "📌".to_string()
}

impl PartialEq for TaskCategory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskCategory {}

impl TaskCategory {
    pub fn new(name: String, color: String, created_at: i64) -> Self {
        Self {
            id: new_id("category"),
            name,
            color,
            icon: default_category_icon(),
            is_default: false,
            created_at,
            order: 0,
        }
    }

    /// Seeded categories for a fresh install
    pub fn defaults(created_at: i64) -> Vec<TaskCategory> {
        [
            ("health", "Health", "#4CAF50", "🏃"),
            ("work", "Work", "#2196F3", "💼"),
            ("education", "Education", "#FF9800", "📚"),
            ("personal", "Personal", "#9C27B0", "🏠"),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (prefix, name, color, icon))| TaskCategory {
            id: new_id(prefix),
            name: name.to_string(),
            color: color.to_string(),
            icon: icon.to_string(),
            is_default: true,
            created_at: created_at + i as i64,
            order: i as i64 + 1,
        })
        .collect()
    }
}

/// Which of the two daily alarms a setting or schedule refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmKind {
    Morning,
    Evening,
}

impl AlarmKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmKind::Morning => "morning",
            AlarmKind::Evening => "evening",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Some(AlarmKind::Morning),
            "evening" => Some(AlarmKind::Evening),
            _ => None,
        }
    }
}

/// Weekday numbering follows the Sunday = 1 .. Saturday = 7 convention of the stored data
pub const ALL_DAYS: [u8; 7] = [1, 2, 3, 4, 5, 6, 7];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub selected_days: Vec<u8>,
    pub sound_uri: Option<String>,
    pub vibration: bool,
}

impl AlarmConfig {
    pub fn default_for(kind: AlarmKind) -> Self {
        let hour = match kind {
            AlarmKind::Morning => 7,
            AlarmKind::Evening => 21,
        };
        Self {
            enabled: false,
            hour,
            minute: 0,
            selected_days: ALL_DAYS.to_vec(),
            sound_uri: None,
            vibration: true,
        }
    }

    /// Empty or full weekday selection means "every day"
    pub fn is_daily(&self) -> bool {
        self.selected_days.is_empty() || ALL_DAYS.iter().all(|d| self.selected_days.contains(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn moved_task_gets_new_identity_and_next_day() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 21, 30, 0).unwrap();
        let mut task = Task::new("Read".into(), "c1".into(), TimePeriod::Today, now.timestamp_millis());
        task.mark_completed(now.timestamp_millis());

        let moved = task.moved_to_tomorrow(&now);
        assert_ne!(moved.id, task.id);
        assert_eq!(moved.created_at - task.created_at, DAY_MILLIS);
        assert!(!moved.is_completed);
        assert_eq!(moved.completion_date, None);
        assert_eq!(moved.moved_from_date.as_deref(), Some("2026-05-04"));
        assert_eq!(moved.title, "Read");
    }

    #[test]
    fn overdue_only_when_open_and_past_due() {
        let mut task = Task::new("Pay".into(), String::new(), TimePeriod::ThisWeek, 0);
        assert!(!task.is_overdue(1_000));
        task.due_date = Some(500);
        assert!(task.is_overdue(1_000));
        assert_eq!(task.days_until_due(500 - 3 * DAY_MILLIS), Some(3));
        task.mark_completed(900);
        assert!(!task.is_overdue(1_000));
        assert_eq!(task.status_emoji(), "✅");
    }

    #[test]
    fn wire_names_match_stored_format() {
        let task = Task::new("x".into(), "c".into(), TimePeriod::ThisSeason, 1);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["time_period"], "this_season");
        assert_eq!(json["priority"], "normal");
        assert_eq!(json["is_completed"], false);
    }

    #[test]
    fn full_weekday_selection_is_daily() {
        let mut cfg = AlarmConfig::default_for(AlarmKind::Morning);
        assert!(cfg.is_daily());
        cfg.selected_days = vec![2, 3];
        assert!(!cfg.is_daily());
        cfg.selected_days.clear();
        assert!(cfg.is_daily());
    }
}
