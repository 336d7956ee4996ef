use chrono::{DateTime, NaiveDate, TimeZone};
use serde::Serialize;

use crate::database::{Database, DatabaseError};
use crate::models::{Task, TaskCategory};
use crate::prefs::DailyRatings;
use crate::utils;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_rating_days: u32,
    pub average_rating: f64,
    pub success_count: u32,
    pub last_success_date: Option<String>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub today_total_tasks: usize,
    pub today_completed_tasks: usize,
    pub today_pending_tasks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total_tasks: usize,
    pub completed_total: usize,
    pub today_tasks: usize,
    pub completed_today: usize,
    pub today_progress: u32,
    pub total_progress: u32,
    pub pending_tasks: usize,
    pub today_pending: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: TaskCategory,
    pub total: usize,
    pub completed: usize,
    pub today_total: usize,
    pub today_completed: usize,
    pub progress: u32,
    pub today_progress: u32,
    pub pending: usize,
}

fn percent(done: usize, total: usize) -> u32 {
    if total == 0 { 0 } else { (done * 100 / total) as u32 }
}

fn completed(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| t.is_completed).count()
}

pub fn overall_stats<Tz: TimeZone>(db: &Database, now: &DateTime<Tz>) -> Result<OverallStats, DatabaseError>
where
    Tz::Offset: std::fmt::Display,
{
    let all = db.get_all_tasks()?;
    let today = db.today_tasks(now)?;
    let done = completed(&all);
    let today_done = completed(&today);
    Ok(OverallStats {
        total_rating_days: db.total_rating_days()?,
        average_rating: db.average_rating()?,
        success_count: db.success_count()?,
        last_success_date: db.last_success_date()?,
        total_tasks: all.len(),
        completed_tasks: done,
        pending_tasks: all.len() - done,
        today_total_tasks: today.len(),
        today_completed_tasks: today_done,
        today_pending_tasks: today.len() - today_done,
    })
}

pub fn task_stats<Tz: TimeZone>(db: &Database, now: &DateTime<Tz>) -> Result<TaskStats, DatabaseError>
where
    Tz::Offset: std::fmt::Display,
{
    let all = db.get_all_tasks()?;
    let today = db.today_tasks(now)?;
    let done = completed(&all);
    let today_done = completed(&today);
    Ok(TaskStats {
        total_tasks: all.len(),
        completed_total: done,
        today_tasks: today.len(),
        completed_today: today_done,
        today_progress: percent(today_done, today.len()),
        total_progress: percent(done, all.len()),
        pending_tasks: all.len() - done,
        today_pending: today.len() - today_done,
    })
}

/// Progress of every category, in category order
pub fn category_stats<Tz: TimeZone>(db: &Database, now: &DateTime<Tz>) -> Result<Vec<CategoryStats>, DatabaseError>
where
    Tz::Offset: std::fmt::Display,
{
    let all = db.get_all_tasks()?;
    let today = db.today_tasks(now)?;
    Ok(db
        .get_categories()?
        .into_iter()
        .map(|category| {
            let mine: Vec<Task> = all.iter().filter(|t| t.category_id == category.id).cloned().collect();
            let mine_today: Vec<Task> = today.iter().filter(|t| t.category_id == category.id).cloned().collect();
            let done = completed(&mine);
            let today_done = completed(&mine_today);
            CategoryStats {
                total: mine.len(),
                completed: done,
                today_total: mine_today.len(),
                today_completed: today_done,
                progress: percent(done, mine.len()),
                today_progress: percent(today_done, mine_today.len()),
                pending: mine.len() - done,
                category,
            }
        })
        .collect())
}

/// Mean of the ratings dated within the last seven days (inclusive), 0.0 when there are none
pub fn last_week_average(ratings: &DailyRatings, today: NaiveDate) -> f64 {
    let week_ago = (today - chrono::Days::new(7)).format(utils::DATE_KEY_FORMAT).to_string();
    let recent: Vec<u8> = ratings
        .iter()
        .filter(|(date, _)| date.as_str() >= week_ago.as_str())
        .map(|(_, r)| *r)
        .collect();
    average(&recent)
}

fn average(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Improving,
    Declining,
    Steady,
    /// Fewer than three rated days
    InsufficientData,
    /// Not enough history for a previous week to compare against
    NoHistory,
}

impl Trend {
    pub fn message(self) -> &'static str {
        match self {
            Trend::Improving => "📈 Improving! Keep it up!",
            Trend::Declining => "📉 Trending down. Maybe try a different approach",
            Trend::Steady => "➡️ Holding steady. Try a new challenge",
            Trend::InsufficientData => "Not enough ratings yet to show a trend",
            Trend::NoHistory => "No earlier week to compare with yet",
        }
    }
}

/// Compares the latest seven ratings with the seven before them
pub fn trend(ratings: &DailyRatings) -> Trend {
    if ratings.len() < 3 {
        return Trend::InsufficientData;
    }
    // BTreeMap iterates in date order
    let sorted: Vec<u8> = ratings.values().copied().collect();
    let split = sorted.len().saturating_sub(7);
    let (older_all, recent) = sorted.split_at(split);
    let older = &older_all[older_all.len().saturating_sub(7)..];
    if older.is_empty() {
        return Trend::NoHistory;
    }

    let recent_avg = average(recent);
    let older_avg = average(older);
    if recent_avg > older_avg + 0.5 {
        Trend::Improving
    } else if recent_avg < older_avg - 0.5 {
        Trend::Declining
    } else {
        Trend::Steady
    }
}

/// Verdict on today's task completion, shown when there is no rating history to compare
pub fn progress_message(today_progress: u32) -> &'static str {
    match today_progress {
        80.. => "📈 Great work on today's tasks!",
        60..=79 => "👍 Good progress on today's tasks",
        40..=59 => "⚠️ Today's tasks need more effort",
        _ => "🔴 Most of today's tasks are still open",
    }
}

/// Consecutive rated days ending today, or yesterday when today has no rating yet
pub fn success_streak(ratings: &DailyRatings, today: NaiveDate) -> u32 {
    let key = |d: NaiveDate| d.format(utils::DATE_KEY_FORMAT).to_string();
    let mut day = if ratings.contains_key(&key(today)) {
        today
    } else {
        today - chrono::Days::new(1)
    };
    let mut streak = 0;
    while ratings.contains_key(&key(day)) {
        streak += 1;
        day = day - chrono::Days::new(1);
    }
    streak
}

/// Newest first, at most `limit` entries
pub fn recent_ratings(ratings: &DailyRatings, limit: usize) -> Vec<(String, u8)> {
    ratings
        .iter()
        .rev()
        .take(limit)
        .map(|(d, r)| (d.clone(), *r))
        .collect()
}

/// Store the rated-day count and average of every daily rating; returns the count
pub fn refresh_rating_totals(db: &Database) -> Result<u32, DatabaseError> {
    let values: Vec<u8> = db.get_all_ratings()?.values().copied().collect();
    let days = values.len() as u32;
    db.set_total_rating_days(days)?;
    db.set_average_rating(average(&values))?;
    Ok(days)
}

/// Refresh the stored aggregates once an evening review is finished
pub fn recompute_after_review(db: &Database, today: &str) -> Result<(), DatabaseError> {
    let days = refresh_rating_totals(db)?;
    db.set_last_success_date(today)?;
    let count = db.success_count()? + 1;
    db.set_success_count(count)?;
    tracing::debug!(days, count, "statistics recomputed");
    Ok(())
}

pub fn rating_emoji(rating: u8) -> &'static str {
    match rating {
        1..=3 => "😞",
        4..=5 => "😐",
        6..=7 => "🙂",
        8..=9 => "😊",
        10 => "😄",
        _ => "",
    }
}
