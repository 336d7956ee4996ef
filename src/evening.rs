//! Three-step evening review: rate the day, rate each category, then settle today's tasks.
//!
//! The current step is persisted on every forward move so an interrupted review
//! resumes where it left off.

use chrono::{DateTime, Local, TimeZone};
use std::collections::BTreeMap;

use crate::database::{Database, DatabaseError};
use crate::models::{Task, TaskCategory};
use crate::signal::SignalHandle;
use crate::stats;
use crate::utils;

pub const DEFAULT_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EveningStep {
    OverallRating,
    CategoryRatings,
    TaskTriage,
    Done,
}

impl EveningStep {
    /// Persisted step number; anything outside 1..=3 starts over
    pub fn from_number(step: u8) -> Self {
        match step {
            2 => EveningStep::CategoryRatings,
            3 => EveningStep::TaskTriage,
            _ => EveningStep::OverallRating,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            EveningStep::OverallRating => 1,
            EveningStep::CategoryRatings => 2,
            EveningStep::TaskTriage => 3,
            EveningStep::Done => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EveningStep::OverallRating => "How was your day?",
            EveningStep::CategoryRatings => "Rate each area of your life",
            EveningStep::TaskTriage => "Today's tasks",
            EveningStep::Done => "All done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    MovedTo(EveningStep),
    /// The alarm is still ringing; the first step has to be completed
    Blocked,
    Exit,
}

pub struct EveningReview<'a, Tz: TimeZone = Local> {
    db: &'a Database,
    signal: SignalHandle,
    now: DateTime<Tz>,
    today: String,
    step: EveningStep,
    daily_rating: u8,
    category_ratings: BTreeMap<String, u8>,
    categories: Vec<TaskCategory>,
    tasks: Vec<Task>,
    signal_stopped: bool,
}

impl<'a, Tz: TimeZone> EveningReview<'a, Tz>
where
    Tz::Offset: std::fmt::Display,
{
    /// Open the review at the persisted step
    pub fn resume(db: &'a Database, signal: SignalHandle, now: DateTime<Tz>) -> Result<Self, DatabaseError> {
        let step = EveningStep::from_number(db.get_evening_step()?);
        let today = utils::date_key(&now);
        let mut review = Self {
            db,
            signal,
            today,
            step: EveningStep::OverallRating,
            daily_rating: DEFAULT_RATING,
            category_ratings: BTreeMap::new(),
            categories: Vec::new(),
            tasks: Vec::new(),
            signal_stopped: false,
            now,
        };
        review.enter(step)?;
        tracing::debug!(step = step.number(), "evening review resumed");
        Ok(review)
    }

    fn enter(&mut self, step: EveningStep) -> Result<(), DatabaseError> {
        match step {
            EveningStep::CategoryRatings => {
                self.categories = self.db.get_categories()?;
                for category in &self.categories {
                    self.category_ratings
                        .entry(category.id.clone())
                        .or_insert(DEFAULT_RATING);
                }
                self.stop_signal();
            }
            EveningStep::TaskTriage => {
                // labels for the task list when resuming straight into this step
                if self.categories.is_empty() {
                    self.categories = self.db.get_categories()?;
                }
                self.tasks = self.db.today_tasks(&self.now)?;
                self.stop_signal();
            }
            EveningStep::OverallRating | EveningStep::Done => {}
        }
        self.step = step;
        Ok(())
    }

    fn stop_signal(&mut self) {
        if !self.signal_stopped {
            self.signal.stop();
            self.signal_stopped = true;
        }
    }

    pub fn step(&self) -> EveningStep {
        self.step
    }

    pub fn today(&self) -> &str {
        &self.today
    }

    pub fn daily_rating(&self) -> u8 {
        self.daily_rating
    }

    pub fn signal_stopped(&self) -> bool {
        self.signal_stopped
    }

    pub fn categories(&self) -> &[TaskCategory] {
        &self.categories
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn category_rating(&self, category_id: &str) -> u8 {
        self.category_ratings
            .get(category_id)
            .copied()
            .unwrap_or(DEFAULT_RATING)
    }

    pub fn set_daily_rating(&mut self, rating: u8) {
        self.daily_rating = rating.min(10);
    }

    pub fn set_category_rating(&mut self, category_id: &str, rating: u8) {
        self.category_ratings.insert(category_id.to_string(), rating.min(10));
    }

    /// Flip a task's completion and persist it right away
    pub fn toggle_task(&mut self, task_id: &str) -> Result<Option<&Task>, DatabaseError> {
        let Some(index) = self.tasks.iter().position(|t| t.id == task_id) else {
            return Ok(None);
        };
        let completed = !self.tasks[index].is_completed;
        let updated = self
            .db
            .set_task_completed(task_id, completed, self.now.timestamp_millis())?;
        self.tasks[index] = updated;
        Ok(self.tasks.get(index))
    }

    /// Open tasks that finishing will move to tomorrow
    pub fn incomplete_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_completed).count()
    }

    /// Advance one step, saving what the current step collected
    pub fn next(&mut self) -> Result<EveningStep, DatabaseError> {
        match self.step {
            EveningStep::OverallRating => {
                self.db.save_daily_rating(&self.today, self.daily_rating)?;
                self.db.save_evening_step(2)?;
                self.enter(EveningStep::CategoryRatings)?;
            }
            EveningStep::CategoryRatings => {
                for (category_id, rating) in &self.category_ratings {
                    self.db.save_category_rating(&self.today, category_id, *rating)?;
                }
                self.db.save_evening_step(3)?;
                self.enter(EveningStep::TaskTriage)?;
            }
            EveningStep::TaskTriage => self.finish()?,
            EveningStep::Done => {}
        }
        Ok(self.step)
    }

    fn finish(&mut self) -> Result<(), DatabaseError> {
        let open: Vec<Task> = self.tasks.iter().filter(|t| !t.is_completed).cloned().collect();
        for task in &open {
            self.db.move_task_to_tomorrow(task, &self.now)?;
        }
        stats::recompute_after_review(self.db, &self.today)?;
        self.db.reset_evening_step()?;
        self.stop_signal();
        self.step = EveningStep::Done;
        tracing::info!(moved = open.len(), rating = self.daily_rating, "evening review finished");
        Ok(())
    }

    pub fn back(&mut self) -> Result<BackOutcome, DatabaseError> {
        match self.step {
            EveningStep::TaskTriage => {
                self.db.save_evening_step(2)?;
                self.enter(EveningStep::CategoryRatings)?;
                Ok(BackOutcome::MovedTo(self.step))
            }
            EveningStep::CategoryRatings => {
                self.db.save_evening_step(1)?;
                self.enter(EveningStep::OverallRating)?;
                Ok(BackOutcome::MovedTo(self.step))
            }
            EveningStep::OverallRating if !self.signal_stopped => Ok(BackOutcome::Blocked),
            EveningStep::OverallRating | EveningStep::Done => {
                self.db.reset_evening_step()?;
                Ok(BackOutcome::Exit)
            }
        }
    }

    /// Leave without finishing; refused while the alarm is still ringing
    pub fn skip(&mut self) -> bool {
        if !self.signal_stopped {
            return false;
        }
        tracing::info!(step = self.step.number(), "evening review skipped");
        true
    }

    /// Silence the alarm and start the next review from the first step
    pub fn emergency_stop(&mut self) -> Result<(), DatabaseError> {
        self.stop_signal();
        self.db.reset_evening_step()?;
        tracing::info!("evening review stopped");
        Ok(())
    }
}

pub fn closing_message(rating: u8) -> &'static str {
    match rating {
        0..=3 => "Sorry today wasn't great. Tomorrow will be better!",
        4..=6 => "An ordinary day! Hope tomorrow is full of good things.",
        7..=8 => "Great! You put a good day behind you.",
        9..=10 => "Fantastic! Congratulations!",
        _ => "Thanks for your answer!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimePeriod;
    use crate::signal::SilentSignal;
    use chrono::Utc;
    use std::sync::Arc;

    fn evening() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap()
    }

    fn ringing() -> (Arc<SilentSignal>, SignalHandle) {
        let signal = Arc::new(SilentSignal::default());
        let handle = SignalHandle::new(Arc::clone(&signal));
        handle.start();
        (signal, handle)
    }

    #[test]
    fn first_step_blocks_back_until_signal_stops() {
        let db = Database::in_memory().unwrap();
        let (_, handle) = ringing();
        let mut review = EveningReview::resume(&db, handle.clone(), evening()).unwrap();
        assert_eq!(review.step(), EveningStep::OverallRating);
        assert_eq!(review.back().unwrap(), BackOutcome::Blocked);
        assert!(!review.skip());
        assert!(handle.is_active());

        review.set_daily_rating(8);
        assert_eq!(review.next().unwrap(), EveningStep::CategoryRatings);
        assert!(!handle.is_active());
        assert_eq!(db.get_all_ratings().unwrap()["2026-10-19"], 8);
        assert_eq!(review.back().unwrap(), BackOutcome::MovedTo(EveningStep::OverallRating));
        assert_eq!(review.back().unwrap(), BackOutcome::Exit);
        assert_eq!(db.get_evening_step().unwrap(), 1);
    }

    #[test]
    fn resumes_at_persisted_step_and_stops_signal_once() {
        let db = Database::in_memory().unwrap();
        db.create_default_categories_if_needed(0).unwrap();
        db.save_evening_step(2).unwrap();
        let (signal, handle) = ringing();

        let review = EveningReview::resume(&db, handle, evening()).unwrap();
        assert_eq!(review.step(), EveningStep::CategoryRatings);
        assert_eq!(review.categories().len(), 4);
        assert_eq!(signal.stops(), 1);
        assert!(review.signal_stopped());
    }

    #[test]
    fn resuming_at_triage_loads_category_labels() {
        let db = Database::in_memory().unwrap();
        db.create_default_categories_if_needed(0).unwrap();
        db.save_evening_step(3).unwrap();

        let review = EveningReview::resume(&db, SignalHandle::silent(), evening()).unwrap();
        assert_eq!(review.step(), EveningStep::TaskTriage);
        assert_eq!(review.categories().len(), 4);
    }

    #[test]
    fn finishing_moves_open_tasks_and_updates_stats() {
        let db = Database::in_memory().unwrap();
        db.create_default_categories_if_needed(0).unwrap();
        let category = db.get_categories().unwrap().remove(0);
        let created = evening().timestamp_millis() - 3_600_000;
        let done = Task::new("Run".into(), category.id.clone(), TimePeriod::Today, created);
        let open = Task::new("Read".into(), category.id.clone(), TimePeriod::Today, created);
        db.save_task(&done).unwrap();
        db.save_task(&open).unwrap();

        let (_, handle) = ringing();
        let mut review = EveningReview::resume(&db, handle, evening()).unwrap();
        review.set_daily_rating(9);
        review.next().unwrap();
        review.set_category_rating(&category.id, 7);
        assert_eq!(review.next().unwrap(), EveningStep::TaskTriage);
        assert_eq!(db.get_evening_step().unwrap(), 3);
        assert_eq!(review.incomplete_count(), 2);

        review.toggle_task(&done.id).unwrap();
        assert_eq!(review.incomplete_count(), 1);
        assert!(db.get_task(&done.id).unwrap().unwrap().is_completed);

        assert_eq!(review.next().unwrap(), EveningStep::Done);
        assert_eq!(db.get_evening_step().unwrap(), 1);
        assert_eq!(db.get_category_rating("2026-10-19", &category.id).unwrap(), 7);
        assert_eq!(db.success_count().unwrap(), 1);
        assert_eq!(db.average_rating().unwrap(), 9.0);

        let all = db.get_all_tasks().unwrap();
        assert_eq!(all.len(), 3);
        let moved = all.iter().find(|t| t.moved_from_date.is_some()).unwrap();
        assert_eq!(moved.title, "Read");
        assert_eq!(moved.created_at, created + utils::DAY_MILLIS);
        assert_eq!(closing_message(review.daily_rating()), "Fantastic! Congratulations!");
    }

    #[test]
    fn emergency_stop_resets_progress() {
        let db = Database::in_memory().unwrap();
        db.save_evening_step(3).unwrap();
        let (_, handle) = ringing();
        let mut review = EveningReview::resume(&db, handle.clone(), evening()).unwrap();
        review.emergency_stop().unwrap();
        assert!(!handle.is_active());
        assert_eq!(db.get_evening_step().unwrap(), 1);
        assert!(review.skip());
    }

    #[test]
    fn closing_message_bands() {
        assert_eq!(closing_message(0), closing_message(3));
        assert_eq!(closing_message(4), closing_message(6));
        assert_eq!(closing_message(7), closing_message(8));
        assert_ne!(closing_message(8), closing_message(9));
    }
}
