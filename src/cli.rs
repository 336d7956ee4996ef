use chrono::{DateTime, Local, NaiveDate, TimeZone};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::alarm::{AlarmBackend, AlarmError, AlarmScheduler, AlarmStatus, SqliteAlarmBackend};
use crate::backup::{self, BackupError};
use crate::calendar;
use crate::challenge::{self, ChallengeState};
use crate::config::{Config, ConfigError};
use crate::database::{Database, DatabaseError};
use crate::evening::EveningStep;
use crate::models::{AlarmKind, Task, TaskCategory, TaskPriority, TimePeriod};
use crate::period;
use crate::session::{self, SessionError};
use crate::signal::{SignalHandle, TerminalBell};
use crate::stats;
use crate::tui::{self, TuiError};
use crate::utils;

#[derive(Parser)]
#[command(name = "riselog")]
#[command(about = "Morning and evening alarms with a small habit tracker")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Do not ring the terminal bell when an alarm fires
    #[arg(long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the morning and evening alarms
    #[command(subcommand)]
    Alarm(AlarmCommand),
    /// Stay running and ring alarms when they are due
    Watch {
        /// Handle alarms that are already due, then exit
        #[arg(long)]
        once: bool,
    },
    /// Ring an alarm right now
    Ring {
        #[arg(value_parser = parse_alarm_kind)]
        kind: AlarmKind,
    },
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Show how many tasks were created on each day of a period
    Calendar {
        #[arg(long, default_value = "this-month", value_parser = parse_period)]
        period: TimePeriod,
    },
    /// Manage the sentences used by the morning challenge
    #[command(subcommand)]
    Quote(QuoteCommand),
    /// Rate a day from 0 to 10
    Rate {
        rating: u8,
        /// Date to rate (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<String>,
    },
    /// Show ratings, streaks and task progress
    Stats {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Show or change app preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Remove malformed and orphaned records
    Repair,
    /// Remember an email as the signed-in user
    Login { email: String },
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Delete stored data
    Clear {
        /// Only remove tasks, categories and category ratings
        #[arg(long)]
        tasks_only: bool,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum AlarmCommand {
    /// Set the time of an alarm and enable it
    Set {
        #[arg(value_parser = parse_alarm_kind)]
        kind: AlarmKind,
        /// Wall-clock time (HH:MM)
        #[arg(value_parser = parse_time)]
        time: (u32, u32),
        /// Comma-separated weekdays, 1 = Sunday .. 7 = Saturday
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<u8>>,
    },
    Enable {
        #[arg(value_parser = parse_alarm_kind)]
        kind: AlarmKind,
    },
    Disable {
        #[arg(value_parser = parse_alarm_kind)]
        kind: AlarmKind,
    },
    Status,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Add a new task
    Add {
        title: String,
        /// Category id or name; the first category when omitted
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "today", value_parser = parse_period)]
        period: TimePeriod,
        #[arg(long, default_value = "normal", value_parser = parse_priority)]
        priority: TaskPriority,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// File the task on another day (YYYY-MM-DD) instead of now
        #[arg(long)]
        date: Option<String>,
    },
    /// List tasks of one period (today by default)
    List {
        #[arg(long, value_parser = parse_period)]
        period: Option<TimePeriod>,
        #[arg(long)]
        category: Option<String>,
        /// List every stored task regardless of period
        #[arg(long)]
        all: bool,
        /// List the tasks created on one day (YYYY-MM-DD), any period
        #[arg(long, conflicts_with_all = ["period", "all"])]
        date: Option<String>,
    },
    /// Mark a task completed
    Done { id: String },
    /// Mark a task not completed
    Undo { id: String },
    Delete { id: String },
    /// Copy a task to tomorrow
    Tomorrow { id: String },
}

#[derive(Subcommand)]
pub enum CategoryCommand {
    Add {
        name: String,
        #[arg(long, default_value = "#607D8B")]
        color: String,
        #[arg(long)]
        icon: Option<String>,
    },
    List,
    /// Delete a category together with its tasks
    Delete { category: String },
    /// Create the default categories when none exist
    Defaults,
}

#[derive(Subcommand)]
pub enum QuoteCommand {
    Add { text: String },
    List,
    /// Remove a quote by its number in `quote list`
    Remove { number: usize },
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Write a JSON backup
    Export {
        /// Output file; a timestamped name in the current directory when omitted
        path: Option<PathBuf>,
    },
    /// Replace all data with the contents of a backup
    Import {
        path: PathBuf,
        #[arg(long)]
        yes: bool,
    },
    /// Show what a backup file contains
    Info { path: PathBuf },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    Show,
    DarkMode {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Interface language code, such as "fa" or "en"
    Language { code: String },
    Notifications {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    AutoBackup {
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Alarm error: {0}")]
    AlarmError(#[from] AlarmError),
    #[error("Backup error: {0}")]
    BackupError(#[from] BackupError),
    #[error("{0}")]
    SessionError(#[from] SessionError),
    #[error("Terminal error: {0}")]
    TuiError(#[from] TuiError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("No task matches '{0}'")]
    TaskNotFound(String),
    #[error("No category matches '{0}'")]
    CategoryNotFound(String),
    #[error("'{0}' matches more than one item, use a longer id")]
    AmbiguousId(String),
    #[error("No quote number {0}")]
    QuoteNotFound(usize),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error("{0}")]
    NotConfirmed(&'static str),
}

fn parse_alarm_kind(s: &str) -> Result<AlarmKind, String> {
    AlarmKind::parse(s).ok_or_else(|| format!("expected 'morning' or 'evening', got '{}'", s))
}

fn parse_time(s: &str) -> Result<(u32, u32), String> {
    utils::parse_time_of_day(s).ok_or_else(|| format!("expected HH:MM, got '{}'", s))
}

fn parse_period(s: &str) -> Result<TimePeriod, String> {
    TimePeriod::parse(s).ok_or_else(|| {
        format!(
            "unknown period '{}', expected one of: {}",
            s,
            TimePeriod::ALL.map(TimePeriod::as_str).join(", ")
        )
    })
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(format!("expected on or off, got '{}'", s)),
    }
}

fn parse_priority(s: &str) -> Result<TaskPriority, String> {
    TaskPriority::parse(s).ok_or_else(|| format!("expected normal, high or urgent, got '{}'", s))
}

pub fn run(command: Commands, db: &Database, config: &Config, silent: bool) -> Result<(), CliError> {
    match command {
        Commands::Alarm(cmd) => handle_alarm(cmd, db),
        Commands::Watch { once } => handle_watch(db, config, silent, once),
        Commands::Ring { kind } => ring(db, config, kind, silent),
        Commands::Task(cmd) => handle_task(cmd, db, config),
        Commands::Category(cmd) => handle_category(cmd, db),
        Commands::Calendar { period } => handle_calendar(period, db, config),
        Commands::Quote(cmd) => handle_quote(cmd, db),
        Commands::Rate { rating, date } => handle_rate(rating, date, db),
        Commands::Stats { json } => handle_stats(json, db),
        Commands::Backup(cmd) => handle_backup(cmd, db),
        Commands::Settings(cmd) => handle_settings(cmd, db),
        Commands::Repair => handle_repair(db),
        Commands::Login { email } => {
            let name = session::login(db, &email)?;
            println!("Welcome, {}!", name);
            Ok(())
        }
        Commands::Logout => {
            session::logout(db)?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami => {
            match session::current_user(db)? {
                Some(name) => println!("{}", name),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Commands::Clear { tasks_only, yes } => handle_clear(tasks_only, yes, db),
    }
}

// --- alarms ---

fn day_names(days: &[u8]) -> String {
    const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    days.iter()
        .filter_map(|&d| NAMES.get(usize::from(d).wrapping_sub(1)))
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_status(status: &AlarmStatus, now: &DateTime<Local>) -> String {
    let config = &status.config;
    let mut line = format!(
        "{:<8} {} at {}",
        status.kind.as_str(),
        if config.enabled { "on " } else { "off" },
        utils::format_time_of_day(config.hour, config.minute)
    );
    if config.is_daily() {
        line.push_str(", every day");
    } else {
        line.push_str(&format!(", {}", day_names(&config.selected_days)));
    }
    if let Some(next) = status.next_trigger {
        line.push_str(&format!(", next {}", utils::format_millis(next, now)));
    }
    line
}

pub fn handle_alarm(cmd: AlarmCommand, db: &Database) -> Result<(), CliError> {
    let now = Local::now();
    let scheduler = AlarmScheduler::new(db, SqliteAlarmBackend::new(db));
    match cmd {
        AlarmCommand::Set { kind, time, days } => {
            if let Some(days) = days {
                db.set_selected_days(kind, &days)?;
            }
            let (hour, minute) = time;
            scheduler.set_alarm(kind, hour, minute, &now)?;
            println!("{}", describe_status(&scheduler.status(kind)?, &now));
        }
        AlarmCommand::Enable { kind } => {
            scheduler.toggle(kind, true, &now)?;
            println!("{}", describe_status(&scheduler.status(kind)?, &now));
        }
        AlarmCommand::Disable { kind } => {
            scheduler.toggle(kind, false, &now)?;
            println!("{} alarm disabled", kind.as_str());
        }
        AlarmCommand::Status => {
            for kind in [AlarmKind::Morning, AlarmKind::Evening] {
                println!("{}", describe_status(&scheduler.status(kind)?, &now));
            }
        }
    }
    Ok(())
}

fn alarm_signal(config: &Config, kind: AlarmKind, silent: bool) -> SignalHandle {
    if silent {
        return SignalHandle::silent();
    }
    let safety_timeout = match kind {
        AlarmKind::Morning => None,
        AlarmKind::Evening => Some(config.evening_safety_timeout()),
    };
    SignalHandle::new(TerminalBell::new(config.bell_interval(), safety_timeout))
}

/// Open the screen for `kind` and block until it closes
pub fn ring(db: &Database, config: &Config, kind: AlarmKind, silent: bool) -> Result<(), CliError> {
    let signal = alarm_signal(config, kind, silent);
    tracing::info!(kind = kind.as_str(), "alarm ringing");
    match kind {
        AlarmKind::Morning => match tui::run_morning(db, config, signal)? {
            ChallengeState::Succeeded => println!("Good morning! Successful days: {}", db.success_count()?),
            ChallengeState::Cancelled => println!("Alarm stopped"),
            ChallengeState::Armed | ChallengeState::Typing => {}
        },
        AlarmKind::Evening => {
            if tui::run_evening(db, config, signal, Local::now())? == EveningStep::Done {
                println!("Evening review saved");
            }
        }
    }
    Ok(())
}

/// Pop the instances due at `clock()` and ring each kind once. A ring that
/// fails is logged and the alarm is re-armed all the same. Returns the kinds rung.
pub fn fire_due_alarms<Tz, C, R>(
    scheduler: &AlarmScheduler<'_, SqliteAlarmBackend<'_>>,
    clock: C,
    mut ring: R,
) -> Result<Vec<AlarmKind>, CliError>
where
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
    R: FnMut(AlarmKind) -> Result<(), CliError>,
{
    let due = scheduler.backend().due(clock().timestamp_millis())?;
    // several weekday instances of one alarm can come due in the same poll
    let mut kinds: Vec<AlarmKind> = Vec::new();
    for alarm in &due {
        if !kinds.contains(&alarm.kind) {
            kinds.push(alarm.kind);
        }
    }
    for &kind in &kinds {
        if let Err(e) = ring(kind) {
            tracing::error!(kind = kind.as_str(), error = %e, "alarm screen failed");
        }
        scheduler.reschedule_after_fire(kind, &clock())?;
    }
    Ok(kinds)
}

/// Re-arm enabled alarms, then ring each one as it comes due
pub fn handle_watch(db: &Database, config: &Config, silent: bool, once: bool) -> Result<(), CliError> {
    let scheduler = AlarmScheduler::new(db, SqliteAlarmBackend::new(db));
    let armed = scheduler.rearm_on_boot(&Local::now())?;
    if !once {
        println!("Watching {} alarm(s), press Ctrl+C to stop", armed.len());
    }

    loop {
        fire_due_alarms(&scheduler, Local::now, |kind| ring(db, config, kind, silent))?;
        if once {
            return Ok(());
        }
        std::thread::sleep(config.poll_interval());
    }
}

// --- tasks ---

/// Find the single task whose id equals or starts with `id`
fn find_task(db: &Database, id: &str) -> Result<Task, CliError> {
    if let Some(task) = db.get_task(id)? {
        return Ok(task);
    }
    let mut matches = db.get_all_tasks()?.into_iter().filter(|t| t.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task),
        (Some(_), Some(_)) => Err(CliError::AmbiguousId(id.to_string())),
        (None, _) => Err(CliError::TaskNotFound(id.to_string())),
    }
}

/// Match a category by id, id prefix, or case-insensitive name
fn find_category(db: &Database, key: &str) -> Result<TaskCategory, CliError> {
    let categories = db.get_categories()?;
    if let Some(category) = categories
        .iter()
        .find(|c| c.id == key || c.name.eq_ignore_ascii_case(key))
    {
        return Ok(category.clone());
    }
    let mut matches = categories.into_iter().filter(|c| c.id.starts_with(key));
    match (matches.next(), matches.next()) {
        (Some(category), None) => Ok(category),
        (Some(_), Some(_)) => Err(CliError::AmbiguousId(key.to_string())),
        (None, _) => Err(CliError::CategoryNotFound(key.to_string())),
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, CliError> {
    utils::parse_date(s).map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", s, e)))
}

fn due_date_millis(due: &str) -> Result<i64, CliError> {
    let date = parse_day(due)?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| CliError::DateParseError(due.to_string()))?;
    Local
        .from_local_datetime(&end_of_day)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| CliError::DateParseError(due.to_string()))
}

fn print_task(task: &Task, categories: &[TaskCategory], now: &DateTime<Local>) {
    let category = categories
        .iter()
        .find(|c| c.id == task.category_id)
        .map(|c| format!("{} {}", c.icon, c.name))
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{} {}  [{}] {}",
        task.status_emoji(),
        task.title,
        category,
        task.time_period.display_name()
    );
    let now_millis = now.timestamp_millis();
    if task.is_overdue(now_millis) {
        line.push_str("  overdue");
    } else if let Some(days) = task.days_until_due(now_millis) {
        line.push_str(&format!("  due in {} day(s)", days));
    }
    println!("{}\n    {}", line, task.id);
}

pub fn handle_task(cmd: TaskCommand, db: &Database, config: &Config) -> Result<(), CliError> {
    let now = Local::now();
    match cmd {
        TaskCommand::Add {
            title,
            category,
            period,
            priority,
            description,
            due,
            date,
        } => {
            let category = match category {
                Some(key) => find_category(db, &key)?,
                None => {
                    db.create_default_categories_if_needed(now.timestamp_millis())?;
                    db.get_categories()?
                        .into_iter()
                        .next()
                        .ok_or_else(|| CliError::CategoryNotFound("(none)".to_string()))?
                }
            };
            let created_at = match date {
                Some(date) => period::day_start_millis(&Local, parse_day(&date)?),
                None => now.timestamp_millis(),
            };
            let mut task = Task::new(title, category.id.clone(), period, created_at);
            task.priority = priority;
            task.description = description.unwrap_or_default();
            task.due_date = due.as_deref().map(due_date_millis).transpose()?;
            db.save_task(&task)?;
            println!("Task created in {} {} (ID: {})", category.icon, category.name, task.id);
        }
        TaskCommand::List {
            period,
            category,
            all,
            date,
        } => {
            let categories = db.get_categories()?;
            let week_start = config.week_start_day()?;
            let period = period.unwrap_or(TimePeriod::Today);
            let day = date.as_deref().map(parse_day).transpose()?;
            let tasks: Vec<Task> = match (day, all, category) {
                (Some(day), _, category) => {
                    let tasks = db.tasks_for_date(day, &now)?;
                    match category {
                        Some(key) => {
                            let category = find_category(db, &key)?;
                            tasks.into_iter().filter(|t| t.category_id == category.id).collect()
                        }
                        None => tasks,
                    }
                }
                (None, true, None) => db.get_all_tasks()?,
                (None, true, Some(key)) => {
                    let category = find_category(db, &key)?;
                    db.get_all_tasks()?
                        .into_iter()
                        .filter(|t| t.category_id == category.id)
                        .collect()
                }
                (None, false, Some(key)) => {
                    let category = find_category(db, &key)?;
                    db.tasks_for_period(&category.id, period, &now, week_start)?
                }
                (None, false, None) => db
                    .get_all_tasks()?
                    .into_iter()
                    .filter(|t| t.time_period == period && period.contains_at(t.created_at, &now, week_start))
                    .collect(),
            };
            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in &tasks {
                print_task(task, &categories, &now);
            }
        }
        TaskCommand::Done { id } => {
            let task = find_task(db, &id)?;
            let task = db.set_task_completed(&task.id, true, now.timestamp_millis())?;
            println!("✅ {}", task.title);
        }
        TaskCommand::Undo { id } => {
            let task = find_task(db, &id)?;
            let task = db.set_task_completed(&task.id, false, now.timestamp_millis())?;
            println!("{} {}", task.status_emoji(), task.title);
        }
        TaskCommand::Delete { id } => {
            let task = find_task(db, &id)?;
            db.delete_task(&task.id)?;
            println!("Task deleted: {}", task.title);
        }
        TaskCommand::Tomorrow { id } => {
            let task = find_task(db, &id)?;
            let moved = db.move_task_to_tomorrow(&task, &now)?;
            println!("Copied to tomorrow (ID: {})", moved.id);
        }
    }
    Ok(())
}

// --- calendar ---

pub fn handle_calendar(period: TimePeriod, db: &Database, config: &Config) -> Result<(), CliError> {
    let now = Local::now();
    let week_start = config.week_start_day()?;
    let days = calendar::days_in_period(db, period, &now, week_start)?;
    match period {
        TimePeriod::Today | TimePeriod::ThisWeek => {
            for day in &days {
                println!("{}", calendar::format_day(day));
            }
        }
        TimePeriod::ThisMonth | TimePeriod::ThisSeason | TimePeriod::ThisYear => {
            for grid in calendar::month_grids(&days, week_start) {
                for line in calendar::format_month(&grid, week_start) {
                    println!("{}", line);
                }
                println!();
            }
        }
    }
    let total: usize = days.iter().map(|d| d.tasks).sum();
    let completed: usize = days.iter().map(|d| d.completed).sum();
    println!("{} task(s), {} done", total, completed);
    Ok(())
}

// --- categories ---

pub fn handle_category(cmd: CategoryCommand, db: &Database) -> Result<(), CliError> {
    let now_millis = Local::now().timestamp_millis();
    match cmd {
        CategoryCommand::Add { name, color, icon } => {
            let mut category = TaskCategory::new(name, color, now_millis);
            if let Some(icon) = icon {
                category.icon = icon;
            }
            category.order = db.get_categories()?.iter().map(|c| c.order).max().unwrap_or(0) + 1;
            db.save_category(&category)?;
            println!("Category created (ID: {})", category.id);
        }
        CategoryCommand::List => {
            let tasks = db.get_all_tasks()?;
            let categories = db.get_categories()?;
            if categories.is_empty() {
                println!("No categories, run `riselog category defaults` to create the standard ones");
            }
            for category in categories {
                let count = tasks.iter().filter(|t| t.category_id == category.id).count();
                println!("{} {:<12} {:>3} task(s)  {}", category.icon, category.name, count, category.id);
            }
        }
        CategoryCommand::Delete { category } => {
            let category = find_category(db, &category)?;
            let removed = db.delete_category(&category.id)?;
            println!("Deleted {} and {} task(s)", category.name, removed);
        }
        CategoryCommand::Defaults => {
            let created = db.create_default_categories_if_needed(now_millis)?;
            if created == 0 {
                println!("Categories already exist");
            } else {
                println!("Created {} categories", created);
            }
        }
    }
    Ok(())
}

// --- quotes ---

pub fn handle_quote(cmd: QuoteCommand, db: &Database) -> Result<(), CliError> {
    let mut quotes = challenge::ensure_default_quotes(db)?;
    match cmd {
        QuoteCommand::Add { text } => {
            let text = text.trim().to_string();
            if !text.is_empty() && !quotes.contains(&text) {
                quotes.push(text);
                db.save_quotes(&quotes)?;
            }
            println!("{} quote(s)", quotes.len());
        }
        QuoteCommand::List => {
            for (i, quote) in quotes.iter().enumerate() {
                println!("{:>3}. {}", i + 1, quote);
            }
        }
        QuoteCommand::Remove { number } => {
            if number == 0 || number > quotes.len() {
                return Err(CliError::QuoteNotFound(number));
            }
            let removed = quotes.remove(number - 1);
            db.save_quotes(&quotes)?;
            println!("Removed: {}", removed);
        }
    }
    Ok(())
}

// --- ratings and stats ---

pub fn handle_rate(rating: u8, date: Option<String>, db: &Database) -> Result<(), CliError> {
    let date = match date {
        Some(date) => {
            utils::parse_date(&date)
                .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", date, e)))?;
            date
        }
        None => utils::date_key(&Local::now()),
    };
    db.save_daily_rating(&date, rating)?;
    stats::refresh_rating_totals(db)?;
    println!("{} rated {}/10 {}", date, rating, stats::rating_emoji(rating));
    Ok(())
}

pub fn handle_stats(json: bool, db: &Database) -> Result<(), CliError> {
    let now = Local::now();
    let overall = stats::overall_stats(db, &now)?;
    let tasks = stats::task_stats(db, &now)?;
    let categories = stats::category_stats(db, &now)?;
    let ratings = db.get_all_ratings()?;

    if json {
        let report = serde_json::json!({
            "overall": overall,
            "tasks": tasks,
            "categories": categories,
            "lastWeekAverage": stats::last_week_average(&ratings, now.date_naive()),
            "streak": stats::success_streak(&ratings, now.date_naive()),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Rated days:     {}", overall.total_rating_days);
    println!("Average rating: {:.1}", overall.average_rating);
    println!(
        "Last 7 days:    {:.1}",
        stats::last_week_average(&ratings, now.date_naive())
    );
    println!("Streak:         {} day(s)", stats::success_streak(&ratings, now.date_naive()));
    println!("Mornings won:   {}", overall.success_count);
    println!("Trend:          {}", stats::trend(&ratings).message());
    println!();
    println!(
        "Today: {}/{} tasks ({}%) {}",
        tasks.completed_today,
        tasks.today_tasks,
        tasks.today_progress,
        stats::progress_message(tasks.today_progress)
    );
    println!(
        "Total: {}/{} tasks ({}%)",
        tasks.completed_total, tasks.total_tasks, tasks.total_progress
    );

    if !categories.is_empty() {
        println!();
        for entry in &categories {
            println!(
                "{} {:<12} {}/{} ({}%), today {}/{}",
                entry.category.icon,
                entry.category.name,
                entry.completed,
                entry.total,
                entry.progress,
                entry.today_completed,
                entry.today_total
            );
        }
    }

    let recent = stats::recent_ratings(&ratings, 7);
    if !recent.is_empty() {
        println!();
        for (date, rating) in recent {
            println!("{}  {:>2} {}", date, rating, stats::rating_emoji(rating));
        }
    }
    Ok(())
}

// --- backup ---

pub fn handle_backup(cmd: BackupCommand, db: &Database) -> Result<(), CliError> {
    let now = Local::now();
    match cmd {
        BackupCommand::Export { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(backup::generate_file_name(&now)));
            let doc = backup::export_to_file(db, &path, now.timestamp_millis())?;
            println!(
                "Backup written to {} ({} tasks, {} categories)",
                path.display(),
                doc.tasks.len(),
                doc.categories.len()
            );
        }
        BackupCommand::Import { path, yes } => {
            if !yes {
                return Err(CliError::NotConfirmed(
                    "Importing replaces all current data, pass --yes to continue",
                ));
            }
            let doc = backup::import_from_file(db, &path)?;
            println!(
                "Restored {} tasks and {} categories",
                doc.tasks.len(),
                doc.categories.len()
            );
        }
        BackupCommand::Info { path } => print_backup_info(&path, &now)?,
    }
    Ok(())
}

fn print_backup_info(path: &Path, now: &DateTime<Local>) -> Result<(), CliError> {
    let info = backup::backup_info(path)?;
    println!("Version:    {}", info.version);
    println!("Created:    {}", info.formatted_date(now));
    println!("Device:     {}", info.device_info);
    println!("Tasks:      {}", info.tasks_count);
    println!("Categories: {}", info.categories_count);
    println!("Size:       {}", info.formatted_file_size());
    Ok(())
}

// --- settings ---

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

pub fn handle_settings(cmd: SettingsCommand, db: &Database) -> Result<(), CliError> {
    match cmd {
        SettingsCommand::Show => {
            let now = Local::now();
            println!("Dark mode:     {}", on_off(db.dark_mode()?));
            println!("Language:      {}", db.language()?);
            println!("Notifications: {}", on_off(db.notifications_enabled()?));
            println!("Auto backup:   {}", on_off(db.auto_backup_enabled()?));
            match db.last_backup_date()? {
                Some(at) => println!("Last backup:   {}", utils::format_millis(at, &now)),
                None => println!("Last backup:   never"),
            }
        }
        SettingsCommand::DarkMode { state } => {
            db.set_dark_mode(state)?;
            println!("Dark mode {}", on_off(state));
        }
        SettingsCommand::Language { code } => {
            let code = code.trim().to_ascii_lowercase();
            if code.is_empty() {
                return Err(CliError::InvalidSetting("language code is empty".into()));
            }
            db.set_language(&code)?;
            println!("Language set to {}", code);
        }
        SettingsCommand::Notifications { state } => {
            db.set_notifications_enabled(state)?;
            println!("Notifications {}", on_off(state));
        }
        SettingsCommand::AutoBackup { state } => {
            db.set_auto_backup_enabled(state)?;
            println!("Auto backup {}", on_off(state));
        }
    }
    Ok(())
}

// --- maintenance ---

pub fn handle_repair(db: &Database) -> Result<(), CliError> {
    let fixes = db.validate_and_repair()?;
    if fixes.is_empty() {
        println!("No problems found");
    }
    for fix in fixes {
        println!("- {}", fix);
    }
    Ok(())
}

pub fn handle_clear(tasks_only: bool, yes: bool, db: &Database) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::NotConfirmed("This deletes data permanently, pass --yes to continue"));
    }
    if tasks_only {
        db.clear_task_data()?;
        println!("Tasks and categories cleared");
    } else {
        let backend = SqliteAlarmBackend::new(db);
        for kind in [AlarmKind::Morning, AlarmKind::Evening] {
            backend.cancel_all(kind)?;
        }
        db.clear_all_data()?;
        println!("All data cleared");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_category() -> (Database, TaskCategory) {
        let db = Database::in_memory().unwrap();
        db.create_default_categories_if_needed(0).unwrap();
        let category = db.get_categories().unwrap().remove(0);
        (db, category)
    }

    #[test]
    fn cli_parses_nested_commands() {
        let cli = Cli::try_parse_from(["riselog", "alarm", "set", "morning", "06:45", "--days", "2,3,4"]).unwrap();
        match cli.command {
            Commands::Alarm(AlarmCommand::Set { kind, time, days }) => {
                assert_eq!(kind, AlarmKind::Morning);
                assert_eq!(time, (6, 45));
                assert_eq!(days, Some(vec![2, 3, 4]));
            }
            _ => panic!("wrong command"),
        }

        assert!(Cli::try_parse_from(["riselog", "alarm", "set", "noon", "06:45"]).is_err());
        assert!(Cli::try_parse_from(["riselog", "alarm", "set", "morning", "25:00"]).is_err());

        let cli = Cli::try_parse_from(["riselog", "task", "add", "Run", "--period", "this-week"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Task(TaskCommand::Add { period: TimePeriod::ThisWeek, .. })
        ));
    }

    #[test]
    fn tasks_resolve_by_unique_prefix() {
        let (db, category) = db_with_category();
        let mut a = Task::new("A".into(), category.id.clone(), TimePeriod::Today, 0);
        a.id = "task_abc1".into();
        let mut b = Task::new("B".into(), category.id.clone(), TimePeriod::Today, 0);
        b.id = "task_abd2".into();
        db.save_task(&a).unwrap();
        db.save_task(&b).unwrap();

        assert_eq!(find_task(&db, "task_abc").unwrap().title, "A");
        assert_eq!(find_task(&db, "task_abd2").unwrap().title, "B");
        assert!(matches!(find_task(&db, "task_ab"), Err(CliError::AmbiguousId(_))));
        assert!(matches!(find_task(&db, "nope"), Err(CliError::TaskNotFound(_))));
    }

    #[test]
    fn categories_resolve_by_name() {
        let (db, _) = db_with_category();
        assert_eq!(find_category(&db, "work").unwrap().name, "Work");
        assert!(matches!(find_category(&db, "Hobbies"), Err(CliError::CategoryNotFound(_))));
    }

    #[test]
    fn task_add_defaults_to_first_category() {
        let db = Database::in_memory().unwrap();
        let config = Config::default();
        handle_task(
            TaskCommand::Add {
                title: "Stretch".into(),
                category: None,
                period: TimePeriod::Today,
                priority: TaskPriority::High,
                description: None,
                due: Some("2030-01-01".into()),
                date: None,
            },
            &db,
            &config,
        )
        .unwrap();

        let tasks = db.get_all_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, TaskPriority::High);
        assert!(tasks[0].due_date.is_some());
        assert_eq!(tasks[0].category_id, db.get_categories().unwrap()[0].id);
    }

    #[test]
    fn quote_remove_checks_bounds() {
        let db = Database::in_memory().unwrap();
        handle_quote(QuoteCommand::Add { text: "Up and at them".into() }, &db).unwrap();
        assert_eq!(db.get_quotes().unwrap().len(), challenge::DEFAULT_QUOTES.len() + 1);
        assert!(matches!(
            handle_quote(QuoteCommand::Remove { number: 0 }, &db),
            Err(CliError::QuoteNotFound(0))
        ));
        handle_quote(QuoteCommand::Remove { number: 1 }, &db).unwrap();
        assert_eq!(db.get_quotes().unwrap().len(), challenge::DEFAULT_QUOTES.len());
    }

    #[test]
    fn clear_requires_confirmation() {
        let (db, _) = db_with_category();
        assert!(matches!(handle_clear(false, false, &db), Err(CliError::NotConfirmed(_))));
        assert!(!db.get_categories().unwrap().is_empty());
        handle_clear(true, true, &db).unwrap();
        assert!(db.get_categories().unwrap().is_empty());
    }

    #[test]
    fn watch_once_with_nothing_due_returns() {
        let db = Database::in_memory().unwrap();
        handle_watch(&db, &Config::default(), true, true).unwrap();
    }

    #[test]
    fn dated_tasks_land_on_their_day() {
        let (db, category) = db_with_category();
        let config = Config::default();
        let add = |title: &str, date: Option<&str>| {
            handle_task(
                TaskCommand::Add {
                    title: title.into(),
                    category: Some(category.name.clone()),
                    period: TimePeriod::ThisMonth,
                    priority: TaskPriority::Normal,
                    description: None,
                    due: None,
                    date: date.map(str::to_string),
                },
                &db,
                &config,
            )
        };
        add("Plan trip", Some("2026-03-14")).unwrap();
        add("Now", None).unwrap();
        assert!(matches!(add("Bad", Some("14/03/2026")), Err(CliError::DateParseError(_))));

        let reference = Local::now();
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let on_day = db.tasks_for_date(day, &reference).unwrap();
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0].title, "Plan trip");
        assert_eq!(on_day[0].created_at, period::day_start_millis(&Local, day));

        let cli = Cli::try_parse_from(["riselog", "task", "list", "--date", "2026-03-14"]).unwrap();
        assert!(matches!(cli.command, Commands::Task(TaskCommand::List { date: Some(_), .. })));
        assert!(Cli::try_parse_from(["riselog", "task", "list", "--date", "2026-03-14", "--all"]).is_err());
    }

    #[test]
    fn calendar_defaults_to_the_month() {
        let cli = Cli::try_parse_from(["riselog", "calendar"]).unwrap();
        assert!(matches!(cli.command, Commands::Calendar { period: TimePeriod::ThisMonth }));
        let cli = Cli::try_parse_from(["riselog", "calendar", "--period", "this-season"]).unwrap();
        assert!(matches!(cli.command, Commands::Calendar { period: TimePeriod::ThisSeason }));

        let (db, _) = db_with_category();
        handle_calendar(TimePeriod::ThisYear, &db, &Config::default()).unwrap();
    }

    #[test]
    fn settings_change_stored_preferences() {
        let db = Database::in_memory().unwrap();
        assert!(!db.dark_mode().unwrap());
        assert_eq!(db.language().unwrap(), "fa");

        let cli = Cli::try_parse_from(["riselog", "settings", "dark-mode", "on"]).unwrap();
        let Commands::Settings(cmd) = cli.command else {
            panic!("wrong command");
        };
        handle_settings(cmd, &db).unwrap();
        assert!(db.dark_mode().unwrap());

        handle_settings(SettingsCommand::Language { code: " EN ".into() }, &db).unwrap();
        assert_eq!(db.language().unwrap(), "en");
        assert!(matches!(
            handle_settings(SettingsCommand::Language { code: "  ".into() }, &db),
            Err(CliError::InvalidSetting(_))
        ));

        handle_settings(SettingsCommand::Notifications { state: false }, &db).unwrap();
        handle_settings(SettingsCommand::AutoBackup { state: true }, &db).unwrap();
        assert!(!db.notifications_enabled().unwrap());
        assert!(db.auto_backup_enabled().unwrap());
        handle_settings(SettingsCommand::Show, &db).unwrap();

        assert!(Cli::try_parse_from(["riselog", "settings", "dark-mode", "maybe"]).is_err());
    }

    #[test]
    fn failed_ring_still_rearms_the_alarm() {
        use chrono::Utc;

        let db = Database::in_memory().unwrap();
        let scheduler = AlarmScheduler::new(&db, SqliteAlarmBackend::new(&db));
        let set_at = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
        scheduler.set_alarm(AlarmKind::Morning, 7, 30, &set_at).unwrap();

        let after_fire = Utc.with_ymd_and_hms(2026, 10, 19, 7, 31, 0).unwrap();
        let mut attempts = 0;
        let rung = fire_due_alarms(&scheduler, || after_fire, |_| {
            attempts += 1;
            Err(CliError::TuiError(TuiError::RenderError("terminal gone".into())))
        })
        .unwrap();
        assert_eq!(rung, vec![AlarmKind::Morning]);
        assert_eq!(attempts, 1);

        let status = scheduler.status(AlarmKind::Morning).unwrap();
        assert!(status.config.enabled);
        assert_eq!(
            status.next_trigger,
            Some(Utc.with_ymd_and_hms(2026, 10, 20, 7, 30, 0).unwrap().timestamp_millis())
        );

        // the next poll finds nothing left over from the failed ring
        let rung = fire_due_alarms(&scheduler, || after_fire, |_| Ok(())).unwrap();
        assert!(rung.is_empty());
    }
}
