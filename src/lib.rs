pub mod alarm;
pub mod backup;
pub mod calendar;
pub mod challenge;
pub mod cli;
pub mod config;
pub mod database;
pub mod evening;
pub mod models;
pub mod period;
pub mod prefs;
pub mod session;
pub mod signal;
pub mod stats;
pub mod tui;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{AlarmConfig, AlarmKind, Task, TaskCategory, TaskPriority, TimePeriod};
pub use signal::{AlarmSignal, SignalHandle};
pub use utils::Profile;
