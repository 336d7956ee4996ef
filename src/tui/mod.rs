pub mod error;
pub mod evening;
pub mod events;
pub mod layout;
pub mod morning;
pub mod widgets;

pub use error::TuiError;
pub use evening::{EveningScreen, run_evening};
pub use events::{Flow, Screen, run_screen};
pub use layout::Layout;
pub use morning::{MorningScreen, run_morning};
