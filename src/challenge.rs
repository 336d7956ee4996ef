//! Morning wake-up challenge: the alarm keeps ringing until the user retypes a quote.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::database::{Database, DatabaseError};
use crate::signal::SignalHandle;

pub const DEFAULT_QUOTE: &str = "Today is the first day of the rest of your life";

/// Seeded into an empty quote list on first run
pub const DEFAULT_QUOTES: [&str; 3] = [
    DEFAULT_QUOTE,
    "Success is not final, failure is not fatal",
    "The only way to do great work is to love what you do",
];

/// Uniform pick from `quotes`, or [`DEFAULT_QUOTE`] when there are none
pub fn pick_quote<R: Rng + ?Sized>(quotes: &[String], rng: &mut R) -> String {
    quotes
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| DEFAULT_QUOTE.to_string())
}

/// Store the default quotes the first time the list is read
pub fn ensure_default_quotes(db: &Database) -> Result<Vec<String>, DatabaseError> {
    let quotes = db.get_quotes()?;
    if !quotes.is_empty() || db.quotes_initialized()? {
        return Ok(quotes);
    }
    let defaults: Vec<String> = DEFAULT_QUOTES.iter().map(|q| q.to_string()).collect();
    db.save_quotes(&defaults)?;
    Ok(defaults)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Armed,
    Typing,
    Succeeded,
    Cancelled,
}

impl ChallengeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChallengeState::Succeeded | ChallengeState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Nothing typed yet
    Hidden,
    CorrectSoFar,
    Wrong,
    Success,
    /// Submit pressed with an empty input
    Empty,
}

impl Feedback {
    pub fn message(self) -> &'static str {
        match self {
            Feedback::Hidden => "",
            Feedback::CorrectSoFar => "✓ Correct so far, keep going",
            Feedback::Wrong => "✗ Something is off, check what you typed",
            Feedback::Success => "🎉 Well done! Have a great day",
            Feedback::Empty => "Type the sentence first",
        }
    }
}

#[derive(Debug)]
pub struct MorningChallenge {
    quote: String,
    input: String,
    state: ChallengeState,
    signal: SignalHandle,
}

impl MorningChallenge {
    pub fn new(quote: String, signal: SignalHandle) -> Self {
        Self {
            quote,
            input: String::new(),
            state: ChallengeState::Armed,
            signal,
        }
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    pub fn signal(&self) -> &SignalHandle {
        &self.signal
    }

    fn terminal_feedback(&self) -> Feedback {
        match self.state {
            ChallengeState::Succeeded => Feedback::Success,
            _ => Feedback::Hidden,
        }
    }

    /// Live check after every keystroke; the full input is passed each time
    pub fn on_input(&mut self, text: &str) -> Feedback {
        if self.state.is_terminal() {
            return self.terminal_feedback();
        }
        self.input = text.to_string();

        let typed = text.trim();
        if typed.is_empty() {
            return Feedback::Hidden;
        }
        if typed == self.quote {
            self.state = ChallengeState::Succeeded;
            return Feedback::Success;
        }
        self.state = ChallengeState::Typing;
        if self.quote.starts_with(typed) {
            Feedback::CorrectSoFar
        } else {
            Feedback::Wrong
        }
    }

    /// Explicit check; a wrong answer clears the input
    pub fn submit(&mut self, text: &str) -> Feedback {
        if self.state.is_terminal() {
            return self.terminal_feedback();
        }
        let typed = text.trim();
        if typed.is_empty() {
            return Feedback::Empty;
        }
        if typed == self.quote {
            self.input = text.to_string();
            self.state = ChallengeState::Succeeded;
            return Feedback::Success;
        }
        self.input.clear();
        self.state = ChallengeState::Typing;
        Feedback::Wrong
    }

    /// Leaving the screen is only allowed once the challenge is over
    pub fn can_exit(&self) -> bool {
        self.state.is_terminal()
    }

    /// Emergency stop: silence the alarm without solving the challenge
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.signal.stop();
        self.state = ChallengeState::Cancelled;
        tracing::info!("morning challenge cancelled");
    }

    pub fn complete(&self, db: &Database, today: &str) -> Result<bool, DatabaseError> {
        complete_morning(db, &self.signal, today)
    }
}

/// Silence the alarm and count the day's success. Only the first success of a
/// calendar day is counted; returns whether this call counted it.
pub fn complete_morning(db: &Database, signal: &SignalHandle, today: &str) -> Result<bool, DatabaseError> {
    signal.stop();

    if db.last_success_date()?.as_deref() == Some(today) {
        return Ok(false);
    }
    let count = db.success_count()? + 1;
    db.set_success_count(count)?;
    db.set_last_success_date(today)?;
    tracing::info!(count, "morning challenge completed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn challenge(quote: &str) -> MorningChallenge {
        let signal = SignalHandle::silent();
        signal.start();
        MorningChallenge::new(quote.to_string(), signal)
    }

    #[test]
    fn live_feedback_follows_prefix() {
        let mut c = challenge("Start today.");
        assert_eq!(c.on_input(""), Feedback::Hidden);
        assert_eq!(c.state(), ChallengeState::Armed);
        assert_eq!(c.on_input("Start tod"), Feedback::CorrectSoFar);
        assert_eq!(c.on_input("Start todX"), Feedback::Wrong);
        assert_eq!(c.state(), ChallengeState::Typing);
        assert!(!c.can_exit());
        assert_eq!(c.on_input("  Start today. "), Feedback::Success);
        assert!(c.can_exit());
        // terminal: further input ignored
        assert_eq!(c.on_input("nonsense"), Feedback::Success);
        assert_eq!(c.input(), "  Start today. ");
    }

    #[test]
    fn match_is_case_sensitive() {
        let mut c = challenge("Start today.");
        assert_eq!(c.on_input("start today."), Feedback::Wrong);
        assert_eq!(c.state(), ChallengeState::Typing);
    }

    #[test]
    fn submit_clears_wrong_input() {
        let mut c = challenge("Go");
        c.on_input("Gx");
        assert_eq!(c.submit("  "), Feedback::Empty);
        assert_eq!(c.submit("Gx"), Feedback::Wrong);
        assert_eq!(c.input(), "");
        assert_eq!(c.submit("Go"), Feedback::Success);
        assert_eq!(c.state(), ChallengeState::Succeeded);
    }

    #[test]
    fn cancel_stops_signal() {
        let mut c = challenge("Go");
        assert!(c.signal().is_active());
        c.cancel();
        assert!(!c.signal().is_active());
        assert_eq!(c.state(), ChallengeState::Cancelled);
        assert!(c.can_exit());
        assert_eq!(c.on_input("Go"), Feedback::Hidden);
    }

    #[test]
    fn pick_quote_falls_back_to_default() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_quote(&[], &mut rng), DEFAULT_QUOTE);
        let quotes = vec!["a".to_string(), "b".to_string()];
        let picked = pick_quote(&quotes, &mut rng);
        assert!(quotes.contains(&picked));
    }

    #[test]
    fn success_counted_once_per_day() {
        let db = Database::in_memory().unwrap();
        let c = challenge("Go");
        assert!(c.complete(&db, "2026-10-19").unwrap());
        assert!(!c.signal().is_active());
        assert!(!c.complete(&db, "2026-10-19").unwrap());
        assert!(complete_morning(&db, c.signal(), "2026-10-20").unwrap());
        assert_eq!(db.success_count().unwrap(), 2);
        assert_eq!(db.last_success_date().unwrap().as_deref(), Some("2026-10-20"));
    }

    #[test]
    fn default_quotes_seed_only_once() {
        let db = Database::in_memory().unwrap();
        assert_eq!(ensure_default_quotes(&db).unwrap().len(), 3);
        db.save_quotes(&[]).unwrap();
        assert!(ensure_default_quotes(&db).unwrap().is_empty());
    }
}
