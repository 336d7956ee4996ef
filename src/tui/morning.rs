use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout as RatLayout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::time::{Duration, Instant};

use crate::Config;
use crate::challenge::{self, ChallengeState, Feedback, MorningChallenge};
use crate::config::Theme;
use crate::database::Database;
use crate::signal::SignalHandle;
use crate::tui::error::TuiError;
use crate::tui::events::{Flow, Screen, run_screen};
use crate::tui::layout::Layout;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::notice::render_notice;
use crate::tui::widgets::status_bar::render_status_bar;
use crate::utils;

const EXIT_BLOCKED: &str = "The alarm stays on until you type the sentence";

pub struct MorningScreen<'a> {
    db: &'a Database,
    challenge: MorningChallenge,
    feedback: Feedback,
    notice: Option<&'static str>,
    succeeded_at: Option<Instant>,
    close_delay: Duration,
    theme: Theme,
    today: String,
    show_submit: bool,
}

impl<'a> MorningScreen<'a> {
    pub fn new(db: &'a Database, challenge: MorningChallenge, config: &Config) -> Self {
        Self {
            db,
            challenge,
            feedback: Feedback::Hidden,
            notice: None,
            succeeded_at: None,
            close_delay: config.success_close_delay(),
            theme: config.get_active_theme(),
            today: utils::date_key(&Local::now()),
            show_submit: config.show_submit,
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.challenge.state()
    }

    fn apply(&mut self, feedback: Feedback) -> Result<(), TuiError> {
        self.feedback = feedback;
        if feedback == Feedback::Success && self.succeeded_at.is_none() {
            self.challenge.complete(self.db, &self.today)?;
            self.succeeded_at = Some(Instant::now());
        }
        Ok(())
    }

    fn hints(&self) -> Vec<&'static str> {
        let mut hints = vec!["Type the sentence"];
        if self.show_submit {
            hints.push("Enter check");
        }
        hints.push("Ctrl+X emergency stop");
        hints
    }

    fn feedback_style(&self) -> Style {
        let color = match self.feedback {
            Feedback::Success => &self.theme.success,
            Feedback::Wrong | Feedback::Empty => &self.theme.error,
            Feedback::CorrectSoFar | Feedback::Hidden => &self.theme.accent,
        };
        Style::default().fg(parse_color(color)).add_modifier(Modifier::BOLD)
    }
}

impl Screen for MorningScreen<'_> {
    fn render(&mut self, f: &mut Frame, layout: &Layout) {
        let fg_color = parse_color(&self.theme.fg);
        let bg_color = parse_color(&self.theme.bg);
        let accent = parse_color(&self.theme.accent);

        let outer_block = Block::default()
            .borders(Borders::ALL)
            .title("Good morning")
            .title_alignment(Alignment::Center)
            .style(Style::default().fg(fg_color).bg(bg_color));
        f.render_widget(outer_block, f.area());

        let date = Local::now().format("%A, %-d %B %Y").to_string();
        let header = Paragraph::new(vec![
            Line::from(date),
            Line::from("Type the sentence below to turn off the alarm"),
        ])
        .alignment(Alignment::Center);
        f.render_widget(header, layout.header_area);

        let [quote_area, input_area, feedback_area] = RatLayout::vertical([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .areas(layout.main_area);

        let quote = Paragraph::new(self.challenge.quote().to_string())
            .block(Block::default().borders(Borders::ALL).title("Sentence"))
            .style(Style::default().fg(accent).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(quote, quote_area);

        let input_block = Block::default()
            .borders(Borders::ALL)
            .title("Your answer")
            .border_style(self.feedback_style());
        let inner = input_block.inner(input_area);
        let input_text = self.challenge.input().to_string();
        let cursor_offset = input_text.chars().count() as u16;
        f.render_widget(Paragraph::new(input_text).block(input_block), input_area);
        if !self.challenge.state().is_terminal() {
            f.set_cursor_position((inner.x + cursor_offset.min(inner.width.saturating_sub(1)), inner.y));
        }

        let feedback = Paragraph::new(self.feedback.message())
            .style(self.feedback_style())
            .alignment(Alignment::Center);
        f.render_widget(feedback, feedback_area);

        render_status_bar(f, layout.status_area, None, &self.hints(), &self.theme);

        if let Some(notice) = self.notice {
            render_notice(f, layout.main_area, "Alarm", &[notice, "", "Press any key"], &self.theme);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Flow, TuiError> {
        if self.notice.take().is_some() {
            return Ok(Flow::Continue);
        }
        if self.succeeded_at.is_some() {
            return Ok(Flow::Continue);
        }

        match key.code {
            KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.challenge.cancel();
                return Ok(Flow::Exit);
            }
            KeyCode::Esc => {
                if self.challenge.can_exit() {
                    return Ok(Flow::Exit);
                }
                self.notice = Some(EXIT_BLOCKED);
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.notice = Some(EXIT_BLOCKED);
            }
            KeyCode::Enter if self.show_submit => {
                let input = self.challenge.input().to_string();
                let feedback = self.challenge.submit(&input);
                self.apply(feedback)?;
            }
            KeyCode::Backspace => {
                let mut input = self.challenge.input().to_string();
                input.pop();
                let feedback = self.challenge.on_input(&input);
                self.apply(feedback)?;
            }
            KeyCode::Char(c) => {
                let mut input = self.challenge.input().to_string();
                input.push(c);
                let feedback = self.challenge.on_input(&input);
                self.apply(feedback)?;
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn tick(&mut self) -> Result<Flow, TuiError> {
        if self.challenge.state() == ChallengeState::Cancelled {
            return Ok(Flow::Exit);
        }
        match self.succeeded_at {
            Some(at) if at.elapsed() >= self.close_delay => Ok(Flow::Exit),
            _ => Ok(Flow::Continue),
        }
    }
}

/// Ring the morning alarm until the challenge is solved or stopped
pub fn run_morning(db: &Database, config: &Config, signal: SignalHandle) -> Result<ChallengeState, TuiError> {
    let quotes = challenge::ensure_default_quotes(db)?;
    let quote = if quotes.is_empty() {
        config.default_quote.clone()
    } else {
        challenge::pick_quote(&quotes, &mut rand::thread_rng())
    };

    signal.start();
    let mut screen = MorningScreen::new(db, MorningChallenge::new(quote, signal.clone()), config);
    let result = run_screen(&mut screen);
    if screen.state() != ChallengeState::Succeeded {
        tracing::info!(state = ?screen.state(), "morning screen closed before success");
    }
    if result.is_err() {
        signal.stop();
    }
    result?;
    Ok(screen.state())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(screen: &mut MorningScreen, code: KeyCode) -> Flow {
        screen.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    #[test]
    fn typing_the_quote_completes_and_closes_after_delay() {
        let db = Database::in_memory().unwrap();
        let signal = SignalHandle::silent();
        signal.start();
        let mut config = Config::default();
        config.success_close_delay_ms = 0;
        let mut screen = MorningScreen::new(&db, MorningChallenge::new("Go now".into(), signal.clone()), &config);

        assert_eq!(press(&mut screen, KeyCode::Esc), Flow::Continue);
        assert!(screen.notice.is_some());
        press(&mut screen, KeyCode::Char('a'));
        assert!(screen.notice.is_none());

        for c in "Go x".chars() {
            press(&mut screen, KeyCode::Char(c));
        }
        assert_eq!(screen.feedback, Feedback::Wrong);
        press(&mut screen, KeyCode::Backspace);
        assert_eq!(screen.feedback, Feedback::CorrectSoFar);
        for c in "now".chars() {
            press(&mut screen, KeyCode::Char(c));
        }
        assert_eq!(screen.state(), ChallengeState::Succeeded);
        assert!(!signal.is_active());
        assert_eq!(db.success_count().unwrap(), 1);
        assert_eq!(screen.tick().unwrap(), Flow::Exit);
    }

    #[test]
    fn emergency_stop_exits_without_success() {
        let db = Database::in_memory().unwrap();
        let signal = SignalHandle::silent();
        signal.start();
        let mut screen = MorningScreen::new(&db, MorningChallenge::new("Go".into(), signal.clone()), &Config::default());
        let flow = screen
            .handle_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL))
            .unwrap();
        assert_eq!(flow, Flow::Exit);
        assert_eq!(screen.state(), ChallengeState::Cancelled);
        assert!(!signal.is_active());
        assert_eq!(db.success_count().unwrap(), 0);
    }

    #[test]
    fn enter_checks_only_when_submit_is_shown() {
        let db = Database::in_memory().unwrap();
        let mut screen = MorningScreen::new(&db, MorningChallenge::new("Go".into(), SignalHandle::silent()), &Config::default());
        assert!(!screen.hints().contains(&"Enter check"));
        press(&mut screen, KeyCode::Char('x'));
        press(&mut screen, KeyCode::Enter);
        assert_eq!(screen.feedback, Feedback::Wrong);
        assert_eq!(screen.challenge.input(), "x");

        let mut config = Config::default();
        config.show_submit = true;
        let mut screen = MorningScreen::new(&db, MorningChallenge::new("Go".into(), SignalHandle::silent()), &config);
        assert!(screen.hints().contains(&"Enter check"));
        press(&mut screen, KeyCode::Char('x'));
        press(&mut screen, KeyCode::Enter);
        assert_eq!(screen.challenge.input(), "");
    }
}
