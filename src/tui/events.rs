use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size as terminal_size,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::time::Duration;

use crate::tui::error::TuiError;
use crate::tui::layout::Layout;

/// What the event loop should do after a key press or tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A full-screen view driven by [`run_screen`]
pub trait Screen {
    fn render(&mut self, f: &mut Frame, layout: &Layout);
    fn handle_key(&mut self, key: KeyEvent) -> Result<Flow, TuiError>;
    /// Called once per loop iteration, between key events
    fn tick(&mut self) -> Result<Flow, TuiError> {
        Ok(Flow::Continue)
    }
}

/// Guard that ensures terminal state is restored even on panic
/// If the terminal is left in raw mode or alternate screen, the user's terminal will be unusable.
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    /// Initialize terminal state and return a guard
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Manually restore terminal state (called on normal exit)
    /// After calling this, the guard will do nothing on drop
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Already in a cleanup path; errors can only be logged
        if self.raw_mode_enabled {
            if let Err(e) = disable_raw_mode() {
                tracing::warn!(error = %e, "failed to leave raw mode");
            }
        }
        if self.alternate_screen_enabled {
            if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen) {
                tracing::warn!(error = %e, "failed to leave alternate screen");
            }
        }
    }
}

pub fn run_screen<S: Screen>(screen: &mut S) -> Result<(), TuiError> {
    // Check terminal size before entering alternate screen
    // so the error is readable in the normal terminal
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;

    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    let mut guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        if screen.tick()? == Flow::Exit {
            break;
        }

        terminal.draw(|f| {
            let layout = Layout::calculate(f.area());
            screen.render(f, &layout);
        })?;

        // Only process Press events to avoid duplicate processing on Windows
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press && screen.handle_key(key_event)? == Flow::Exit {
                    break;
                }
            }
        }
    }

    guard.restore()?;

    Ok(())
}
