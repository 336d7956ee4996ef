use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout as RatLayout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, ListState, Paragraph, Wrap};
use std::time::{Duration, Instant};

use crate::Config;
use crate::config::Theme;
use crate::database::Database;
use crate::evening::{BackOutcome, EveningReview, EveningStep, closing_message};
use crate::signal::SignalHandle;
use crate::tui::error::TuiError;
use crate::tui::events::{Flow, Screen, run_screen};
use crate::tui::layout::Layout;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::notice::render_notice;
use crate::tui::widgets::rating_bar::render_rating_bar;
use crate::tui::widgets::status_bar::render_status_bar;
use crate::tui::widgets::task_list::render_task_list;

const BACK_BLOCKED: &str = "Rate your day first to turn off the alarm";
const SKIP_BLOCKED: &str = "Finish the first step before skipping";

pub struct EveningScreen<'a> {
    review: EveningReview<'a, Local>,
    list_state: ListState,
    notice: Option<&'static str>,
    finished_at: Option<Instant>,
    close_delay: Duration,
    theme: Theme,
}

impl<'a> EveningScreen<'a> {
    pub fn new(review: EveningReview<'a, Local>, config: &Config) -> Self {
        let mut screen = Self {
            review,
            list_state: ListState::default(),
            notice: None,
            finished_at: None,
            close_delay: config.success_close_delay(),
            theme: config.get_active_theme(),
        };
        screen.reset_selection();
        screen
    }

    pub fn step(&self) -> EveningStep {
        self.review.step()
    }

    fn item_count(&self) -> usize {
        match self.review.step() {
            EveningStep::CategoryRatings => self.review.categories().len(),
            EveningStep::TaskTriage => self.review.tasks().len(),
            EveningStep::OverallRating | EveningStep::Done => 0,
        }
    }

    fn reset_selection(&mut self) {
        let selected = if self.item_count() > 0 { Some(0) } else { None };
        self.list_state.select(selected);
    }

    fn move_selection(&mut self, down: bool) {
        let count = self.item_count();
        if count == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0);
        let next = if down {
            (current + 1).min(count - 1)
        } else {
            current.saturating_sub(1)
        };
        self.list_state.select(Some(next));
    }

    fn adjust_rating(&mut self, delta: i8) {
        match self.review.step() {
            EveningStep::OverallRating => {
                let rating = self.review.daily_rating().saturating_add_signed(delta);
                self.review.set_daily_rating(rating);
            }
            EveningStep::CategoryRatings => {
                let Some(index) = self.list_state.selected() else {
                    return;
                };
                let Some(id) = self.review.categories().get(index).map(|c| c.id.clone()) else {
                    return;
                };
                let rating = self.review.category_rating(&id).saturating_add_signed(delta);
                self.review.set_category_rating(&id, rating);
            }
            EveningStep::TaskTriage | EveningStep::Done => {}
        }
    }

    fn toggle_selected(&mut self) -> Result<(), TuiError> {
        if self.review.step() != EveningStep::TaskTriage {
            return Ok(());
        }
        let Some(index) = self.list_state.selected() else {
            return Ok(());
        };
        if let Some(id) = self.review.tasks().get(index).map(|t| t.id.clone()) {
            self.review.toggle_task(&id)?;
        }
        Ok(())
    }

    fn render_step_indicator(&self, f: &mut Frame, area: Rect) {
        let accent = parse_color(&self.theme.accent);
        let current = self.review.step().number();
        let mut spans: Vec<Span> = (1..=3u8)
            .map(|n| {
                if n <= current {
                    Span::styled("● ", Style::default().fg(accent))
                } else {
                    Span::raw("○ ")
                }
            })
            .collect();
        if self.review.step() != EveningStep::Done {
            spans.push(Span::raw(format!(" Step {} of 3: ", current)));
        }
        spans.push(Span::styled(
            self.review.step().title(),
            Style::default().add_modifier(Modifier::BOLD),
        ));

        let header = Paragraph::new(vec![Line::from(spans), Line::from(self.review.today().to_string())])
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_categories(&mut self, f: &mut Frame, area: Rect) {
        let categories = self.review.categories();
        if categories.is_empty() {
            f.render_widget(
                Paragraph::new("No categories yet. Press Enter to continue.").alignment(Alignment::Center),
                area,
            );
            return;
        }

        // Keep the selected bar in view when the terminal is short
        let visible = usize::from(area.height / 3).max(1);
        let selected = self.list_state.selected().unwrap_or(0);
        let first = selected.saturating_sub(visible - 1);
        let shown: Vec<_> = categories.iter().enumerate().skip(first).take(visible).collect();

        let rows = RatLayout::vertical(shown.iter().map(|_| Constraint::Length(3))).split(area);
        for ((index, category), row) in shown.into_iter().zip(rows.iter()) {
            let title = format!("{} {}", category.icon, category.name);
            render_rating_bar(
                f,
                *row,
                &title,
                self.review.category_rating(&category.id),
                index == selected,
                &self.theme,
            );
        }
    }

    fn render_tasks(&mut self, f: &mut Frame, area: Rect) {
        let open = self.review.incomplete_count();
        let [banner_area, list_area] =
            RatLayout::vertical([Constraint::Length(2), Constraint::Min(3)]).areas(area);

        let banner = if self.review.tasks().is_empty() {
            "No tasks for today".to_string()
        } else if open == 0 {
            "Everything done for today".to_string()
        } else {
            format!("{} unfinished task(s) will move to tomorrow", open)
        };
        f.render_widget(
            Paragraph::new(banner)
                .style(Style::default().fg(parse_color(&self.theme.accent)))
                .alignment(Alignment::Center),
            banner_area,
        );

        let tasks = self.review.tasks().to_vec();
        let categories = self.review.categories().to_vec();
        render_task_list(
            f,
            list_area,
            "Tasks",
            &tasks,
            &categories,
            &mut self.list_state,
            &self.theme,
        );
    }

    fn hints(&self) -> &'static [&'static str] {
        match self.review.step() {
            EveningStep::OverallRating => &["←/→ rating", "Enter next", "Esc back", "Ctrl+X stop"],
            EveningStep::CategoryRatings => &["↑/↓ select", "←/→ rating", "Enter next", "Esc back", "s skip"],
            EveningStep::TaskTriage => &["↑/↓ select", "Space done", "Enter finish", "Esc back", "s skip"],
            EveningStep::Done => &["Good night"],
        }
    }
}

impl Screen for EveningScreen<'_> {
    fn render(&mut self, f: &mut Frame, layout: &Layout) {
        let fg_color = parse_color(&self.theme.fg);
        let bg_color = parse_color(&self.theme.bg);

        let outer_block = Block::default()
            .borders(Borders::ALL)
            .title("Evening review")
            .title_alignment(Alignment::Center)
            .style(Style::default().fg(fg_color).bg(bg_color));
        f.render_widget(outer_block, f.area());

        self.render_step_indicator(f, layout.header_area);

        match self.review.step() {
            EveningStep::OverallRating => {
                let [bar_area, _] =
                    RatLayout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(layout.main_area);
                render_rating_bar(f, bar_area, "Today", self.review.daily_rating(), true, &self.theme);
            }
            EveningStep::CategoryRatings => self.render_categories(f, layout.main_area),
            EveningStep::TaskTriage => self.render_tasks(f, layout.main_area),
            EveningStep::Done => {
                let message = Paragraph::new(closing_message(self.review.daily_rating()))
                    .style(
                        Style::default()
                            .fg(parse_color(&self.theme.success))
                            .add_modifier(Modifier::BOLD),
                    )
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                f.render_widget(message, layout.main_area);
            }
        }

        render_status_bar(f, layout.status_area, None, self.hints(), &self.theme);

        if let Some(notice) = self.notice {
            render_notice(f, layout.main_area, "Evening review", &[notice, "", "Press any key"], &self.theme);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<Flow, TuiError> {
        if self.notice.take().is_some() {
            return Ok(Flow::Continue);
        }
        if self.review.step() == EveningStep::Done {
            return Ok(Flow::Exit);
        }

        match key.code {
            KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.review.emergency_stop()?;
                return Ok(Flow::Exit);
            }
            KeyCode::Left | KeyCode::Char('-') => self.adjust_rating(-1),
            KeyCode::Right | KeyCode::Char('+') => self.adjust_rating(1),
            KeyCode::Char(c @ '0'..='9') if self.review.step() == EveningStep::OverallRating => {
                let digit = c.to_digit(10).unwrap_or(0) as u8;
                // 0 stands for 10 on the number row
                self.review.set_daily_rating(if digit == 0 { 10 } else { digit });
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Char(' ') => self.toggle_selected()?,
            KeyCode::Enter => {
                let step = self.review.next()?;
                if step == EveningStep::Done {
                    self.finished_at = Some(Instant::now());
                }
                self.reset_selection();
            }
            KeyCode::Esc | KeyCode::Backspace => match self.review.back()? {
                BackOutcome::MovedTo(_) => self.reset_selection(),
                BackOutcome::Blocked => self.notice = Some(BACK_BLOCKED),
                BackOutcome::Exit => return Ok(Flow::Exit),
            },
            KeyCode::Char('s') => {
                if self.review.skip() {
                    return Ok(Flow::Exit);
                }
                self.notice = Some(SKIP_BLOCKED);
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn tick(&mut self) -> Result<Flow, TuiError> {
        match self.finished_at {
            Some(at) if at.elapsed() >= self.close_delay => Ok(Flow::Exit),
            _ => Ok(Flow::Continue),
        }
    }
}

/// Ring the evening alarm and walk through the review, resuming an interrupted one
pub fn run_evening(
    db: &Database,
    config: &Config,
    signal: SignalHandle,
    now: DateTime<Local>,
) -> Result<EveningStep, TuiError> {
    signal.start();
    let review = EveningReview::resume(db, signal.clone(), now)?;
    let mut screen = EveningScreen::new(review, config);
    let result = run_screen(&mut screen);
    if result.is_err() {
        signal.stop();
    }
    result?;
    Ok(screen.step())
}
