use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Gauge};

use crate::config::Theme;
use crate::stats::rating_emoji;
use crate::tui::widgets::color::{parse_color, rating_color};

/// A 0-10 gauge; `focused` draws the border in the accent color
pub fn render_rating_bar(f: &mut Frame, area: Rect, title: &str, rating: u8, focused: bool, theme: &Theme) {
    let border = if focused {
        Style::default().fg(parse_color(&theme.accent)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(parse_color(&theme.fg))
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string())
                .border_style(border),
        )
        .gauge_style(Style::default().fg(rating_color(rating)))
        .ratio(f64::from(rating.min(10)) / 10.0)
        .label(format!("{} / 10 {}", rating, rating_emoji(rating)));

    f.render_widget(gauge, area);
}
