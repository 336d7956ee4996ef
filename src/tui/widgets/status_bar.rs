use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Paragraph;

use crate::config::Theme;
use crate::tui::widgets::color::parse_color;

const SEPARATOR: &str = " • ";
const ELLIPSIS: &str = "...";

/// Join as many hints as fit in `max_width`, ending with an ellipsis when some are dropped
pub fn fit_hints(key_hints: &[&str], max_width: usize) -> String {
    let mut hints_text = String::new();
    for (i, hint) in key_hints.iter().enumerate() {
        let current_len = hints_text.chars().count();
        let would_be_len = if i == 0 {
            hint.chars().count()
        } else {
            current_len + SEPARATOR.chars().count() + hint.chars().count()
        };

        if would_be_len > max_width {
            let keep = if hints_text.is_empty() { *hint } else { hints_text.as_str() };
            let room = max_width.saturating_sub(ELLIPSIS.len());
            let mut truncated: String = keep.chars().take(room).collect();
            truncated.push_str(ELLIPSIS);
            return truncated;
        }

        if i > 0 {
            hints_text.push_str(SEPARATOR);
        }
        hints_text.push_str(hint);
    }
    hints_text
}

pub fn render_status_bar(f: &mut Frame, area: Rect, message: Option<&str>, key_hints: &[&str], theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let max_width = area.width as usize;

    let (content, style) = match message {
        Some(msg) => {
            let mut content = msg.to_string();
            if content.chars().count() > max_width {
                content = content.chars().take(max_width.saturating_sub(3)).collect::<String>() + ELLIPSIS;
            }
            (
                content,
                Style::default()
                    .fg(parse_color(&theme.accent))
                    .bg(bg_color)
                    .add_modifier(Modifier::BOLD),
            )
        }
        None => (fit_hints(key_hints, max_width), Style::default().fg(fg_color).bg(bg_color)),
    };

    f.render_widget(Paragraph::new(content).style(style), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_fit_or_get_truncated() {
        assert_eq!(fit_hints(&["Enter next", "Esc back"], 40), "Enter next • Esc back");
        assert_eq!(fit_hints(&["Enter next", "Esc back"], 15), "Enter next...");
        assert_eq!(fit_hints(&["A very long hint"], 8), "A ver...");
    }
}
