use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

use crate::config::Theme;
use crate::models::{Task, TaskCategory};
use crate::tui::widgets::color::parse_color;

fn truncate(text: String, max_width: usize) -> String {
    if text.chars().count() > max_width {
        text.chars().take(max_width.saturating_sub(3)).collect::<String>() + "..."
    } else {
        text
    }
}

/// One row per task: status marker, title, and the category icon in its color
pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    title: &str,
    tasks: &[Task],
    categories: &[TaskCategory],
    list_state: &mut ListState,
    theme: &Theme,
) {
    // 2 for borders, 2 for the highlight symbol
    let max_width = area.width.saturating_sub(4) as usize;
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let success = parse_color(&theme.success);

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let category = categories.iter().find(|c| c.id == task.category_id);
            let marker = if task.is_completed { "✓" } else { "○" };
            let marker_style = if task.is_completed {
                Style::default().fg(success)
            } else {
                Style::default().fg(fg_color)
            };
            let label = truncate(format!("{} {}", task.priority.emoji(), task.title), max_width.saturating_sub(6));
            let mut spans = vec![
                Span::styled(format!("{} ", marker), marker_style),
                Span::raw(label),
            ];
            if let Some(category) = category {
                spans.push(Span::styled(
                    format!(" {}", category.icon),
                    Style::default().fg(parse_color(&category.color)),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string())
                .style(Style::default().fg(fg_color).bg(bg_color)),
        )
        .highlight_style(
            Style::default()
                .fg(parse_color(&theme.accent))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    f.render_stateful_widget(list, area, list_state);
}
