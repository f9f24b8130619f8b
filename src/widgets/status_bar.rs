use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::ui::{AppState, ToastLevel};

fn busy_text(state: &AppState) -> Option<String> {
    if state.board.is_submitting() {
        Some("Submitting...".into())
    } else if state.listing.loading {
        Some(format!("Loading {}", state.listing.entity))
    } else {
        None
    }
}

/// Spinner for background work, the current toast, then key help.
pub fn draw_footer(f: &mut Frame, area: Rect, state: &AppState, help_text: &str) {
    let mut spans: Vec<Span> = Vec::new();
    if let Some(msg) = busy_text(state) {
        let spinner = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"][state.tick as usize % 6];
        spans.push(Span::raw(format!(" {spinner} {msg}")));
        spans.push(Span::raw("  |  "));
    }
    if let Some(t) = &state.toast {
        let color = state.theme.toast_color(t.level);
        let tag = match t.level {
            ToastLevel::Success => "[OK]",
            ToastLevel::Error => "[ERROR]",
            ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!("{tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("{}  |  ", t.text),
            Style::default().fg(color),
        ));
    }
    if state.board.hooks().guard {
        spans.push(Span::styled(
            "unsaved  |  ",
            Style::default().fg(state.theme.selected),
        ));
    }
    spans.push(Span::styled(
        help_text.to_string(),
        Style::default().fg(state.theme.muted),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
