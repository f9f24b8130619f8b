use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Tabs};

use crate::schema::humanize;
use crate::ui::AppState;

/// One tab per configured entity: `[F1] Address │ [F2] Person ...`
pub fn draw_entity_tabs(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let mut titles: Vec<Line> = Vec::new();
    for (i, entity) in state.config.entities.iter().enumerate() {
        let is_selected = i == state.tab;
        let text_style = if is_selected {
            Style::default()
                .fg(theme.selected)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.muted)
        };
        let key_style = if is_selected {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.muted)
        };
        let mut spans = vec![
            Span::styled("[", Style::default().fg(theme.frame)),
            Span::styled(format!("F{}", i + 1), key_style),
            Span::styled("]", Style::default().fg(theme.frame)),
            Span::raw(" "),
            Span::styled(humanize(entity), text_style),
        ];
        if !state.dispatcher.has_form(entity) {
            spans.push(Span::styled(" (view only)", theme.text_muted()));
        }
        titles.push(Line::from(spans));
    }

    let tabs = Tabs::new(titles)
        .select(state.tab)
        .style(Style::default().fg(theme.fg))
        .highlight_style(
            Style::default()
                .fg(theme.selected)
                .add_modifier(Modifier::BOLD),
        )
        .divider(Span::styled(" │ ", Style::default().fg(theme.frame)));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(theme.frame))
        .title_bottom(
            Line::from(Span::styled(
                format!(" {} ", state.config.title),
                theme.text_active_bold(),
            ))
            .right_aligned(),
        );

    f.render_widget(tabs.block(block), area);
}

/// Tab index for a function key (F1 = first tab). None when out of range.
pub fn tab_for_function_key(state: &AppState, key_num: u8) -> Option<usize> {
    let index = (key_num as usize).checked_sub(1)?;
    (index < state.config.entities.len()).then_some(index)
}

/// Left/Right neighbour, wrapping around.
pub fn neighbour_tab(state: &AppState, forward: bool) -> Option<usize> {
    let n = state.config.entities.len();
    if n == 0 {
        return None;
    }
    Some(if forward {
        (state.tab + 1) % n
    } else {
        (state.tab + n - 1) % n
    })
}
