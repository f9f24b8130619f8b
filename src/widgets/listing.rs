use crate::schema::humanize;
use crate::ui::AppState;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::{Cell, Paragraph, Row as TableRow, Table, TableState};

const MIN_COLUMN_WIDTH: u16 = 12;

/// Columns for the current table: the form's fields when it has a form,
/// otherwise whatever keys the rows carry, in first-seen order.
pub(crate) fn listing_columns(state: &AppState) -> Vec<String> {
    if let Some(schema) = state.dispatcher.schema() {
        return schema.fields().iter().map(|f| f.name.clone()).collect();
    }
    let mut cols: Vec<String> = Vec::new();
    for row in &state.listing.rows {
        for key in row.cells.keys() {
            if !cols.contains(key) {
                cols.push(key.clone());
            }
        }
    }
    cols
}

fn listing_title(state: &AppState) -> String {
    let l = &state.listing;
    let name = humanize(&l.entity);
    let mut title = format!(" {name}  page {} of {}", l.page + 1, l.total_pages.max(1));
    if let Some(total) = l.total {
        title.push_str(&format!(" ({} of {total} rows)", l.rows.len()));
    }
    if l.loading {
        title.push_str("  loading...");
    }
    title.push(' ');
    title
}

pub fn draw_listing(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let block = panel_block(listing_title(state), !state.board.is_visible(), theme);

    if let Some(err) = &state.listing.error {
        let p = Paragraph::new(err.clone())
            .style(Style::default().fg(theme.error))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let mut columns = listing_columns(state);
    let fit = (area.width.saturating_sub(2) / MIN_COLUMN_WIDTH).max(1) as usize;
    columns.truncate(fit);
    if columns.is_empty() || state.listing.rows.is_empty() {
        let text = if state.listing.loading {
            "Loading..."
        } else {
            "No rows."
        };
        f.render_widget(
            Paragraph::new(text).style(theme.text_muted()).block(block),
            area,
        );
        return;
    }

    let header = TableRow::new(
        columns
            .iter()
            .map(|c| Cell::from(humanize(c)).style(theme.text_active_bold())),
    );
    let rows = state.listing.rows.iter().map(|row| {
        TableRow::new(columns.iter().map(|c| {
            Cell::from(row.cells.get(c).cloned().unwrap_or_default())
        }))
    });
    let widths = vec![Constraint::Fill(1); columns.len()];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(theme.list_cursor_style())
        .highlight_symbol("› ");
    let mut ts = TableState::default().with_selected(Some(state.listing.selected));
    f.render_stateful_widget(table, area, &mut ts);
}
