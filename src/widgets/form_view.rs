//! The board overlay: draws the top record's render tree and turns keys
//! into board messages. Holds cursor and edit-buffer state only; values
//! live in the record.

use crate::app::AppMsg;
use crate::board::{FormController, Status};
use crate::render::{FieldRender, RenderTree, RenderUnit};
use crate::schema::encode_list;
use crate::theme::Theme;
use crate::ui::TuiHooks;
use crate::validate::FieldMark;
use crate::widgets::chrome::{centered_rect, panel_block};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tui_textarea::{Input, Key, TextArea};

enum Editor {
    /// Single-line buffer for text, date and numeric inputs.
    Line(String),
    /// Item being typed for a repeatable list.
    ListItem(String),
    LongText(TextArea<'static>),
}

#[derive(Default)]
pub struct FormView {
    selected: usize,
    option_cursor: usize,
    editor: Option<Editor>,
    depth: usize,
}

impl FormView {
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Forget cursor and buffers; called whenever a different record is on top.
    pub fn reset(&mut self, depth: usize) {
        *self = Self {
            depth,
            ..Self::default()
        };
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn is_editing(&self) -> bool {
        self.editor.is_some()
    }

    fn current<'t>(&self, tree: &'t RenderTree) -> Option<&'t FieldRender> {
        tree.fields().nth(self.selected)
    }

    fn move_by(&mut self, delta: i64, total: usize) {
        if total == 0 {
            return;
        }
        let next = (self.selected as i64 + delta).rem_euclid(total as i64);
        self.selected = next as usize;
        self.option_cursor = 0;
    }

    pub fn on_key(&mut self, key: KeyEvent, tree: &RenderTree) -> Vec<AppMsg> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if self.editor.is_some() {
            return self.on_editor_key(key, ctrl, tree);
        }
        let total = tree.fields().count();
        match key.code {
            KeyCode::Esc => return vec![AppMsg::RequestClose],
            KeyCode::Char('s') => return vec![AppMsg::Submit],
            KeyCode::Char('q') => return vec![AppMsg::Quit],
            KeyCode::Up | KeyCode::BackTab => self.move_by(-1, total),
            KeyCode::Down | KeyCode::Tab => self.move_by(1, total),
            _ => {
                let Some(field) = self.current(tree) else {
                    return Vec::new();
                };
                if field.unit.is_disabled() {
                    return Vec::new();
                }
                return self.on_field_key(key.code, field);
            }
        }
        Vec::new()
    }

    fn on_field_key(&mut self, code: KeyCode, field: &FieldRender) -> Vec<AppMsg> {
        let edit = |value: String| {
            vec![AppMsg::EditField {
                name: field.name.clone(),
                value,
            }]
        };
        match (field.unit.innermost(), code) {
            (RenderUnit::TextInput { value, .. }, KeyCode::Enter)
            | (RenderUnit::DateInput { value, .. }, KeyCode::Enter) => {
                self.editor = Some(Editor::Line(value.clone()));
            }
            (RenderUnit::LongText { value }, KeyCode::Enter) => {
                let mut ta = TextArea::from(value.lines().map(str::to_string));
                ta.set_block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("Editing: {} (Ctrl+S save, Esc cancel)", field.label)),
                );
                self.editor = Some(Editor::LongText(ta));
            }
            (RenderUnit::RepeatableList { .. }, KeyCode::Enter) => {
                self.editor = Some(Editor::ListItem(String::new()));
            }
            (RenderUnit::RepeatableList { items, .. }, KeyCode::Char('x')) => {
                let mut items = items.clone();
                if items.pop().is_some() {
                    return edit(encode_list(&items));
                }
            }
            (
                RenderUnit::SingleSelect {
                    options,
                    nullable_option,
                    value,
                },
                KeyCode::Left | KeyCode::Right,
            ) => {
                let mut choices: Vec<&str> = Vec::new();
                if *nullable_option {
                    choices.push("");
                }
                choices.extend(options.iter().map(String::as_str));
                if choices.is_empty() {
                    return Vec::new();
                }
                let n = choices.len() as i64;
                let cur = choices.iter().position(|c| c == value);
                let next = match (cur, code) {
                    (None, KeyCode::Left) => n - 1,
                    (None, _) => 0,
                    (Some(i), KeyCode::Left) => (i as i64 - 1).rem_euclid(n),
                    (Some(i), _) => (i as i64 + 1).rem_euclid(n),
                };
                return edit(choices[next as usize].to_string());
            }
            (RenderUnit::MultiChecklist { options, .. }, KeyCode::Left) => {
                if !options.is_empty() {
                    self.option_cursor = (self.option_cursor + options.len() - 1) % options.len();
                }
            }
            (RenderUnit::MultiChecklist { options, .. }, KeyCode::Right) => {
                if !options.is_empty() {
                    self.option_cursor = (self.option_cursor + 1) % options.len();
                }
            }
            (RenderUnit::MultiChecklist { options, checked }, KeyCode::Char(' ')) => {
                let Some(opt) = options.get(self.option_cursor) else {
                    return Vec::new();
                };
                // Keep checked values in option order.
                let now: Vec<&String> = options
                    .iter()
                    .filter(|o| (*o == opt) != checked.contains(*o))
                    .collect();
                return edit(encode_list(&now));
            }
            _ => {}
        }
        Vec::new()
    }

    fn on_editor_key(&mut self, key: KeyEvent, ctrl: bool, tree: &RenderTree) -> Vec<AppMsg> {
        let Some(field) = self.current(tree) else {
            self.editor = None;
            return Vec::new();
        };
        let name = field.name.clone();
        let items = match field.unit.innermost() {
            RenderUnit::RepeatableList { items, .. } => items.clone(),
            _ => Vec::new(),
        };
        let is_list = matches!(self.editor, Some(Editor::ListItem(_)));
        let Some(editor) = self.editor.as_mut() else {
            return Vec::new();
        };
        let mut commit: Option<String> = None;
        let mut close = false;
        match editor {
            Editor::Line(buf) | Editor::ListItem(buf) => match key.code {
                KeyCode::Esc => close = true,
                KeyCode::Backspace => {
                    buf.pop();
                }
                KeyCode::Char(c) if !ctrl => buf.push(c),
                KeyCode::Enter => {
                    close = true;
                    commit = Some(std::mem::take(buf));
                }
                _ => {}
            },
            Editor::LongText(ta) => match key.code {
                KeyCode::Esc => close = true,
                KeyCode::Char('s') if ctrl => {
                    close = true;
                    commit = Some(ta.lines().join("\n"));
                }
                _ => {
                    ta.input(textarea_input(key));
                }
            },
        }
        if close {
            self.editor = None;
        }
        let Some(committed) = commit else {
            return Vec::new();
        };
        let value = if is_list {
            if committed.trim().is_empty() {
                return Vec::new();
            }
            let mut items = items;
            items.push(committed);
            encode_list(&items)
        } else {
            committed
        };
        vec![AppMsg::EditField { name, value }]
    }
}

fn textarea_input(key: KeyEvent) -> Input {
    let k = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Tab => Key::Tab,
        KeyCode::Delete => Key::Delete,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Esc => Key::Esc,
        KeyCode::F(n) => Key::F(n),
        _ => Key::Null,
    };
    Input {
        key: k,
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
    }
}

fn unit_lines(
    unit: &RenderUnit,
    view: &FormView,
    is_selected: bool,
    cursor_on: bool,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let value_style = if is_selected {
        if view.is_editing() {
            theme.text_editing_bold()
        } else {
            theme.text_active_bold()
        }
    } else {
        Style::default().fg(theme.fg)
    };
    let editing_line = match (&view.editor, is_selected) {
        (Some(Editor::Line(buf)), true) => Some(buf.clone()),
        _ => None,
    };
    match unit {
        RenderUnit::TextInput {
            value, placeholder, ..
        } => {
            let mut text = editing_line.unwrap_or_else(|| value.clone());
            if is_selected && view.is_editing() && cursor_on {
                text.push('▏');
            }
            if text.is_empty() {
                vec![Line::from(Span::styled(placeholder.clone(), theme.text_muted()))]
            } else {
                vec![Line::from(Span::styled(text, value_style))]
            }
        }
        RenderUnit::DateInput { date_only, value } => {
            let mut text = editing_line.unwrap_or_else(|| value.clone());
            if is_selected && view.is_editing() && cursor_on {
                text.push('▏');
            }
            let hint = if *date_only {
                "YYYY-MM-DD"
            } else {
                "YYYY-MM-DD HH:MM"
            };
            vec![Line::from(vec![
                Span::styled(text, value_style),
                Span::styled(format!("  ({hint})"), theme.text_muted()),
            ])]
        }
        RenderUnit::LongText { value } => {
            const FOLD: usize = 3;
            let body: Vec<&str> = value.lines().collect();
            let mut out: Vec<Line> = body
                .iter()
                .take(FOLD)
                .map(|l| Line::from(Span::styled(format!("  {l}"), value_style)))
                .collect();
            if body.len() > FOLD {
                let more = body.len() - FOLD;
                out.push(Line::from(Span::styled(
                    format!("  … ({more} more line{})", if more == 1 { "" } else { "s" }),
                    theme.text_muted(),
                )));
            }
            if out.is_empty() {
                out.push(Line::from(Span::styled("  (empty)", theme.text_muted())));
            }
            out
        }
        RenderUnit::SingleSelect {
            options,
            nullable_option,
            value,
        } => {
            let shown = if value.is_empty() { "(none)" } else { value };
            let count = options.len() + usize::from(*nullable_option);
            vec![Line::from(vec![
                Span::styled(format!("‹ {shown} ›"), value_style),
                Span::styled(format!("  {count} choices"), theme.text_muted()),
            ])]
        }
        RenderUnit::MultiChecklist { options, checked } => {
            let mut spans: Vec<Span> = Vec::new();
            for (i, opt) in options.iter().enumerate() {
                let mark = if checked.contains(opt) { "[x]" } else { "[ ]" };
                let style = if is_selected && i == view.option_cursor {
                    theme.list_cursor_style()
                } else {
                    value_style
                };
                spans.push(Span::styled(format!("{mark} {opt}"), style));
                spans.push(Span::raw(" "));
            }
            vec![Line::from(spans)]
        }
        RenderUnit::RepeatableList {
            items,
            add_control,
            remove_control,
        } => {
            let mut spans = vec![Span::styled(format!("[{}]", items.join(", ")), value_style)];
            if *add_control {
                spans.push(Span::styled(" [+]", theme.text_muted()));
            }
            if *remove_control {
                spans.push(Span::styled(" [-]", theme.text_muted()));
            }
            if let (Some(Editor::ListItem(buf)), true) = (&view.editor, is_selected) {
                let mut typed = buf.clone();
                if cursor_on {
                    typed.push('▏');
                }
                spans.push(Span::styled(format!("  + {typed}"), theme.text_editing_bold()));
            }
            vec![Line::from(spans)]
        }
        RenderUnit::Custom { renderer, body } => {
            let mut lines = unit_lines(body, view, is_selected, cursor_on, theme);
            if let Some(first) = lines.first_mut() {
                first
                    .spans
                    .push(Span::styled(format!("  <{renderer}>"), theme.text_muted()));
            }
            lines
        }
        RenderUnit::Static { lines } => lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), theme.text_muted())))
            .collect(),
        RenderUnit::Disabled(inner) => unit_lines(inner, view, false, false, theme)
            .into_iter()
            .map(|l| l.patch_style(theme.text_muted()))
            .collect(),
    }
}

/// Lines for the whole tree: one block per group, each field followed by
/// its mark.
pub fn form_lines<H: crate::board::BoardHooks>(
    tree: &RenderTree,
    board: &FormController<H>,
    view: &FormView,
    cursor_on: bool,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();
    let mut pos = 0usize;
    for group in &tree.groups {
        if tree.groups.len() > 1 {
            lines.push(Line::from(Span::styled(
                format!("-- Section {} --", group.index + 1),
                theme.group_header(),
            )));
        }
        for field in &group.fields {
            let is_selected = pos == view.selected;
            let sel = if is_selected { '›' } else { ' ' };
            let req = if field.required { " *" } else { "" };
            let mark = board.mark(&field.name);
            let tag = match &mark {
                FieldMark::Valid => " ✓",
                FieldMark::Invalid(_) => " ✗",
                FieldMark::Neutral => "",
            };
            let mut body = unit_lines(&field.unit, view, is_selected, cursor_on, theme);
            let mut head = vec![
                Span::styled(format!("{sel} {}{req}", field.label), theme.mark_style(&mark)),
                Span::styled(tag.to_string(), theme.mark_style(&mark)),
                Span::raw(": "),
            ];
            if body.len() == 1 && !matches!(field.unit.innermost(), RenderUnit::LongText { .. }) {
                head.extend(body.remove(0).spans);
                lines.push(Line::from(head));
            } else {
                lines.push(Line::from(head));
                lines.extend(body);
            }
            if let FieldMark::Invalid(msg) = &mark {
                lines.push(Line::from(Span::styled(
                    format!("    {msg}"),
                    theme.mark_style(&mark),
                )));
            }
            pos += 1;
        }
        lines.push(Line::raw(""));
    }
    lines
}

fn status_line(status: Option<&Status>, submitting: bool, tick: u64, theme: &Theme) -> Line<'static> {
    let mut spans: Vec<Span> = Vec::new();
    if submitting {
        let spinner = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"][tick as usize % 6];
        spans.push(Span::raw(format!("{spinner} ")));
    }
    if let Some(s) = status {
        spans.push(Span::styled(
            s.text.clone(),
            Style::default()
                .fg(theme.status_color(s.level))
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

pub fn draw_board(
    f: &mut Frame,
    area: Rect,
    board: &FormController<TuiHooks>,
    view: &mut FormView,
    theme: &Theme,
    tick: u64,
) {
    let Some(tree) = board.render() else {
        return;
    };
    let rect = centered_rect(84, 86, area);
    f.render_widget(Clear, rect);
    let title = if board.depth() > 1 {
        format!(" {} ({} open) ", tree.title, board.depth())
    } else {
        format!(" {} ", tree.title)
    };
    let block = panel_block(title, true, theme).style(theme.base_style());
    let inner = block.inner(rect);
    f.render_widget(block, rect);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let cursor_on = tick % 2 == 0;
    let lines = form_lines(&tree, board, view, cursor_on, theme);
    // Keep the selected field in view.
    let sel_line = lines
        .iter()
        .position(|l| l.spans.first().is_some_and(|s| s.content.starts_with('›')))
        .unwrap_or(0);
    let h = chunks[0].height as usize;
    let scroll = sel_line.saturating_sub(h.saturating_sub(2)) as u16;
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(status_line(board.status(), board.is_submitting(), tick, theme)),
        chunks[1],
    );
    let help = format!(
        "[ Submit ] s  |  {} {}  |  Esc close",
        tree.target.method.as_str(),
        tree.target.path
    );
    f.render_widget(Paragraph::new(help).style(theme.text_muted()), chunks[2]);

    if let Some(Editor::LongText(ta)) = &view.editor {
        let r = centered_rect(80, 70, rect);
        f.render_widget(Clear, r);
        f.render_widget(&*ta, r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entities::{address, event, person};
    use crate::schema::Action;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn open(schema: crate::schema::FormSchema) -> FormController<TuiHooks> {
        let mut board = FormController::new(TuiHooks::default());
        let schema = Arc::new(schema);
        board
            .push_record(Action::Insert, schema.create_record(None))
            .unwrap();
        board
    }

    fn feed(view: &mut FormView, board: &mut FormController<TuiHooks>, code: KeyCode) {
        let tree = board.render().unwrap();
        for msg in view.on_key(key(code), &tree) {
            if let AppMsg::EditField { name, value } = msg {
                board.edit_field(&name, value).unwrap();
            }
        }
    }

    #[test]
    fn typing_into_a_text_field_edits_the_record() {
        let mut board = open(address().unwrap());
        let mut view = FormView::default();
        feed(&mut view, &mut board, KeyCode::Enter);
        assert!(view.is_editing());
        for c in "Minas Tirith".chars() {
            feed(&mut view, &mut board, KeyCode::Char(c));
        }
        feed(&mut view, &mut board, KeyCode::Backspace);
        feed(&mut view, &mut board, KeyCode::Enter);
        assert!(!view.is_editing());
        assert_eq!(board.top().unwrap().value("line_one"), Some("Minas Tirit"));
        assert_eq!(board.mark("line_one"), FieldMark::Valid);
    }

    #[test]
    fn select_cycles_and_checklist_toggles_in_option_order() {
        let mut board = open(event().unwrap());
        let mut view = FormView::default();
        let tree = board.render().unwrap();
        let pos_days = tree.fields().position(|f| f.name == "meeting_days").unwrap();
        for _ in 0..pos_days {
            feed(&mut view, &mut board, KeyCode::Down);
        }
        feed(&mut view, &mut board, KeyCode::Right);
        feed(&mut view, &mut board, KeyCode::Right);
        feed(&mut view, &mut board, KeyCode::Char(' '));
        feed(&mut view, &mut board, KeyCode::Left);
        feed(&mut view, &mut board, KeyCode::Char(' '));
        assert_eq!(
            board.top().unwrap().list_value("meeting_days"),
            vec!["Monday".to_string(), "Tuesday".to_string()]
        );

        let tree = board.render().unwrap();
        let pos_re = tree.fields().position(|f| f.name == "reoccuring").unwrap();
        view.reset(board.depth());
        for _ in 0..pos_re {
            feed(&mut view, &mut board, KeyCode::Down);
        }
        feed(&mut view, &mut board, KeyCode::Right);
        assert_eq!(board.top().unwrap().value("reoccuring"), Some("Days"));
        feed(&mut view, &mut board, KeyCode::Left);
        feed(&mut view, &mut board, KeyCode::Left);
        assert_eq!(board.top().unwrap().value("reoccuring"), Some("Months"));
    }

    #[test]
    fn list_items_append_and_remove() {
        let mut board = open(person().unwrap());
        let mut view = FormView::default();
        let tree = board.render().unwrap();
        let pos = tree.fields().position(|f| f.name == "nicks").unwrap();
        for _ in 0..pos {
            feed(&mut view, &mut board, KeyCode::Down);
        }
        for nick in ["Jumpman", "Mr. Video"] {
            feed(&mut view, &mut board, KeyCode::Enter);
            for c in nick.chars() {
                feed(&mut view, &mut board, KeyCode::Char(c));
            }
            feed(&mut view, &mut board, KeyCode::Enter);
        }
        assert_eq!(board.top().unwrap().list_value("nicks").len(), 2);
        feed(&mut view, &mut board, KeyCode::Char('x'));
        assert_eq!(
            board.top().unwrap().list_value("nicks"),
            vec!["Jumpman".to_string()]
        );
    }

    #[test]
    fn escape_and_s_map_to_board_messages() {
        let board = open(address().unwrap());
        let tree = board.render().unwrap();
        let mut view = FormView::default();
        assert!(matches!(
            view.on_key(key(KeyCode::Esc), &tree).as_slice(),
            [AppMsg::RequestClose]
        ));
        assert!(matches!(
            view.on_key(key(KeyCode::Char('s')), &tree).as_slice(),
            [AppMsg::Submit]
        ));
        view.move_by(-1, tree.fields().count());
        assert_eq!(view.selected(), tree.fields().count() - 1);
    }

    #[test]
    fn overlay_renders_title_groups_and_marks() {
        let mut board = open(address().unwrap());
        board.edit_field("city", "Minas Tirith").unwrap();
        let _ = board.submit_top().unwrap();
        let mut view = FormView::default();
        let backend = TestBackend::new(100, 40);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|f| draw_board(f, f.area(), &board, &mut view, &Theme::default(), 1))
            .unwrap();
        let buf = terminal.backend().buffer().clone();
        let mut screen = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                screen.push_str(buf[(x, y)].symbol());
            }
            screen.push('\n');
        }
        assert!(screen.contains("Add New Address"));
        assert!(screen.contains("-- Section 1 --"));
        assert!(screen.contains("Line one * ✗"));
        assert!(screen.contains("can't be blank"));
        assert!(screen.contains("City * ✓"));
        assert!(screen.contains("Invalid input detected."));
        assert!(screen.contains("POST /insert_address"));
    }

    #[test]
    fn long_text_opens_textarea_and_commits_on_ctrl_s() {
        let schema = crate::schema::FormSchema::new(
            "Note",
            vec![crate::schema::FieldSchema::long_text("body")],
            None,
        )
        .unwrap();
        let mut board = open(schema);
        let mut view = FormView::default();
        feed(&mut view, &mut board, KeyCode::Enter);
        assert!(view.is_editing());
        for c in "hi".chars() {
            feed(&mut view, &mut board, KeyCode::Char(c));
        }
        let tree = board.render().unwrap();
        let msgs = view.on_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL), &tree);
        match msgs.as_slice() {
            [AppMsg::EditField { name, value }] => {
                assert_eq!(name, "body");
                assert_eq!(value, "hi");
            }
            _ => panic!("expected an edit"),
        }
        assert!(!view.is_editing());
    }
}
