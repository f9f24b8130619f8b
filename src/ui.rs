use crate::app::{update, AppMsg, Effect};
use crate::board::{BoardHooks, FormController};
use crate::dispatch::Dispatcher;
use crate::error::SubmissionError;
use crate::model::{validate_app_config, AppConfig};
use crate::schema::entities::SchemaRegistry;
use crate::services::transport::{self, Row, Transport, TransportMsg};
use crate::widgets::chrome::{centered_fixed, panel_block};
use crate::widgets::form_view::{draw_board, FormView};
use crate::widgets::horizontal_menu::{draw_entity_tabs, neighbour_tab, tab_for_function_key};
use crate::widgets::listing::draw_listing;
use crate::widgets::status_bar::draw_footer;
use anyhow::{anyhow, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "miniboard.yaml";
const CONFIG_DIR: &str = ".miniboard";

/// Board hooks for the terminal. A confirmation cannot block the event
/// loop, so `confirm` records the prompt and answers "no"; the confirm
/// modal then replays the close with `answer` set.
#[derive(Default, Debug)]
pub struct TuiHooks {
    pub prompt: Option<String>,
    pub answer: Option<bool>,
    pub guard: bool,
    data_changed: bool,
}

impl TuiHooks {
    pub fn take_data_changed(&mut self) -> bool {
        std::mem::take(&mut self.data_changed)
    }
}

impl BoardHooks for TuiHooks {
    fn confirm(&mut self, message: &str) -> bool {
        if let Some(answer) = self.answer.take() {
            return answer;
        }
        self.prompt = Some(message.to_string());
        false
    }

    fn data_changed(&mut self) {
        self.data_changed = true;
    }

    fn set_unsaved_guard(&mut self, active: bool) {
        self.guard = active;
    }
}

#[derive(Default, Debug)]
pub(crate) struct Listing {
    pub(crate) entity: String,
    pub(crate) page: u64,
    pub(crate) total_pages: u64,
    pub(crate) total: Option<u64>,
    pub(crate) rows: Vec<Row>,
    pub(crate) selected: usize,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
}

impl Listing {
    pub(crate) fn reset(&mut self, entity: &str) {
        *self = Listing {
            entity: entity.to_lowercase(),
            total_pages: 1,
            ..Default::default()
        };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) theme: crate::theme::Theme,
    pub(crate) tick: u64,
    pub(crate) tab: usize,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) board: FormController<TuiHooks>,
    pub(crate) form: FormView,
    pub(crate) listing: Listing,
    pub(crate) toast: Option<Toast>,
    pub(crate) quit_after_confirm: bool,
    pub(crate) should_quit: bool,
    pub(crate) show_debug: bool,
    // Debug log (rendered in bottom debug pane, F12)
    pub(crate) debug_log: VecDeque<String>,
    transport: Option<Arc<dyn Transport>>,
    tx: Option<Sender<TransportMsg>>,
    rx: Option<Receiver<TransportMsg>>,
}

impl AppState {
    pub(crate) fn new(config: AppConfig) -> Result<Self> {
        let registry = SchemaRegistry::standard().context("building form schemas")?;
        let entity = config.initial_entity().to_lowercase();
        let tab = config
            .entities
            .iter()
            .position(|e| e.eq_ignore_ascii_case(&entity))
            .unwrap_or(0);
        let mut listing = Listing::default();
        listing.reset(&entity);
        Ok(Self {
            config,
            theme: crate::theme::Theme::from_env(),
            tick: 0,
            tab,
            dispatcher: Dispatcher::new(registry, entity),
            board: FormController::new(TuiHooks::default()),
            form: FormView::default(),
            listing,
            toast: None,
            quit_after_confirm: false,
            should_quit: false,
            show_debug: false,
            debug_log: VecDeque::new(),
            transport: None,
            tx: None,
            rx: None,
        })
    }

    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        let msg = msg.into();
        debug!(target: "miniboard::ui", "{msg}");
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg);
    }

    fn connect(&mut self, transport: Arc<dyn Transport>) {
        let (tx, rx) = mpsc::channel::<TransportMsg>();
        self.transport = Some(transport);
        self.tx = Some(tx);
        self.rx = Some(rx);
    }
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::FetchPage { entity, page } => {
                state.dbg(format!("fetch {entity} page {page}"));
                match state.transport.clone().zip(state.tx.clone()) {
                    Some((t, tx)) => transport::spawn_fetch(t, entity, page, tx),
                    None => {
                        state.listing.loading = false;
                        state.listing.error = Some("No backend configured.".into());
                    }
                }
            }
            Effect::Submit(pending) => {
                state.dbg(format!("submit {}", pending.request.target.path));
                match state.transport.clone().zip(state.tx.clone()) {
                    Some((t, tx)) => transport::spawn_submit(t, pending, tx),
                    None => {
                        let effs = update(
                            state,
                            AppMsg::Submitted {
                                ticket: pending.ticket,
                                result: Err(SubmissionError::Transport(
                                    "no backend configured".into(),
                                )),
                            },
                        );
                        run_effects(state, effs);
                    }
                }
            }
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                let ticks = seconds.saturating_mul(5); // ~200ms tick
                let exp = state.tick.saturating_add(ticks);
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: exp,
                });
            }
            Effect::Quit => state.should_quit = true,
        }
    }
}

fn dispatch(state: &mut AppState, msg: AppMsg) {
    let effects = update(state, msg);
    run_effects(state, effects);
}

/// Drain transport results into the update loop.
fn pump(state: &mut AppState) {
    let mut drained: Vec<TransportMsg> = Vec::new();
    if let Some(rx) = &state.rx {
        while let Ok(msg) = rx.try_recv() {
            drained.push(msg);
        }
    }
    for msg in drained {
        let app_msg = match msg {
            TransportMsg::Submitted { ticket, result } => AppMsg::Submitted { ticket, result },
            TransportMsg::Fetched {
                entity,
                page,
                result,
            } => AppMsg::Fetched {
                entity,
                page,
                result,
            },
        };
        dispatch(state, app_msg);
    }
}

/// Maps a key press to messages. The confirm modal swallows everything
/// except its answers; an open board receives all keys but Ctrl+Q.
pub(crate) fn key_to_msgs(state: &mut AppState, key: KeyEvent) -> Vec<AppMsg> {
    if key.kind != KeyEventKind::Press {
        return Vec::new();
    }
    if state.board.hooks().prompt.is_some() {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => vec![AppMsg::ConfirmAnswer(true)],
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                vec![AppMsg::ConfirmAnswer(false)]
            }
            _ => Vec::new(),
        };
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')) {
        return vec![AppMsg::Quit];
    }
    if key.code == KeyCode::F(12) {
        state.show_debug = !state.show_debug;
        return Vec::new();
    }
    if let Some(tree) = state.board.render() {
        return state.form.on_key(key, &tree);
    }
    match key.code {
        KeyCode::Char('q') => vec![AppMsg::Quit],
        KeyCode::F(n) => tab_for_function_key(state, n)
            .map(AppMsg::SwitchTab)
            .into_iter()
            .collect(),
        KeyCode::Left => neighbour_tab(state, false)
            .map(AppMsg::SwitchTab)
            .into_iter()
            .collect(),
        KeyCode::Right => neighbour_tab(state, true)
            .map(AppMsg::SwitchTab)
            .into_iter()
            .collect(),
        KeyCode::Up => vec![AppMsg::MoveSelection(-1)],
        KeyCode::Down => vec![AppMsg::MoveSelection(1)],
        KeyCode::PageUp => vec![AppMsg::ChangePage(-1)],
        KeyCode::PageDown => vec![AppMsg::ChangePage(1)],
        KeyCode::Char('r') => vec![AppMsg::Refresh],
        KeyCode::Char('a') => vec![AppMsg::OpenInsert],
        KeyCode::Char('u') | KeyCode::Enter => vec![AppMsg::OpenUpdate],
        KeyCode::Char('c') => vec![AppMsg::OpenCat],
        _ => Vec::new(),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

pub fn run() -> Result<()> {
    let cfg = load_config()?;
    let log_note = match crate::logging::init(&cfg.log) {
        Ok(true) => None,
        Ok(false) => Some("file logging off (no log.file)".to_string()),
        Err(e) => Some(format!("file logging disabled: {e:#}")),
    };
    let mut state = AppState::new(cfg)?;
    if let Some(note) = log_note {
        state.dbg(note);
    }
    match transport::from_config(&state.config.backend, state.config.page_size) {
        Ok(t) => state.connect(t),
        Err(e) => {
            warn!(error = %e, "backend unavailable");
            state.dbg(format!("backend unavailable: {e:#}"));
        }
    }
    info!(
        entity = %state.listing.entity,
        backend = ?state.config.backend.kind,
        "miniboard starting"
    );
    dispatch(&mut state, AppMsg::Refresh);

    // Headless smoke mode
    if env_flag("MINIBOARD_HEADLESS") {
        return run_headless(state);
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if let Err(e) = terminal.draw(|f| ui(f, &mut state)) {
            break Err(e.into());
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    for msg in key_to_msgs(&mut state, key) {
                        dispatch(&mut state, msg);
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        pump(&mut state);
        if state.should_quit {
            break Ok(());
        }
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
        }
    };
    // Restore
    disable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!("miniboard exiting");
    res
}

fn run_headless(mut state: AppState) -> Result<()> {
    let ticks: u64 = std::env::var("MINIBOARD_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    // insert | update: open a form on the first tick
    let open = std::env::var("MINIBOARD_HEADLESS_OPEN").ok();
    let backend = ratatui::backend::TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    for i in 0..ticks {
        if i == 0 {
            match open.as_deref() {
                Some("insert") => dispatch(&mut state, AppMsg::OpenInsert),
                Some("update") => dispatch(&mut state, AppMsg::OpenUpdate),
                _ => {}
            }
        }
        terminal.draw(|f| ui(f, &mut state))?;
        pump(&mut state);
        state.tick = state.tick.wrapping_add(1);
        std::thread::sleep(tick_rate);
    }
    if env_flag("MINIBOARD_SMOKE_SUMMARY") {
        let summary = serde_json::json!({
            "ok": state.listing.error.is_none(),
            "entity": state.listing.entity,
            "page": state.listing.page,
            "rows": state.listing.rows.len(),
            "board_depth": state.board.depth(),
            "status": state.board.status().map(|s| s.text.clone()),
        });
        println!("{summary}");
    }
    Ok(())
}

/// Config file from `MINIBOARD_CONFIG`, else discovered from the working
/// directory upwards, else the built-in default.
pub(crate) fn load_config() -> Result<AppConfig> {
    let path = match std::env::var("MINIBOARD_CONFIG") {
        Ok(p) => Some(PathBuf::from(p)),
        Err(_) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            discover_config(&cwd)
        }
    };
    let cfg = match path {
        Some(p) => read_config(&p)?,
        None => AppConfig::default(),
    };
    validate_app_config(&cfg).map_err(|e| anyhow!("invalid config: {e}"))?;
    Ok(cfg)
}

pub(crate) fn discover_config(start: &Path) -> Option<PathBuf> {
    let candidates = [
        start.join(CONFIG_FILE),
        start.join(CONFIG_DIR).join(CONFIG_FILE),
    ];
    if let Some(p) = candidates.into_iter().find(|p| p.exists()) {
        return Some(p);
    }
    // Walk up ancestors looking for <ancestor>/.miniboard/miniboard.yaml
    start
        .ancestors()
        .skip(1)
        .map(|a| a.join(CONFIG_DIR).join(CONFIG_FILE))
        .find(|p| p.exists())
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))
}

fn help_text(state: &AppState) -> String {
    if state.board.hooks().prompt.is_some() {
        return "y discard  n keep editing".into();
    }
    if state.board.is_visible() {
        return "↑/↓ move  Enter edit  ←/→ choose  Space toggle  x remove  s submit  Esc close".into();
    }
    let mut help = String::from("F1-F5 tabs  ↑/↓ select  PgUp/PgDn page  r refresh");
    if state.dispatcher.supports_forms() {
        help.push_str("  a add  u update");
    }
    help.push_str("  c cat  q quit");
    help
}

fn ui(f: &mut Frame, state: &mut AppState) {
    // Clear expired toast
    if let Some(t) = &state.toast {
        if state.tick >= t.expires_at_tick {
            state.toast = None;
        }
    }

    let screen = f.area();
    f.render_widget(Block::default().style(state.theme.base_style()), screen);

    let mut constraints = vec![Constraint::Length(2), Constraint::Min(3)];
    if state.show_debug {
        constraints.push(Constraint::Length(8));
    }
    constraints.push(Constraint::Length(1));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(screen);

    draw_entity_tabs(f, chunks[0], state);
    draw_listing(f, chunks[1], state);
    if state.show_debug {
        draw_debug(f, chunks[2], state);
    }
    let help = help_text(state);
    draw_footer(f, chunks[chunks.len() - 1], state, &help);

    if state.board.is_visible() {
        draw_board(
            f,
            screen,
            &state.board,
            &mut state.form,
            &state.theme,
            state.tick,
        );
    }
    if let Some(prompt) = state.board.hooks().prompt.clone() {
        draw_confirm(f, screen, &prompt, &state.theme);
    }
}

fn draw_confirm(f: &mut Frame, area: Rect, prompt: &str, theme: &crate::theme::Theme) {
    let rect = centered_fixed(60, 6, area);
    f.render_widget(Clear, rect);
    let lines = vec![
        Line::raw(prompt.to_string()),
        Line::raw(""),
        Line::from(vec![
            Span::styled("[y]", theme.text_editing_bold()),
            Span::raw(" Discard   "),
            Span::styled("[n]", theme.text_active_bold()),
            Span::raw(" Keep editing"),
        ]),
    ];
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .style(theme.base_style())
        .block(panel_block(" Confirm ", true, theme));
    f.render_widget(p, rect);
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    // Take last `area.height` lines
    let h = area.height as usize;
    let start = state.debug_log.len().saturating_sub(h);
    let lines: Vec<Line> = state
        .debug_log
        .iter()
        .skip(start)
        .map(|s| Line::raw(s.clone()))
        .collect();
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}
