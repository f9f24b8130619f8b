use crate::board::{Completion, PendingSubmission, SubmitOutcome, SubmitResponse, Ticket};
use crate::error::{BoardError, DispatchError, SubmissionError};
use crate::services::transport::Page;
use crate::ui::{AppState, ToastLevel};

pub enum AppMsg {
    SwitchTab(usize),
    MoveSelection(i64),
    ChangePage(i64),
    Refresh,
    OpenInsert,
    OpenUpdate,
    OpenCat,
    EditField {
        name: String,
        value: String,
    },
    Submit,
    RequestClose,
    ConfirmAnswer(bool),
    Quit,
    Fetched {
        entity: String,
        page: u64,
        result: Result<Page, SubmissionError>,
    },
    Submitted {
        ticket: Ticket,
        result: Result<SubmitResponse, SubmissionError>,
    },
}

pub enum Effect {
    FetchPage {
        entity: String,
        page: u64,
    },
    Submit(PendingSubmission),
    ShowToast {
        text: String,
        level: ToastLevel,
        seconds: u64,
    },
    Quit,
}

fn toast(text: impl Into<String>, level: ToastLevel) -> Effect {
    Effect::ShowToast {
        text: text.into(),
        level,
        seconds: 4,
    }
}

fn fetch_current(state: &mut AppState) -> Effect {
    state.listing.loading = true;
    state.listing.error = None;
    Effect::FetchPage {
        entity: state.listing.entity.clone(),
        page: state.listing.page,
    }
}

fn report_open(state: &mut AppState, res: Result<(), DispatchError>) -> Option<Effect> {
    match res {
        Ok(()) => {
            state.dbg(format!(
                "opened form for {} (depth {})",
                state.dispatcher.entity(),
                state.board.depth()
            ));
            None
        }
        Err(e) => {
            state.dbg(format!("dispatch refused: {e}"));
            Some(toast(e.to_string(), ToastLevel::Error))
        }
    }
}

fn sync_selection(state: &mut AppState) {
    let row = state.listing.rows.get(state.listing.selected).cloned();
    state.dispatcher.select(row);
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        SwitchTab(index) => {
            if state.board.is_visible() {
                return effects;
            }
            let Some(entity) = state.config.entities.get(index).cloned() else {
                return effects;
            };
            if index != state.tab {
                state.tab = index;
                state.dispatcher.set_entity(&entity);
                state.listing.reset(&entity);
                state.dbg(format!("switch tab -> {entity}"));
                effects.push(fetch_current(state));
            }
        }
        MoveSelection(delta) => {
            let len = state.listing.rows.len();
            if len > 0 {
                let cur = state.listing.selected as i64;
                state.listing.selected = (cur + delta).clamp(0, len as i64 - 1) as usize;
            }
            sync_selection(state);
        }
        ChangePage(delta) => {
            let last = state.listing.total_pages.max(1) - 1;
            let next = (state.listing.page as i64 + delta).clamp(0, last as i64) as u64;
            if next != state.listing.page {
                state.listing.page = next;
                effects.push(fetch_current(state));
            }
        }
        Refresh => effects.push(fetch_current(state)),
        OpenInsert => {
            let res = state.dispatcher.open_insert(&mut state.board);
            effects.extend(report_open(state, res));
        }
        OpenUpdate => {
            let res = state.dispatcher.open_update(&mut state.board);
            effects.extend(report_open(state, res));
        }
        OpenCat => {
            let res = state.dispatcher.open_cat(&mut state.board);
            effects.extend(report_open(state, res));
        }
        EditField { name, value } => {
            if let Err(e) = state.board.edit_field(&name, value) {
                state.dbg(format!("edit {name} refused: {e}"));
                if matches!(e, BoardError::Busy) {
                    effects.push(toast("Submitting...", ToastLevel::Info));
                }
            }
        }
        Submit => match state.board.submit_top() {
            Ok(SubmitOutcome::Dispatched(pending)) => {
                state.dbg(format!("submit -> {}", pending.request.target.path));
                effects.push(Effect::Submit(pending));
            }
            Ok(SubmitOutcome::Invalid(violations)) => {
                state.dbg(format!("submit blocked: {} invalid field(s)", violations.len()));
            }
            Err(BoardError::Busy) => effects.push(toast("Submitting...", ToastLevel::Info)),
            Err(e) => state.dbg(format!("submit refused: {e}")),
        },
        RequestClose => {
            state.board.request_close();
        }
        ConfirmAnswer(yes) => {
            state.board.hooks_mut().prompt.take();
            let quitting = std::mem::take(&mut state.quit_after_confirm);
            if yes {
                state.board.hooks_mut().answer = Some(true);
                let cleared = state.board.request_close();
                state.board.hooks_mut().answer = None;
                if cleared && quitting {
                    effects.push(Effect::Quit);
                }
            }
        }
        Quit => {
            if !state.board.hooks().guard {
                effects.push(Effect::Quit);
            } else if state.board.request_close() {
                effects.push(Effect::Quit);
            } else if state.board.hooks().prompt.is_some() {
                state.quit_after_confirm = true;
            }
        }
        Fetched {
            entity,
            page,
            result,
        } => {
            if entity != state.listing.entity || page != state.listing.page {
                state.dbg(format!("dropping stale page {entity}#{page}"));
                return effects;
            }
            state.listing.loading = false;
            match result {
                Ok(p) => {
                    state.dbg(format!("loaded {entity} page {page}: {} rows", p.rows.len()));
                    state.listing.total_pages = p.total_pages;
                    state.listing.total = p.total;
                    state.listing.rows = p.rows;
                    let len = state.listing.rows.len();
                    state.listing.selected = state.listing.selected.min(len.saturating_sub(1));
                    sync_selection(state);
                }
                Err(e) => {
                    let text = e.status_text();
                    state.dbg(format!("load {entity} failed: {text}"));
                    state.listing.error = Some(text.clone());
                    effects.push(toast(text, ToastLevel::Error));
                }
            }
        }
        Submitted { ticket, result } => {
            let completion = state.board.complete_submission(ticket, result);
            let status = state
                .board
                .status()
                .map(|s| s.text.clone())
                .unwrap_or_default();
            state.dbg(format!("submission {ticket:?} -> {completion:?}"));
            match completion {
                Completion::Popped => effects.push(toast(status, ToastLevel::Success)),
                Completion::NoChanges => effects.push(toast(status, ToastLevel::Info)),
                Completion::Failed => effects.push(toast(status, ToastLevel::Error)),
                Completion::Stale => {}
            }
        }
    }
    if state.board.hooks_mut().take_data_changed() {
        effects.push(fetch_current(state));
    }
    if state.board.depth() != state.form.depth() {
        state.form.reset(state.board.depth());
    }
    effects
}

#[cfg(test)]
mod tests;
