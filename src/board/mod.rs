//! The miniboard: a stack of in-progress records shown as a form overlay.
//!
//! The board owns the records, asks the renderer for UI, validates before
//! submitting and never talks to the network itself. A successful
//! `submit_top` hands back a [`PendingSubmission`]; whoever runs the
//! transport reports the result with [`FormController::complete_submission`].

use crate::error::{BoardError, SubmissionError};
use crate::render::{render, RenderTree, SubmitTarget};
use crate::schema::{Action, Record, ACTIONS};
use crate::validate::{build_payload, mark_for, validate_record, FieldMark, Violations};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const DISCARD_PROMPT: &str = "You have unsaved changes. Do you wish to discard?";

/// Collaborators the board calls out to.
pub trait BoardHooks {
    /// Ask the user a yes/no question.
    fn confirm(&mut self, message: &str) -> bool;
    /// The displayed listing may be stale.
    fn data_changed(&mut self);
    /// Toggled exactly when the board goes from empty to displaying and back.
    fn set_unsaved_guard(&mut self, active: bool);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoardState {
    Empty,
    Displaying,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub level: StatusLevel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitRequest {
    pub entity: String,
    pub action: Action,
    pub target: SubmitTarget,
    pub payload: IndexMap<String, String>,
}

/// Identifies the record a submission was issued for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSubmission {
    pub ticket: Ticket,
    pub request: SubmitRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Dispatched(PendingSubmission),
    Invalid(Violations),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitResponse {
    Inserted { id: Option<String> },
    Updated { affected: u64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The record the result belongs to is gone; nothing changed.
    Stale,
    Popped,
    NoChanges,
    Failed,
}

struct Entry {
    id: u64,
    record: Record,
    marks: HashMap<String, FieldMark>,
}

pub struct FormController<H: BoardHooks> {
    stack: Vec<Entry>,
    next_id: u64,
    submitting: Option<u64>,
    status: Option<Status>,
    hooks: H,
}

impl<H: BoardHooks> FormController<H> {
    pub fn new(hooks: H) -> Self {
        Self {
            stack: Vec::new(),
            next_id: 0,
            submitting: None,
            status: None,
            hooks,
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn state(&self) -> BoardState {
        if self.stack.is_empty() {
            BoardState::Empty
        } else {
            BoardState::Displaying
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state() == BoardState::Displaying
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_some()
    }

    pub fn top(&self) -> Option<&Record> {
        self.stack.last().map(|e| &e.record)
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn mark(&self, field: &str) -> FieldMark {
        self.stack
            .last()
            .and_then(|e| e.marks.get(field).cloned())
            .unwrap_or_default()
    }

    /// UI for the top-of-stack record.
    pub fn render(&self) -> Option<RenderTree> {
        self.top().map(render)
    }

    fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(Status {
            text: text.into(),
            level,
        });
    }

    pub fn push_record(&mut self, action: Action, mut record: Record) -> Result<(), BoardError> {
        if !ACTIONS.contains(&action) {
            return Err(BoardError::InvalidState(format!(
                "invalid action given: {action}"
            )));
        }
        if action == Action::Update && record.identity().is_none() {
            return Err(BoardError::InvalidState(
                "update record has no object id".into(),
            ));
        }
        if self.submitting.is_some() {
            return Err(BoardError::Busy);
        }
        record.set_action(action);
        let was_empty = self.stack.is_empty();
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            entity = record.schema().entity_name(),
            %action,
            depth = self.stack.len() + 1,
            "push record"
        );
        self.stack.push(Entry {
            id,
            record,
            marks: HashMap::new(),
        });
        self.status = None;
        if was_empty {
            self.hooks.set_unsaved_guard(true);
        }
        Ok(())
    }

    /// Sets one value on the top record and re-marks just that field.
    pub fn edit_field(&mut self, name: &str, value: impl Into<String>) -> Result<FieldMark, BoardError> {
        if self.submitting.is_some() {
            return Err(BoardError::Busy);
        }
        let entry = self.stack.last_mut().ok_or(BoardError::Empty)?;
        entry.record.set_value(name, value)?;
        let field = entry
            .record
            .schema()
            .field(name)
            .ok_or_else(|| BoardError::UnknownField(name.to_string()))?;
        let current = entry.record.value(name).unwrap_or("");
        let mark = mark_for(field, current, false);
        entry.marks.insert(name.to_string(), mark.clone());
        Ok(mark)
    }

    /// Closes the overlay, asking first when the top record holds edits.
    /// Returns whether the board was cleared.
    pub fn request_close(&mut self) -> bool {
        let Some(top) = self.top() else {
            return false;
        };
        if top.is_blank() || top.is_pristine() || self.hooks.confirm(DISCARD_PROMPT) {
            self.clear_all();
            return true;
        }
        false
    }

    pub fn pop_top(&mut self) {
        let Some(entry) = self.stack.pop() else {
            return;
        };
        if self.submitting == Some(entry.id) {
            self.submitting = None;
        }
        debug!(depth = self.stack.len(), "pop record");
        if self.stack.is_empty() {
            self.hooks.set_unsaved_guard(false);
            self.hooks.data_changed();
        }
    }

    pub fn clear_all(&mut self) {
        let was_displaying = !self.stack.is_empty();
        self.stack.clear();
        self.submitting = None;
        self.status = None;
        debug!("clear board");
        if was_displaying {
            self.hooks.set_unsaved_guard(false);
        }
        self.hooks.data_changed();
    }

    /// Validates the top record and, when clean, returns the request to send.
    pub fn submit_top(&mut self) -> Result<SubmitOutcome, BoardError> {
        if self.submitting.is_some() {
            return Err(BoardError::Busy);
        }
        let entry = self.stack.last_mut().ok_or(BoardError::Empty)?;
        let violations = validate_record(&entry.record);
        if !violations.is_empty() {
            for (name, errors) in &violations {
                if let Some(first) = errors.first() {
                    entry
                        .marks
                        .insert(name.clone(), FieldMark::Invalid(first.clone()));
                }
            }
            info!(
                entity = entry.record.schema().entity_name(),
                failing = violations.len(),
                "validation failed"
            );
            self.set_status("Invalid input detected.", StatusLevel::Error);
            return Ok(SubmitOutcome::Invalid(violations));
        }
        let record = &entry.record;
        let action = record.action().unwrap_or(Action::Insert);
        let tree = render(record);
        let request = SubmitRequest {
            entity: record.schema().route_name(),
            action,
            target: tree.target,
            payload: build_payload(record),
        };
        let ticket = Ticket(entry.id);
        self.submitting = Some(entry.id);
        info!(path = %request.target.path, fields = request.payload.len(), "submitting");
        self.set_status("Submitting...", StatusLevel::Info);
        Ok(SubmitOutcome::Dispatched(PendingSubmission { ticket, request }))
    }

    /// Applies a transport result. Results for records that were popped or
    /// cleared meanwhile are dropped.
    pub fn complete_submission(
        &mut self,
        ticket: Ticket,
        result: Result<SubmitResponse, SubmissionError>,
    ) -> Completion {
        if self.submitting != Some(ticket.0) || self.stack.last().map(|e| e.id) != Some(ticket.0) {
            warn!(?ticket, "ignoring stale submission result");
            return Completion::Stale;
        }
        self.submitting = None;
        let action = self
            .top()
            .and_then(|r| r.action())
            .unwrap_or(Action::Insert);
        match result {
            Ok(SubmitResponse::Updated { affected: 0 }) if action == Action::Update => {
                info!("update matched no rows");
                self.set_status("No updates were made.", StatusLevel::Info);
                Completion::NoChanges
            }
            Ok(resp) => {
                info!(?resp, "submission succeeded");
                let text = match action {
                    Action::Update => "Successfully updated row!",
                    _ => "Successfully added new row!",
                };
                self.set_status(text, StatusLevel::Success);
                self.pop_top();
                Completion::Popped
            }
            Err(err) => {
                warn!(error = %err, "submission failed");
                let verb = match action {
                    Action::Update => "updating",
                    _ => "adding",
                };
                self.set_status(
                    format!("Error {verb} data: {}", err.status_text()),
                    StatusLevel::Error,
                );
                Completion::Failed
            }
        }
    }
}
