//! Backend collaborators: submitting records and fetching listing pages.

use crate::board::{PendingSubmission, SubmitRequest, SubmitResponse, Ticket};
use crate::error::SubmissionError;
use crate::model::{BackendConfig, BackendKind};
use crate::render::Method;
use crate::schema::Action;
use crate::services::cli_runner::run_cmdline_to_json;
use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use tracing::debug;

pub trait Transport: Send + Sync {
    fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, SubmissionError>;
    fn fetch_page(&self, entity: &str, page: u64) -> Result<Page, SubmissionError>;
}

/// One listing row as displayed: cell text per column plus the object id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    pub id: Option<String>,
    pub cells: IndexMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub total_pages: u64,
    pub total: Option<u64>,
    pub rows: Vec<Row>,
}

pub enum TransportMsg {
    Submitted {
        ticket: Ticket,
        result: Result<SubmitResponse, SubmissionError>,
    },
    Fetched {
        entity: String,
        page: u64,
        result: Result<Page, SubmissionError>,
    },
}

/// Builds the configured backend. `page_size` is passed through as a hint.
pub fn from_config(cfg: &BackendConfig, page_size: Option<u64>) -> Result<Arc<dyn Transport>> {
    match cfg.kind {
        BackendKind::Http => {
            let base = cfg
                .base_url
                .clone()
                .ok_or_else(|| anyhow!("http backend requires base_url"))?;
            Ok(Arc::new(HttpTransport::new(base)?.with_page_size(page_size)))
        }
        BackendKind::Command => {
            let command = cfg
                .command
                .clone()
                .ok_or_else(|| anyhow!("command backend requires command"))?;
            Ok(Arc::new(CommandTransport::new(command).with_page_size(page_size)))
        }
    }
}

pub fn spawn_submit(transport: Arc<dyn Transport>, pending: PendingSubmission, tx: Sender<TransportMsg>) {
    thread::spawn(move || {
        let result = transport.submit(&pending.request);
        let _ = tx.send(TransportMsg::Submitted {
            ticket: pending.ticket,
            result,
        });
    });
}

pub fn spawn_fetch(transport: Arc<dyn Transport>, entity: String, page: u64, tx: Sender<TransportMsg>) {
    thread::spawn(move || {
        let result = transport.fetch_page(&entity, page);
        let _ = tx.send(TransportMsg::Fetched {
            entity,
            page,
            result,
        });
    });
}

fn id_text(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(m) => m.get("$oid").and_then(|x| x.as_str()).map(str::to_string),
        _ => None,
    }
}

fn cell_text(v: &JsonValue) -> String {
    match v {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(_) | JsonValue::Number(_) => v.to_string(),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            serde_json::to_string(v).unwrap_or_default()
        }
    }
}

pub fn decode_submit_response(action: Action, v: &JsonValue) -> Result<SubmitResponse, SubmissionError> {
    match action {
        Action::Update => {
            let affected = v
                .as_u64()
                .or_else(|| v.get("modified_count").and_then(|x| x.as_u64()))
                .or_else(|| v.get("affected").and_then(|x| x.as_u64()))
                .ok_or_else(|| SubmissionError::Decode(format!("no affected count in {v}")))?;
            Ok(SubmitResponse::Updated { affected })
        }
        _ => {
            let id = id_text(v).or_else(|| v.get("id").and_then(id_text));
            Ok(SubmitResponse::Inserted { id })
        }
    }
}

pub fn row_from_json(v: &JsonValue) -> Option<Row> {
    let obj = v.as_object()?;
    let mut row = Row::default();
    for (k, val) in obj {
        if k == "_id" {
            row.id = id_text(val);
        } else {
            row.cells.insert(k.clone(), cell_text(val));
        }
    }
    Some(row)
}

pub fn decode_page(v: &JsonValue) -> Result<Page, SubmissionError> {
    let data = v
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| SubmissionError::Decode("missing data array".into()))?;
    Ok(Page {
        page: v.get("page").and_then(|x| x.as_u64()).unwrap_or(0),
        total_pages: v.get("total_pages").and_then(|x| x.as_u64()).unwrap_or(1),
        total: v.get("total_result").and_then(|x| x.as_u64()),
        rows: data.iter().filter_map(row_from_json).collect(),
    })
}

fn error_message(v: &JsonValue) -> Option<String> {
    v.get("err")
        .and_then(|x| x.as_str())
        .or_else(|| v.get("error").and_then(|x| x.as_str()))
        .or_else(|| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|x| x.as_str())
        })
        .map(str::to_string)
}

/// Maps a failed response body to an error, preferring a structured message.
pub fn error_from_body(status: u16, reason: Option<&str>, body: &str) -> SubmissionError {
    if let Ok(v) = serde_json::from_str::<JsonValue>(body) {
        if let Some(message) = error_message(&v) {
            return SubmissionError::Server {
                status: Some(status),
                message,
            };
        }
    }
    SubmissionError::Status(
        reason
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}")),
    )
}

pub struct HttpTransport {
    base_url: String,
    page_size: Option<u64>,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: None,
            client,
        })
    }

    pub fn with_page_size(mut self, page_size: Option<u64>) -> Self {
        self.page_size = page_size;
        self
    }

    fn page_url(&self, entity: &str, page: u64) -> String {
        let mut url = format!("{}/get_{}?page={}", self.base_url, entity, page);
        if let Some(size) = self.page_size {
            url.push_str(&format!("&page_size={size}"));
        }
        url
    }

    fn read(resp: reqwest::blocking::Response) -> Result<JsonValue, SubmissionError> {
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(error_from_body(
                status.as_u16(),
                status.canonical_reason(),
                &body,
            ));
        }
        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&body).map_err(|e| SubmissionError::Decode(e.to_string()))
    }
}

impl Transport for HttpTransport {
    fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, SubmissionError> {
        let url = format!("{}{}", self.base_url, request.target.path);
        debug!(method = request.target.method.as_str(), %url, "http submit");
        let builder = match request.target.method {
            Method::Post => self.client.post(&url),
        };
        let resp = builder
            .form(&request.payload)
            .send()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        let v = Self::read(resp)?;
        decode_submit_response(request.action, &v)
    }

    fn fetch_page(&self, entity: &str, page: u64) -> Result<Page, SubmissionError> {
        let url = self.page_url(entity, page);
        debug!(%url, "http fetch");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        decode_page(&Self::read(resp)?)
    }
}

/// Runs a configured command per request. The command prints a JSON
/// envelope `{"ok": bool, "data": .., "error": {"message": ..}}`.
pub struct CommandTransport {
    command: String,
    page_size: Option<u64>,
}

impl CommandTransport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: Option<u64>) -> Self {
        self.page_size = page_size;
        self
    }

    fn run(&self, vars: HashMap<&str, String>, payload: Option<String>) -> Result<JsonValue, SubmissionError> {
        let envs: Vec<(&str, String)> = payload
            .map(|p| vec![("MINIBOARD_PAYLOAD", p)])
            .unwrap_or_default();
        let v = run_cmdline_to_json(&self.command, &vars, &envs)
            .map_err(|e| SubmissionError::Transport(format!("{e:#}")))?;
        unwrap_envelope(v)
    }
}

pub fn unwrap_envelope(v: JsonValue) -> Result<JsonValue, SubmissionError> {
    match v.get("ok").and_then(|x| x.as_bool()) {
        Some(true) => Ok(v.get("data").cloned().unwrap_or(JsonValue::Null)),
        Some(false) => Err(SubmissionError::Server {
            status: None,
            message: error_message(&v).unwrap_or_else(|| "command reported failure".into()),
        }),
        None => Ok(v),
    }
}

impl Transport for CommandTransport {
    fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, SubmissionError> {
        let mut vars = HashMap::new();
        vars.insert("ACTION", request.action.as_str().to_string());
        vars.insert("ENTITY", request.entity.clone());
        vars.insert("PATH", request.target.path.clone());
        let payload = serde_json::to_string(&request.payload)
            .map_err(|e| SubmissionError::Decode(e.to_string()))?;
        let v = self.run(vars, Some(payload))?;
        decode_submit_response(request.action, &v)
    }

    fn fetch_page(&self, entity: &str, page: u64) -> Result<Page, SubmissionError> {
        let mut vars = HashMap::new();
        vars.insert("ACTION", "get".to_string());
        vars.insert("ENTITY", entity.to_string());
        vars.insert("PAGE", page.to_string());
        if let Some(size) = self.page_size {
            vars.insert("PAGE_SIZE", size.to_string());
        }
        decode_page(&self.run(vars, None)?)
    }
}
