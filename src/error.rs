use thiserror::Error;

/// Malformed form schema. Raised while building a schema, never at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema has an empty entity name")]
    EmptyEntityName,
    #[error("{entity}: duplicate field name '{field}'")]
    DuplicateField { entity: String, field: String },
    #[error("{entity}: field '{field}' needs at least one option")]
    MissingOptions { entity: String, field: String },
    #[error("{entity}: field '{field}' declares a custom kind without a renderer")]
    MissingRenderer { entity: String, field: String },
    #[error("{entity}: group cut-points must be strictly ascending, got {groups:?}")]
    UnorderedGroups { entity: String, groups: Vec<usize> },
    #[error("{entity}: last group cut-point {last} does not cover {fields} fields")]
    GroupsDoNotCover {
        entity: String,
        last: usize,
        fields: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("a submission is already in flight")]
    Busy,
    #[error("no active record")]
    Empty,
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// Backend answered with a structured error message.
    #[error("{message}")]
    Server { status: Option<u16>, message: String },
    /// Backend answered with a failure status and no usable body.
    #[error("{0}")]
    Status(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unreadable response: {0}")]
    Decode(String),
}

impl SubmissionError {
    /// Text surfaced in the status line.
    pub fn status_text(&self) -> String {
        match self {
            SubmissionError::Server { message, .. } => message.clone(),
            SubmissionError::Status(text) => text.clone(),
            SubmissionError::Transport(e) => e.clone(),
            SubmissionError::Decode(e) => format!("unreadable response ({e})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Operator not yet supported for this table.")]
    Unsupported { entity: String, action: String },
    #[error("no row selected")]
    NoSelection,
    #[error(transparent)]
    Board(#[from] BoardError),
}
