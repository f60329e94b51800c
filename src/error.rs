use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CatalogError>;

const MAX_DIAG_BODY_CHARS: usize = 512;

/// Shorten a raw response body so it can be logged or stored as diagnostics.
pub fn truncate_body(body: &str) -> String {
    let mut out: String = body.chars().take(MAX_DIAG_BODY_CHARS).collect();
    if body.chars().count() > MAX_DIAG_BODY_CHARS {
        out.push_str("...");
    }
    out
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("remote: {0}")]
    Remote(#[from] RemoteApiError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("config: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(&'static str),
}

impl CatalogError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Remote failures abort a command but are recorded; everything else is fatal.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Bad operator input, rejected before any storage mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    /// Example of a well-formed payload, shown back to the operator.
    pub expected: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// Failures talking to the remote commerce platform.
#[derive(Error, Debug)]
pub enum RemoteApiError {
    #[error("{endpoint}: no access token in response: {response}")]
    Auth { endpoint: String, response: String },

    #[error("{endpoint}: transport error: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint}: HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint}: malformed response ({message}): {response}")]
    Malformed {
        endpoint: String,
        message: String,
        response: String,
    },

    #[error("{endpoint}: {what} not found: {response}")]
    NotFound {
        endpoint: String,
        what: String,
        response: String,
    },
}

impl RemoteApiError {
    pub fn malformed(endpoint: &str, message: impl Into<String>, response: &str) -> Self {
        Self::Malformed {
            endpoint: endpoint.to_string(),
            message: message.into(),
            response: truncate_body(response),
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Auth { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Malformed { endpoint, .. }
            | Self::NotFound { endpoint, .. } => endpoint,
        }
    }
}
