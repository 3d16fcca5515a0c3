//! Failure categories for roster loading, scene files and bracket fetches.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures while reading the roster file.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The file is missing or unreadable.
    #[error("failed to read roster `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file is not valid roster JSON.
    #[error("invalid JSON in roster `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while reading or writing the scene file.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid scene JSON for `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write scene `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures while talking to the bracket API.
#[derive(Debug, Error)]
pub enum BracketError {
    /// API key or tournament id has not been configured.
    #[error("bracket {field} not set")]
    MissingCredentials { field: &'static str },
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to `{endpoint}` failed: {reason}")]
    Transport { endpoint: String, reason: String },
    /// The server answered with a non-success status.
    #[error("HTTP error {status} from `{endpoint}`: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response body did not match the expected document shape.
    #[error("failed to decode response from `{endpoint}`")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected error from `{endpoint}`: {reason}")]
    Unexpected { endpoint: String, reason: String },
}

impl BracketError {
    /// Short category label used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            BracketError::MissingCredentials { .. } => "credentials",
            BracketError::Transport { .. } => "transport",
            BracketError::HttpStatus { .. } => "http",
            BracketError::Decode { .. } => "decode",
            BracketError::Unexpected { .. } => "unexpected",
        }
    }
}
