//! Error types shared across the sync pipeline.
//!
//! Fatal errors (missing inputs, revision query failures) propagate to the
//! binary through `anyhow`. Provider and decode errors are soft: the batch
//! translator recovers from them by falling back to source values.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the entry store when reading or writing a locale file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a valid key/value file: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors raised while reading the index manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a valid manifest: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while querying revision control for the source diff.
///
/// All variants are fatal: an empty change set must never stand in for a
/// diff that could not be obtained.
#[derive(Error, Debug)]
pub enum ChangeDetectionError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git diff failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("git diff timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("cannot resolve source file {path}: {source}")]
    SourcePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from one call to the translation provider.
///
/// Every variant is a soft failure for the batch that triggered it.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned an empty body")]
    EmptyBody,

    #[error("provider error payload: {0}")]
    ErrorPayload(String),

    #[error("provider response is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("provider response contained no content")]
    NoContent,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(err)
        }
    }
}

/// Errors from decoding the provider's message content into a string map.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("content is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("content is JSON but not an object")]
    NotAnObject,

    #[error("value for key '{0}' is not a string")]
    NonStringValue(String),
}
