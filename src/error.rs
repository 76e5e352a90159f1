//! Error taxonomy for the question-answering pipeline.
//!
//! Every per-query failure is a [`QueryError`], and every `QueryError`
//! classifies into exactly one [`ErrorKind`]. The kind carries the stable
//! machine-readable code and the HTTP status used at the API boundary, so
//! callers can tell "no documents available" from "generation backend
//! failed" from "bad input" without inspecting message text.
//!
//! [`ConfigurationError`] is the only fatal error and is raised at startup,
//! never while serving a query.

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

use crate::extract::ExtractError;

/// A single document could not be turned into text.
#[derive(Debug, Error)]
pub enum DocumentReadError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("failed to read document {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document {name} is {size} bytes, over the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to extract text from {name}: {source}")]
    Extract {
        name: String,
        #[source]
        source: ExtractError,
    },

    /// The extractor panicked on malformed input.
    #[error("extracting {name} panicked: {message}")]
    Panicked { name: String, message: String },
}

/// Building the context blob for one query failed.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("no documents to aggregate")]
    NoDocuments,

    #[error("failed to list document directory {}: {source}", .dir.display())]
    Discovery {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load document {document}: {source}")]
    Read {
        document: String,
        #[source]
        source: DocumentReadError,
    },

    #[error("context is {len} characters, over the {limit} character limit")]
    ContextTooLarge { len: usize, limit: usize },
}

/// The text-generation backend failed or did not answer in time.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation timed out after {0} seconds")]
    Timeout(u64),
}

impl GenerationError {
    /// Whether a retry could plausibly succeed (network errors, 429, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Request(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            GenerationError::InvalidResponse(_) | GenerationError::Timeout(_) => false,
        }
    }
}

/// Startup-only failure. The process must not start serving.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "{0} is not set. Export it with your generation backend API key before starting the server"
    )]
    MissingCredential(&'static str),
}

/// Every way a single query can fail.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no valid question provided")]
    InvalidQuestion,

    #[error(
        "no documents in {}. Add at least one supported document to the directory",
        .dir.display()
    )]
    NoDocuments { dir: PathBuf },

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Closed classification of [`QueryError`] for callers and the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuestion,
    NoDocuments,
    DocumentError,
    ContextTooLarge,
    GenerationFailed,
    GenerationTimeout,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidQuestion => "invalid_question",
            ErrorKind::NoDocuments => "no_documents",
            ErrorKind::DocumentError => "document_error",
            ErrorKind::ContextTooLarge => "context_too_large",
            ErrorKind::GenerationFailed => "generation_failed",
            ErrorKind::GenerationTimeout => "generation_timeout",
        }
    }

    /// Client error for bad input, 503 when the operator has not provided
    /// documents, 5xx for everything that went wrong on our side.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidQuestion => StatusCode::BAD_REQUEST,
            ErrorKind::NoDocuments => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::DocumentError | ErrorKind::ContextTooLarge => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorKind::GenerationFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::GenerationTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidQuestion => ErrorKind::InvalidQuestion,
            QueryError::NoDocuments { .. } => ErrorKind::NoDocuments,
            QueryError::Aggregation(AggregationError::NoDocuments) => ErrorKind::NoDocuments,
            QueryError::Aggregation(AggregationError::ContextTooLarge { .. }) => {
                ErrorKind::ContextTooLarge
            }
            QueryError::Aggregation(_) => ErrorKind::DocumentError,
            QueryError::Generation(GenerationError::Timeout(_)) => ErrorKind::GenerationTimeout,
            QueryError::Generation(_) => ErrorKind::GenerationFailed,
        }
    }
}
