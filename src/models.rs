//! Core data types that flow through one query.
//!
//! None of these outlive the request that created them: the question is
//! validated on entry, the context blob and prompt are built once and
//! dropped when the answer is returned.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::QueryError;

/// A caller's question, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Validates raw input. Empty or whitespace-only text is rejected with
    /// [`QueryError::InvalidQuestion`].
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueryError::InvalidQuestion);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One document in the store, named by its path relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub name: String,
    pub path: PathBuf,
}

impl DocumentRef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Ordered concatenation of every document's text for a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlob {
    text: String,
    documents: usize,
}

impl ContextBlob {
    pub(crate) fn new(text: String, documents: usize) -> Self {
        Self { text, documents }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of documents that contributed to the blob.
    pub fn document_count(&self) -> usize {
        self.documents
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// The rendered instruction text sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A successful answer, serialized as `{"answer": "..."}` at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
}
