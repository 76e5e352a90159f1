//! Builds the context blob for one query.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::config::DocumentsConfig;
use crate::error::{AggregationError, DocumentReadError};
use crate::loader::DocumentLoader;
use crate::models::{ContextBlob, DocumentRef};

/// Concatenates document texts, in the order given, into one bounded blob.
#[derive(Debug, Clone)]
pub struct ContextAggregator {
    separator: String,
    max_chars: usize,
}

impl ContextAggregator {
    pub fn new(separator: impl Into<String>, max_chars: usize) -> Self {
        Self {
            separator: separator.into(),
            max_chars,
        }
    }

    pub fn from_config(config: &DocumentsConfig) -> Self {
        Self::new(config.separator.clone(), config.max_context_chars)
    }

    /// Loads every document and joins their texts with the separator.
    ///
    /// Stops at the first document that fails to load; a loader panic counts
    /// as a failed load of that document. The blob is never
    /// truncated: exceeding the character limit fails with
    /// [`AggregationError::ContextTooLarge`].
    pub fn aggregate(
        &self,
        loader: &dyn DocumentLoader,
        docs: &[DocumentRef],
    ) -> Result<ContextBlob, AggregationError> {
        if docs.is_empty() {
            return Err(AggregationError::NoDocuments);
        }

        let separator_chars = self.separator.chars().count();
        let mut text = String::new();
        let mut chars = 0usize;

        for (i, doc) in docs.iter().enumerate() {
            let body = load_guarded(loader, doc).map_err(|source| AggregationError::Read {
                document: doc.name.clone(),
                source,
            })?;

            if i > 0 {
                text.push_str(&self.separator);
                chars += separator_chars;
            }
            text.push_str(&body);
            chars += body.chars().count();

            // Checked per document so an oversized store fails before
            // loading the rest of it.
            if chars > self.max_chars {
                return Err(AggregationError::ContextTooLarge {
                    len: chars,
                    limit: self.max_chars,
                });
            }
        }

        Ok(ContextBlob::new(text, docs.len()))
    }
}

/// Third-party extractors (notably the PDF one) can panic on malformed
/// files; contain that to the one document.
fn load_guarded(
    loader: &dyn DocumentLoader,
    doc: &DocumentRef,
) -> Result<String, DocumentReadError> {
    panic::catch_unwind(AssertUnwindSafe(|| loader.load(doc))).unwrap_or_else(|payload| {
        Err(DocumentReadError::Panicked {
            name: doc.name.clone(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
