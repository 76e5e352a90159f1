//! Turns a [`DocumentRef`] into plain text.

use crate::error::DocumentReadError;
use crate::extract::{extract_sections, Format};
use crate::models::DocumentRef;

/// Produces the primary text of one document.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, doc: &DocumentRef) -> Result<String, DocumentReadError>;
}

/// Reads documents from the local filesystem.
///
/// Only the first logical section is returned: the first page of a PDF, the
/// first slide of a deck, the first worksheet of a workbook, or the whole
/// body of a Word or text document.
#[derive(Debug, Clone)]
pub struct FileLoader {
    max_file_bytes: u64,
}

impl FileLoader {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, doc: &DocumentRef) -> Result<String, DocumentReadError> {
        let format = doc
            .extension()
            .as_deref()
            .and_then(Format::from_extension)
            .ok_or_else(|| DocumentReadError::UnsupportedFormat(doc.name.clone()))?;

        let io_error = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DocumentReadError::NotFound(doc.name.clone())
            } else {
                DocumentReadError::Io {
                    name: doc.name.clone(),
                    source,
                }
            }
        };

        let size = std::fs::metadata(&doc.path).map_err(io_error)?.len();
        if size > self.max_file_bytes {
            return Err(DocumentReadError::TooLarge {
                name: doc.name.clone(),
                size,
                limit: self.max_file_bytes,
            });
        }

        let bytes = std::fs::read(&doc.path).map_err(io_error)?;
        let sections =
            extract_sections(&bytes, format).map_err(|source| DocumentReadError::Extract {
                name: doc.name.clone(),
                source,
            })?;

        Ok(sections.into_iter().next().unwrap_or_default())
    }
}
