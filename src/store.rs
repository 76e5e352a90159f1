//! Document store discovery.
//!
//! The store is a flat directory owned by the operator. It is listed fresh
//! on every query so additions and removals show up immediately.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::error::AggregationError;
use crate::models::DocumentRef;

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    include: GlobSet,
}

impl DocumentStore {
    pub fn new(config: &DocumentsConfig) -> Result<Self> {
        Ok(Self {
            root: config.dir.clone(),
            include: build_globset(&config.include_globs)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the documents currently in the store, ordered by file name.
    ///
    /// Hidden files and Office lock files (`~$name.docx`) are skipped. An
    /// empty result is not an error here; the caller decides.
    pub fn discover(&self) -> Result<Vec<DocumentRef>, AggregationError> {
        let discovery_error = |source: std::io::Error| AggregationError::Discovery {
            dir: self.root.clone(),
            source,
        };

        let mut docs = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| discovery_error(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || name.starts_with("~$") {
                continue;
            }
            if !self.include.is_match(&name) {
                continue;
            }
            docs.push(DocumentRef::new(name, entry.path()));
        }

        docs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(docs)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
