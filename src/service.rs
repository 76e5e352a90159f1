//! One question in, one answer out.
//!
//! ```text
//! validate ─▶ discover ─▶ aggregate ─▶ build prompt ─▶ generate
//!    │           │            │                           │
//!    ▼           ▼            ▼                           ▼
//! InvalidQuestion NoDocuments Aggregation(..)        Generation(..)
//! ```
//!
//! Every stage failure is terminal for the call; nothing is retried here
//! and nothing is kept between calls.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::config::{Config, Credentials};
use crate::context::ContextAggregator;
use crate::error::{AggregationError, QueryError};
use crate::generation::AnswerEngine;
use crate::loader::{DocumentLoader, FileLoader};
use crate::models::{Answer, ContextBlob, Question};
use crate::prompt::PromptBuilder;
use crate::store::DocumentStore;

pub struct QueryService {
    store: DocumentStore,
    loader: Arc<dyn DocumentLoader>,
    aggregator: ContextAggregator,
    prompts: PromptBuilder,
    engine: AnswerEngine,
}

impl QueryService {
    pub fn new(
        store: DocumentStore,
        loader: Arc<dyn DocumentLoader>,
        aggregator: ContextAggregator,
        engine: AnswerEngine,
    ) -> Self {
        Self {
            store,
            loader,
            aggregator,
            prompts: PromptBuilder,
            engine,
        }
    }

    /// Wires the filesystem store and loader with the configured backend.
    pub fn from_config(config: &Config, credentials: Credentials) -> Result<Self> {
        let store = DocumentStore::new(&config.documents)?;
        let loader = Arc::new(FileLoader::new(config.documents.max_file_bytes));
        let aggregator = ContextAggregator::from_config(&config.documents);
        let engine = AnswerEngine::from_config(&config.generation, credentials)?;
        Ok(Self::new(store, loader, aggregator, engine))
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub async fn run(&self, raw_question: &str) -> Result<Answer, QueryError> {
        let started = Instant::now();
        let result = self.run_stages(raw_question).await;
        match &result {
            Ok(answer) => tracing::info!(
                answer_chars = answer.answer.chars().count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "query answered"
            ),
            Err(e) => tracing::warn!(
                kind = e.kind().code(),
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "query failed"
            ),
        }
        result
    }

    async fn run_stages(&self, raw_question: &str) -> Result<Answer, QueryError> {
        let question = Question::parse(raw_question)?;

        let context = self.load_context().await?;
        tracing::info!(
            documents = context.document_count(),
            context_chars = context.char_len(),
            "context aggregated"
        );

        let prompt = self.prompts.build(&question, &context);
        let answer = self.engine.answer(&prompt).await?;
        Ok(Answer { answer })
    }

    /// Discovery and extraction touch the filesystem and parse archives, so
    /// they run on the blocking pool.
    async fn load_context(&self) -> Result<ContextBlob, QueryError> {
        let store = self.store.clone();
        let loader = self.loader.clone();
        let aggregator = self.aggregator.clone();

        let task = tokio::task::spawn_blocking(move || {
            let docs = store.discover()?;
            if docs.is_empty() {
                return Err(QueryError::NoDocuments {
                    dir: store.root().to_path_buf(),
                });
            }
            aggregator
                .aggregate(loader.as_ref(), &docs)
                .map_err(QueryError::from)
        });

        match task.await {
            Ok(result) => result,
            // Loader panics are caught per document; anything reaching here
            // (discovery panic, runtime shutdown) is reported, not re-raised.
            Err(e) => Err(AggregationError::Discovery {
                dir: self.store.root().to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            }
            .into()),
        }
    }
}
