//! # docqa
//!
//! Answers natural-language questions strictly from the contents of a local
//! directory of documents, exposed as a single HTTP operation.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌────────────┐   ┌────────┐   ┌──────────┐
//! │  /ask     │──▶│  store   │──▶│  loader +  │──▶│ prompt │──▶│  answer  │
//! │ (server)  │   │ discover │   │  context   │   │        │   │  engine  │
//! └───────────┘   └──────────┘   └────────────┘   └────────┘   └──────────┘
//! ```
//!
//! Nothing is indexed or cached: every question lists the document
//! directory, concatenates the documents' text, and sends one constrained
//! prompt to the generation backend.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and the API credential |
//! | [`error`] | Error taxonomy and status classification |
//! | [`models`] | Question, document, context, prompt and answer types |
//! | [`extract`] | Plain-text extraction for docx, pptx, xlsx, pdf, text |
//! | [`store`] | Document directory discovery |
//! | [`loader`] | Per-document text loading |
//! | [`context`] | Context aggregation |
//! | [`prompt`] | Constrained prompt rendering |
//! | [`generation`] | Generation backend, retry decorator, answer engine |
//! | [`service`] | Query orchestration |
//! | [`server`] | HTTP API |
//! | [`client`] | Command-line client |

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod generation;
pub mod loader;
pub mod models;
pub mod prompt;
pub mod server;
pub mod service;
pub mod store;
