//! # docqa CLI
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! docqa serve                      # answer questions over HTTP
//! docqa ask "What is the capital of France?"
//! docqa ask                        # prompts for the question on stdin
//! docqa documents                  # list what the server would read
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docqa::config::{self, Credentials};
use docqa::service::QueryService;
use docqa::store::DocumentStore;
use docqa::{client, server};

const DEFAULT_CONFIG: &str = "./config/docqa.toml";

/// Answer questions strictly from a local directory of documents.
#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional: when the default path does not exist, built-in defaults
    /// are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Requires `OPENAI_API_KEY` in the environment.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Override `[documents].dir`.
        #[arg(long)]
        documents: Option<PathBuf>,
    },

    /// Ask a running server one question.
    Ask {
        /// The question. Read from stdin when omitted.
        question: Option<String>,

        /// Endpoint to send the question to.
        #[arg(long, default_value = "http://127.0.0.1:5000/ask")]
        url: String,
    },

    /// List the documents a query would currently read.
    Documents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Ask { question, url } = &cli.command {
        return client::run_ask(url, question.clone()).await;
    }

    let required = cli.config != PathBuf::from(DEFAULT_CONFIG);
    let mut cfg = config::load_config(&cli.config, required)?;

    match cli.command {
        Commands::Serve { bind, documents } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            if let Some(dir) = documents {
                cfg.documents.dir = dir;
            }
            let credentials = Credentials::from_env().inspect_err(|e| {
                tracing::error!("{}", e);
            })?;
            let service = Arc::new(QueryService::from_config(&cfg, credentials)?);
            server::run_server(&cfg.server.bind, service).await?;
        }
        Commands::Documents => {
            let store = DocumentStore::new(&cfg.documents)?;
            let docs = store.discover()?;
            if docs.is_empty() {
                println!("No documents in {}.", store.root().display());
            }
            for doc in docs {
                println!("{}", doc.name);
            }
        }
        Commands::Ask { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
