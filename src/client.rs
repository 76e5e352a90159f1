//! Client shell: send one question to a running server, print one answer.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Result of a request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    Answered(String),
    Failed { status: u16, body: String },
}

/// POSTs `{"question": ...}` to `url`.
pub async fn ask(url: &str, question: &str) -> Result<AskOutcome, reqwest::Error> {
    let response = reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({ "question": question }))
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        let json: Value = response.json().await?;
        let answer = json
            .get("answer")
            .and_then(|a| a.as_str())
            .unwrap_or("No answer provided")
            .to_string();
        Ok(AskOutcome::Answered(answer))
    } else {
        let body = response.text().await.unwrap_or_default();
        Ok(AskOutcome::Failed {
            status: status.as_u16(),
            body,
        })
    }
}

/// Reads the question from stdin, prompting when attached to a terminal.
pub fn read_question() -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        println!("Type a question you'd like to ask.\nQ:");
        std::io::stdout().flush()?;
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read question from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Entry point for `docqa ask`. Exits non-zero when no answer was obtained.
pub async fn run_ask(url: &str, question: Option<String>) -> Result<()> {
    let question = match question {
        Some(q) => q,
        None => read_question()?,
    };

    match ask(url, &question).await {
        Ok(AskOutcome::Answered(answer)) => {
            println!("A: {}", answer);
            Ok(())
        }
        Ok(AskOutcome::Failed { status, body }) => {
            println!(
                "Failed to get an answer. Reason: {} Status code: {}",
                body, status
            );
            bail!("server returned {}", status)
        }
        Err(e) => {
            println!("An error occurred while making the request: {}", e);
            bail!("request to {} failed", url)
        }
    }
}
