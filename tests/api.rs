//! End-to-end tests of `POST /ask` against a real listener, with the
//! generation backend replaced by in-process stubs.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa::client::{ask, AskOutcome};
use docqa::config::{Config, Credentials, DocumentsConfig};
use docqa::context::ContextAggregator;
use docqa::error::GenerationError;
use docqa::generation::{AnswerEngine, TextGenerator};
use docqa::loader::FileLoader;
use docqa::prompt::DECLINE_REPLY;
use docqa::server::router;
use docqa::service::QueryService;
use docqa::store::DocumentStore;
use serde_json::Value;
use tempfile::TempDir;

/// Answers with the first context sentence sharing a significant word with
/// the question, and declines otherwise. Mimics a backend that follows the
/// prompt's rules.
struct GroundedStub;

fn significant_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 4)
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl TextGenerator for GroundedStub {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let context = prompt
            .split_once("<documents>\n")
            .and_then(|(_, rest)| rest.split_once("\n</documents>"))
            .map(|(c, _)| c)
            .ok_or_else(|| GenerationError::InvalidResponse("no documents section".into()))?;
        let question = prompt
            .split_once("The Question: \"")
            .and_then(|(_, rest)| rest.rsplit_once('"'))
            .map(|(q, _)| q)
            .ok_or_else(|| GenerationError::InvalidResponse("no question".into()))?;

        let wanted = significant_words(question);
        let answer = context
            .split_inclusive('.')
            .map(str::trim)
            .find(|sentence| {
                significant_words(sentence)
                    .iter()
                    .any(|w| wanted.contains(w))
            });
        Ok(answer.unwrap_or(DECLINE_REPLY).to_string())
    }
}

struct FailingStub;

#[async_trait]
impl TextGenerator for FailingStub {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Status {
            status: 500,
            body: "upstream exploded".into(),
        })
    }
}

struct SlowStub;

#[async_trait]
impl TextGenerator for SlowStub {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("late".into())
    }
}

fn docx_with_text(text: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Starts a server over `dir` and returns the `/ask` URL.
async fn spawn_server(
    dir: &Path,
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
) -> String {
    let config = DocumentsConfig {
        dir: dir.to_path_buf(),
        ..DocumentsConfig::default()
    };
    let service = QueryService::new(
        DocumentStore::new(&config).unwrap(),
        Arc::new(FileLoader::new(config.max_file_bytes)),
        ContextAggregator::from_config(&config),
        AnswerEngine::new(generator, timeout),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(service))).await.unwrap();
    });
    format!("http://{}/ask", addr)
}

/// Starts a server wired from config, so generation goes through the real
/// HTTP backend at `generation_url`.
async fn spawn_configured_server(dir: &Path, generation_url: String, timeout_secs: u64) -> String {
    let mut config = Config::default();
    config.documents.dir = dir.to_path_buf();
    config.generation.url = generation_url;
    config.generation.timeout_secs = timeout_secs;
    let service = QueryService::from_config(&config, Credentials::new("test-key")).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(service))).await.unwrap();
    });
    format!("http://{}/ask", addr)
}

async fn post_json(url: &str, body: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(url)
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let json = resp.json().await.unwrap_or(Value::Null);
    (status, json)
}

fn error_code(json: &Value) -> &str {
    json["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn answers_from_word_document() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("france.docx"),
        docx_with_text("The capital of France is Paris."),
    )
    .unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "What is the capital of France?"}"#).await;
    assert_eq!(status, 200, "body: {}", json);
    assert!(json["answer"].as_str().unwrap().contains("Paris"));
}

#[tokio::test]
async fn embedded_question_is_not_answered() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("quiz.docx"), docx_with_text("What is 2+2?")).unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "What is the capital of France?"}"#).await;
    assert_eq!(status, 200);
    let answer = json["answer"].as_str().unwrap();
    assert_eq!(answer, DECLINE_REPLY);
    assert!(!answer.contains('4'));
}

#[tokio::test]
async fn empty_store_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "Anything?"}"#).await;
    assert_eq!(status, 503);
    assert_eq!(error_code(&json), "no_documents");
}

#[tokio::test]
async fn non_docx_files_are_ignored_by_default() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.txt"), "The capital of France is Paris.").unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "What is the capital of France?"}"#).await;
    assert_eq!(status, 503);
    assert_eq!(error_code(&json), "no_documents");
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.docx"), docx_with_text("text")).unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "   "}"#).await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&json), "invalid_question");
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    for body in ["{}", r#"{"question": 42}"#, "not json"] {
        let (status, json) = post_json(&url, body).await;
        assert_eq!(status, 400, "body {:?}", body);
        assert_eq!(error_code(&json), "bad_request");
    }

    let resp = reqwest::Client::new()
        .post(&url)
        .body(r#"{"question": "q"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn backend_failure_is_reported_not_answered() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.docx"), docx_with_text("text")).unwrap();
    let url = spawn_server(tmp.path(), Arc::new(FailingStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "q?"}"#).await;
    assert_eq!(status, 502);
    assert_eq!(error_code(&json), "generation_failed");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("upstream exploded"));
    assert!(json.get("answer").is_none());
}

#[tokio::test]
async fn slow_backend_times_out() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.docx"), docx_with_text("text")).unwrap();
    let url = spawn_server(tmp.path(), Arc::new(SlowStub), Duration::from_secs(1)).await;

    let (status, json) = post_json(&url, r#"{"question": "q?"}"#).await;
    assert_eq!(status, 504);
    assert_eq!(error_code(&json), "generation_timeout");
}

#[tokio::test]
async fn unreadable_document_names_the_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("good.docx"), docx_with_text("fine")).unwrap();
    fs::write(tmp.path().join("broken.docx"), b"not a zip").unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    let (status, json) = post_json(&url, r#"{"question": "q?"}"#).await;
    assert_eq!(status, 500);
    assert_eq!(error_code(&json), "document_error");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("broken.docx"));
}

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;
    let health_url = url.replace("/ask", "/health");

    let json: Value = reqwest::get(&health_url).await.unwrap().json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn client_reports_answer_and_failure() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_server(tmp.path(), Arc::new(GroundedStub), Duration::from_secs(5)).await;

    match ask(&url, "Anything?").await.unwrap() {
        AskOutcome::Failed { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("no_documents"));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    fs::write(
        tmp.path().join("france.docx"),
        docx_with_text("The capital of France is Paris."),
    )
    .unwrap();
    let outcome = ask(&url, "What is the capital of France?").await.unwrap();
    assert_eq!(
        outcome,
        AskOutcome::Answered("The capital of France is Paris.".to_string())
    );
}

#[tokio::test]
async fn backend_that_never_responds_is_a_timeout() {
    // Accepts connections and holds them open without ever replying.
    let backend = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = backend.accept().await {
            held.push(socket);
        }
    });

    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.docx"), docx_with_text("Paris is in France.")).unwrap();
    let url = spawn_configured_server(
        tmp.path(),
        format!("http://{}/v1/chat/completions", backend_addr),
        1,
    )
    .await;

    let (status, json) = post_json(&url, r#"{"question": "Where is Paris?"}"#).await;
    assert_eq!(status, 504);
    assert_eq!(error_code(&json), "generation_timeout");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn unreachable_backend_reports_the_underlying_cause() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.docx"), docx_with_text("Paris is in France.")).unwrap();
    let url = spawn_configured_server(
        tmp.path(),
        format!("http://{}/v1/chat/completions", closed_addr),
        5,
    )
    .await;

    let (status, json) = post_json(&url, r#"{"question": "Where is Paris?"}"#).await;
    assert_eq!(status, 502);
    assert_eq!(error_code(&json), "generation_failed");
    let message = json["error"]["message"].as_str().unwrap().to_lowercase();
    assert!(message.contains("refused"), "message lacks cause: {message}");
}
