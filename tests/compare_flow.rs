//! End-to-end tests for the compare flow
//!
//! The provider endpoint is served by wiremock and user answers are scripted,
//! so no API key or terminal is needed.

use async_trait::async_trait;
use llm_compare::{
    ChatBackend, ChatMessage, CompareError, CompareSession, HistoryFile, HistoryStore, LLMClient,
    Prompter, SelectOption, SessionOutcome, Settings, TokenStream,
};
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ScriptedPrompter {
    inputs: VecDeque<String>,
    picks: VecDeque<usize>,
}

impl ScriptedPrompter {
    fn new(inputs: &[&str], picks: &[usize]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            picks: picks.iter().copied().collect(),
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn input(&mut self, _question: &str, default: Option<&str>) -> llm_compare::Result<String> {
        let answer = self
            .inputs
            .pop_front()
            .ok_or_else(|| CompareError::Prompt("script exhausted".to_string()))?;
        match default {
            Some(d) if answer.is_empty() => Ok(d.to_string()),
            _ => Ok(answer),
        }
    }

    async fn select(
        &mut self,
        _question: &str,
        options: &[SelectOption],
    ) -> llm_compare::Result<SelectOption> {
        let pick = self
            .picks
            .pop_front()
            .ok_or_else(|| CompareError::Prompt("script exhausted".to_string()))?;
        Ok(options[pick].clone())
    }
}

/// Backend that must never be asked for a completion.
struct UnreachableBackend {
    initialized_with: Option<String>,
}

#[async_trait]
impl ChatBackend for UnreachableBackend {
    fn initialize(&mut self, api_key: &str) -> llm_compare::Result<()> {
        self.initialized_with = Some(api_key.to_string());
        Ok(())
    }

    async fn stream_chat(&self, _messages: Vec<ChatMessage>) -> llm_compare::Result<TokenStream> {
        panic!("stream_chat should not be reached");
    }
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body: String = deltas
        .iter()
        .map(|d| {
            format!(
                "data: {}\n\n",
                json!({ "choices": [{ "index": 0, "delta": { "content": d } }] })
            )
        })
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn settings_for(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.llm.base_url = format!("{}/v1", server.uri());
    settings
}

fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_fresh_run_records_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini", "stream": true })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["diff", " found"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let foo = write_file(dir.path(), "foo.txt", "alpha");
    let bar = write_file(dir.path(), "bar.txt", "beta");
    let history = HistoryFile::new(dir.path().join("history.json"));

    let mut prompter = ScriptedPrompter::new(&["sk-test", "demo", foo.as_str(), bar.as_str(), ""], &[0]);
    let mut client = LLMClient::new(&settings_for(&server));
    let mut out = Vec::new();

    let outcome = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut out)
        .await
        .unwrap();

    let SessionOutcome::Completed { record, response } = outcome else {
        panic!("expected a completed session");
    };
    assert_eq!(response, "diff found");
    assert_eq!(record.id, 1);
    assert!(String::from_utf8(out).unwrap().contains("diff found"));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(history.path()).unwrap()).unwrap();
    assert_eq!(raw["openAiApiKey"], "sk-test");
    assert_eq!(raw["rawTextsUsed"], json!(["demo"]));
    assert_eq!(raw["sessions"][0]["id"], 1);
    assert_eq!(raw["sessions"][0]["selectorText"], "demo");
    assert_eq!(raw["sessions"][0]["filePath1"], foo.as_str());
    assert_eq!(raw["sessions"][0]["filePath2"], bar.as_str());
    assert_eq!(raw["sessions"][0]["taskPrompt"], "");
    assert!(chrono::DateTime::parse_from_rfc3339(raw["sessions"][0]["timestamp"].as_str().unwrap()).is_ok());

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let user = sent["messages"][1]["content"].as_str().unwrap();
    assert_eq!(sent["messages"][0]["role"], "system");
    assert!(user.contains("File 1 Content:\nalpha"));
    assert!(user.contains("File 2 Content:\nbeta"));
    assert!(user.contains("Task: Compare and analyze the differences."));
    assert!(!user.contains("demo"));
}

#[tokio::test]
async fn test_second_run_reuses_key_and_selector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-saved"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.txt", "one");
    let b = write_file(dir.path(), "b.txt", "two");
    let history = HistoryFile::new(dir.path().join("history.json"));
    history
        .save(&HistoryStore {
            open_ai_api_key: Some("sk-saved".to_string()),
            raw_texts_used: vec!["review".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();

    // no key question; pick the saved text
    let mut prompter = ScriptedPrompter::new(&[a.as_str(), b.as_str(), "Summarize"], &[0]);
    let mut client = LLMClient::new(&settings_for(&server));
    let mut out = Vec::new();

    CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut out)
        .await
        .unwrap();

    let store = history.load().await;
    assert_eq!(store.raw_texts_used, vec!["review"]);
    assert_eq!(store.sessions.len(), 1);
    assert_eq!(store.sessions[0].selector_text, "review");
    assert_eq!(store.sessions[0].task_prompt, "Summarize");
}

#[tokio::test]
async fn test_missing_file_aborts_without_recording() {
    let dir = TempDir::new().unwrap();
    let b = write_file(dir.path(), "b.txt", "two");
    let missing = dir.path().join("nope.txt").to_str().unwrap().to_string();
    let history = HistoryFile::new(dir.path().join("history.json"));

    let mut prompter = ScriptedPrompter::new(&["sk-test", "fresh", missing.as_str(), b.as_str(), ""], &[0]);
    let mut backend = UnreachableBackend { initialized_with: None };
    let mut out = Vec::new();

    let outcome = CompareSession::new(&mut prompter, &mut backend, &history)
        .run(&mut out)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SessionOutcome::Aborted(CompareError::FileRead { .. })
    ));
    assert_eq!(backend.initialized_with.as_deref(), Some("sk-test"));

    // only the key write happened
    let store = history.load().await;
    assert_eq!(store.open_ai_api_key.as_deref(), Some("sk-test"));
    assert!(store.raw_texts_used.is_empty());
    assert!(store.sessions.is_empty());
}

#[tokio::test]
async fn test_provider_rejection_aborts_without_recording() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.txt", "one");
    let b = write_file(dir.path(), "b.txt", "two");
    let history = HistoryFile::new(dir.path().join("history.json"));
    let before = HistoryStore {
        open_ai_api_key: Some("sk-bad".to_string()),
        ..Default::default()
    };
    history.save(&before).await.unwrap();

    let mut prompter = ScriptedPrompter::new(&["demo", a.as_str(), b.as_str(), ""], &[0]);
    let mut client = LLMClient::new(&settings_for(&server));
    let mut out = Vec::new();

    let outcome = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut out)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SessionOutcome::Aborted(CompareError::StreamSetup(_))
    ));
    assert!(out.is_empty());
    assert_eq!(history.load().await, before);
}

#[tokio::test]
async fn test_empty_key_fails_initialization() {
    let dir = TempDir::new().unwrap();
    let history = HistoryFile::new(dir.path().join("history.json"));

    let mut prompter = ScriptedPrompter::new(&["   "], &[]);
    let mut client = LLMClient::new(&Settings::default());
    let mut out = Vec::new();

    let result = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut out)
        .await;

    assert!(matches!(result, Err(CompareError::Initialization)));
    // the blank key was still captured before initialization
    assert_eq!(history.load().await.open_ai_api_key.as_deref(), Some(""));
}

#[tokio::test]
async fn test_blank_saved_key_is_asked_for_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-real"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.txt", "one");
    let b = write_file(dir.path(), "b.txt", "two");
    let history = HistoryFile::new(dir.path().join("history.json"));

    let mut prompter = ScriptedPrompter::new(&["  "], &[]);
    let mut client = LLMClient::new(&settings_for(&server));
    let first = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut Vec::<u8>::new())
        .await;
    assert!(matches!(first, Err(CompareError::Initialization)));

    let mut prompter = ScriptedPrompter::new(&["sk-real", "demo", a.as_str(), b.as_str(), ""], &[0]);
    let mut client = LLMClient::new(&settings_for(&server));
    let second = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut Vec::<u8>::new())
        .await
        .unwrap();

    assert!(matches!(second, SessionOutcome::Completed { .. }));
    assert!(prompter.inputs.is_empty());
    let store = history.load().await;
    assert_eq!(store.open_ai_api_key.as_deref(), Some("sk-real"));
    assert_eq!(store.sessions.len(), 1);
}

#[tokio::test]
async fn test_last_event_without_trailing_newline_is_kept() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {}",
        json!({ "choices": [{ "index": 0, "delta": { "content": "diff" } }] }),
        json!({ "choices": [{ "index": 0, "delta": { "content": " found" } }] })
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.txt", "one");
    let b = write_file(dir.path(), "b.txt", "two");
    let history = HistoryFile::new(dir.path().join("history.json"));

    let mut prompter = ScriptedPrompter::new(&["sk-test", "", a.as_str(), b.as_str(), ""], &[0]);
    let mut client = LLMClient::new(&settings_for(&server));
    let outcome = CompareSession::new(&mut prompter, &mut client, &history)
        .run(&mut Vec::<u8>::new())
        .await
        .unwrap();

    let SessionOutcome::Completed { response, .. } = outcome else {
        panic!("expected a completed session");
    };
    assert_eq!(response, "diff found");
}

#[tokio::test]
async fn test_existing_sessions_get_next_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["x"]), "text/event-stream"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.txt", "one");
    let b = write_file(dir.path(), "b.txt", "two");
    let history = HistoryFile::new(dir.path().join("history.json"));

    for run in 0..3 {
        // the key is only asked for on the first run
        let mut prompter = if run == 0 {
            ScriptedPrompter::new(&["sk-test", "", a.as_str(), b.as_str(), ""], &[0])
        } else {
            ScriptedPrompter::new(&["", a.as_str(), b.as_str(), ""], &[0])
        };
        let mut client = LLMClient::new(&settings_for(&server));
        let mut out = Vec::new();
        CompareSession::new(&mut prompter, &mut client, &history)
            .run(&mut out)
            .await
            .unwrap();
    }

    let store = history.load().await;
    let ids: Vec<u64> = store.sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    // blank selector texts are never offered again
    assert!(store.raw_texts_used.is_empty());
}
