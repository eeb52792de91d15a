//! Compare session orchestration
//!
//! Drives one run from start to finish: history load, API key capture,
//! selector choice, file reads, the streamed completion and finally the
//! session record. The flow never branches back; failures while reading
//! files or streaming end the run without recording the session.

use crate::core::llm::{ChatBackend, ChatMessage, TokenStream};
use crate::error::{CompareError, Result};
use crate::history::{HistoryFile, SessionRecord};
use crate::prompt::{self, Prompter};
use crate::utils;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SYSTEM_PROMPT: &str = "You are an expert reviewer. You compare the contents of two files \
and explain their differences clearly and precisely.";
pub const USER_HEADER: &str = "Please compare the following two files.";
pub const DEFAULT_TASK: &str = "Compare and analyze the differences.";

#[derive(Debug)]
pub enum SessionOutcome {
    /// The response was streamed and the session saved.
    Completed {
        record: SessionRecord,
        response: String,
    },
    /// The run stopped early; nothing pending was saved.
    Aborted(CompareError),
}

/// Build the two-message conversation. The selector text is never part of it.
pub fn build_conversation(file1: &str, file2: &str, task_prompt: &str) -> Vec<ChatMessage> {
    let task = if task_prompt.is_empty() {
        DEFAULT_TASK
    } else {
        task_prompt
    };

    let user = format!(
        "{}\n\nFile 1 Content:\n{}\n\nFile 2 Content:\n{}\n\nTask: {}",
        USER_HEADER, file1, file2, task
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Write every non-empty delta to `out` as it arrives and return the
/// concatenation.
pub async fn stream_to<W: Write + ?Sized>(mut tokens: TokenStream, out: &mut W) -> Result<String> {
    let mut full = String::new();

    while let Some(delta) = tokens.next().await {
        let delta = delta?;
        if delta.is_empty() {
            continue;
        }
        out.write_all(delta.as_bytes())?;
        out.flush()?;
        full.push_str(&delta);
    }

    Ok(full)
}

/// Resolve a typed path against the working directory for reading.
fn resolve_path(typed: &str) -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(Path::new(typed)))
}

async fn read_input(typed: &str) -> Result<String> {
    let path = resolve_path(typed)?;
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| CompareError::FileRead { path, source })
}

pub struct CompareSession<'a, P: ?Sized, B: ?Sized> {
    prompter: &'a mut P,
    backend: &'a mut B,
    history: &'a HistoryFile,
}

impl<'a, P, B> CompareSession<'a, P, B>
where
    P: Prompter + ?Sized,
    B: ChatBackend + ?Sized,
{
    pub fn new(prompter: &'a mut P, backend: &'a mut B, history: &'a HistoryFile) -> Self {
        Self {
            prompter,
            backend,
            history,
        }
    }

    /// Run the flow, streaming model output into `out`.
    ///
    /// File and stream failures are reported and yield
    /// [`SessionOutcome::Aborted`]. Prompt, initialization and history write
    /// failures are returned as errors.
    pub async fn run<W: Write + ?Sized>(mut self, out: &mut W) -> Result<SessionOutcome> {
        let mut store = self.history.load().await;

        // a blank stored key can never initialize, so ask again
        let api_key = match store.open_ai_api_key.clone().filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => {
                let key = prompt::ask_api_key(&mut *self.prompter).await?;
                store.open_ai_api_key = Some(key.clone());
                self.history.save(&store).await?;
                tracing::info!("[CompareSession] API key saved to {:?}", self.history.path());
                key
            }
        };

        self.backend.initialize(&api_key)?;

        let selector_text = prompt::choose_selector(&mut *self.prompter, &mut store).await?;
        let answers = prompt::collect_comparison(&mut *self.prompter, selector_text).await?;

        let file1 = match read_input(&answers.file_path1).await {
            Ok(content) => content,
            Err(e) => return Ok(abort("Error reading files", e)),
        };
        let file2 = match read_input(&answers.file_path2).await {
            Ok(content) => content,
            Err(e) => return Ok(abort("Error reading files", e)),
        };

        let messages = build_conversation(&file1, &file2, &answers.task_prompt);
        tracing::debug!(
            "[CompareSession] Sending {} bytes and {} bytes of file content",
            file1.len(),
            file2.len()
        );

        let tokens = match self.backend.stream_chat(messages).await {
            Ok(tokens) => tokens,
            Err(e) => return Ok(abort("Error during streaming", e)),
        };
        let response = match stream_to(tokens, out).await {
            Ok(response) => response,
            Err(e) => return Ok(abort("Error during streaming", e)),
        };

        writeln!(out, "\n\nFull response:\n{}", response)?;
        out.flush()?;

        let record = store.record_session(answers).clone();
        self.history.save(&store).await?;
        tracing::info!("[CompareSession] Recorded session {}", record.id);

        Ok(SessionOutcome::Completed { record, response })
    }
}

fn abort(context: &str, error: CompareError) -> SessionOutcome {
    tracing::error!("[CompareSession] {}: {:?}", context, error);
    utils::print_error(&format!("{}: {}", context, error));
    SessionOutcome::Aborted(error)
}
