//! Interactive question/answer exchanges with the user.

use crate::error::{CompareError, Result};
use crate::history::{HistoryStore, SessionAnswers};
use crate::utils;
use async_trait::async_trait;
use colored::*;
use tokio::io::{self, AsyncBufReadExt, BufReader, Stdin};

pub const API_KEY_QUESTION: &str = "Please enter your OpenAI API key:";
pub const SELECTOR_QUESTION: &str = "Select step or enter a new one:";
pub const NEW_TEXT_QUESTION: &str = "Enter the raw text for this step:";
pub const FILE1_QUESTION: &str = "Enter the path of the first file:";
pub const FILE2_QUESTION: &str = "Enter the path of the second file:";
pub const TASK_QUESTION: &str = "Enter a task for the model (optional):";
pub const NEW_TEXT_CHOICE: &str = "Enter new text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOption {
    Text(String),
    Separator,
    NewText,
}

impl SelectOption {
    pub fn is_selectable(&self) -> bool {
        !matches!(self, SelectOption::Separator)
    }

    pub fn label(&self) -> &str {
        match self {
            SelectOption::Text(text) => text,
            SelectOption::Separator => "──────────────",
            SelectOption::NewText => NEW_TEXT_CHOICE,
        }
    }
}

/// Source of user answers. The terminal implementation reads stdin; tests
/// script the answers.
#[async_trait]
pub trait Prompter: Send {
    /// Ask a free-text question. An empty answer yields `default`.
    async fn input(&mut self, question: &str, default: Option<&str>) -> Result<String>;

    /// Ask the user to pick one of `options` and return the picked option.
    /// Separators are never returned.
    async fn select(&mut self, question: &str, options: &[SelectOption]) -> Result<SelectOption>;
}

/// Options offered when choosing the selector text: saved texts in stored
/// order, then the new-text sentinel.
pub fn selector_options(raw_texts_used: &[String]) -> Vec<SelectOption> {
    let mut options: Vec<SelectOption> = raw_texts_used
        .iter()
        .cloned()
        .map(SelectOption::Text)
        .collect();
    if !options.is_empty() {
        options.push(SelectOption::Separator);
    }
    options.push(SelectOption::NewText);
    options
}

/// Ask for the API key. The answer is trimmed but not validated.
pub async fn ask_api_key<P: Prompter + ?Sized>(prompter: &mut P) -> Result<String> {
    Ok(prompter.input(API_KEY_QUESTION, None).await?.trim().to_string())
}

/// Pick a saved selector text or enter a new one.
///
/// New non-blank texts are appended to `store.raw_texts_used`; the caller
/// persists them with the session.
pub async fn choose_selector<P: Prompter + ?Sized>(
    prompter: &mut P,
    store: &mut HistoryStore,
) -> Result<String> {
    let options = selector_options(&store.raw_texts_used);

    match prompter.select(SELECTOR_QUESTION, &options).await? {
        SelectOption::Text(text) => Ok(text),
        SelectOption::NewText => {
            let text = prompter.input(NEW_TEXT_QUESTION, None).await?;
            let text = text.trim().to_string();
            if !store.remember_raw_text(&text) {
                tracing::debug!("[Prompter] Blank selector text not saved for reuse");
            }
            Ok(text)
        }
        SelectOption::Separator => Err(CompareError::Prompt("separator is not selectable".to_string())),
    }
}

/// Ask for both file paths and the optional task. None of them are validated.
pub async fn collect_comparison<P: Prompter + ?Sized>(
    prompter: &mut P,
    selector_text: String,
) -> Result<SessionAnswers> {
    let file_path1 = prompter.input(FILE1_QUESTION, None).await?;
    let file_path2 = prompter.input(FILE2_QUESTION, None).await?;
    let task_prompt = prompter.input(TASK_QUESTION, Some("")).await?;

    Ok(SessionAnswers {
        selector_text,
        file_path1,
        file_path2,
        task_prompt,
    })
}

/// Reads answers line by line from stdin.
pub struct TerminalPrompter {
    reader: BufReader<Stdin>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(io::stdin()),
        }
    }

    async fn read_answer(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(CompareError::Prompt("input closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn input(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) if !d.is_empty() => utils::print_prompt(&format!("? {} ({}) ", question, d)),
            _ => utils::print_prompt(&format!("? {} ", question)),
        }

        let answer = self.read_answer().await?;
        match default {
            Some(d) if answer.is_empty() => Ok(d.to_string()),
            _ => Ok(answer),
        }
    }

    async fn select(&mut self, question: &str, options: &[SelectOption]) -> Result<SelectOption> {
        let selectable: Vec<&SelectOption> = options.iter().filter(|o| o.is_selectable()).collect();
        if selectable.is_empty() {
            return Err(CompareError::Prompt("nothing to select".to_string()));
        }

        println!("{}", format!("? {}", question).yellow().bold());
        let mut number = 0;
        for option in options {
            if option.is_selectable() {
                number += 1;
                println!("  {} {}", format!("[{}]", number).bright_green().bold(), option.label());
            } else {
                println!("  {}", option.label().dimmed());
            }
        }

        loop {
            utils::print_prompt(&format!("Enter number (1-{}): ", selectable.len()));
            let answer = self.read_answer().await?;

            match answer.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= selectable.len() => return Ok(selectable[n - 1].clone()),
                _ => utils::print_error("Invalid selection"),
            }
        }
    }
}
