//! llm-compare - ask an LLM to compare two local files
//!
//! The library holds the pieces of the `compare` flow so they can be driven
//! with scripted prompts and a fake model backend in tests.

mod config;
pub mod core;
pub mod error;
pub mod history;
pub mod prompt;
pub mod session;
pub mod utils;

pub mod cli;

pub use crate::config::Settings;
pub use crate::core::llm::{ChatBackend, ChatMessage, LLMClient, Role, TokenStream};
pub use error::{CompareError, Result};
pub use history::{HistoryFile, HistoryStore, SessionAnswers, SessionRecord};
pub use prompt::{Prompter, SelectOption, TerminalPrompter};
pub use session::{CompareSession, SessionOutcome};
