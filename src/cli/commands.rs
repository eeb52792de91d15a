use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "llm-compare")]
#[command(author, version, about = "Compare two files with an LLM and keep a session history", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Compare two files interactively
    Compare,

    /// List past compare sessions
    History,
}
