use anyhow::Result;
use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const HISTORY_FILE_NAME: &str = "compare-history.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LLMConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Overrides the default location next to the executable
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LLMConfig {
                model: DEFAULT_MODEL.to_string(),
                temperature: Some(DEFAULT_TEMPERATURE),
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            history: HistoryConfig::default(),
            logging: LoggingConfig {
                level: "warn".to_string(),
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .set_default("llm.model", DEFAULT_MODEL)?
            .set_default("llm.temperature", DEFAULT_TEMPERATURE as f64)?
            .set_default("llm.base_url", DEFAULT_BASE_URL)?
            .set_default("logging.level", "warn")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Location of the history document.
    pub fn history_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.history.path {
            return Ok(path.clone());
        }

        let exe = env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Executable path {:?} has no parent directory", exe))?;
        Ok(dir.join(HISTORY_FILE_NAME))
    }
}
