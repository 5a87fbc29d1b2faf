// config.rs

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::history::DEFAULT_CAPACITY;

pub const DEFAULT_PROMPT: &str = "sish> ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    pub history_size: usize,
    /// Loaded when the shell starts and rewritten when it exits.
    pub histfile: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            history_size: DEFAULT_CAPACITY,
            histfile: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(prompt) = lookup("SISH_PROMPT") {
            config.prompt = prompt;
        }
        if let Some(size) = lookup("SISH_HISTSIZE") {
            config.history_size = match size.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::HistorySize(size)),
            };
        }
        config.histfile = lookup("HISTFILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Ok(config)
    }
}
