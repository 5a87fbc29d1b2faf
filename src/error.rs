// error.rs

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error: empty command at pipeline stage {position}")]
    EmptyStage { position: usize },

    #[error("syntax error: NUL byte in argument to `{program}`")]
    NulByte { program: String },
}

/// Failures that take the whole shell down.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("pipe failed: {0}")]
    Channel(#[source] Errno),

    #[error("fork failed for `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: Errno,
    },

    #[error("wait failed: {0}")]
    Wait(#[source] Errno),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SISH_HISTSIZE must be a positive integer, got `{0}`")]
    HistorySize(String),
}
