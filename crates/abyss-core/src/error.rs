//! Error types for Abyss

use std::path::PathBuf;
use thiserror::Error;

use crate::types::exit;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("discovery failed in {}: {reason}", path.display())]
    Discovery { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_target(input: impl Into<String>) -> Self {
        Self::InvalidTarget(input.into())
    }

    pub fn discovery(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Discovery {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Exit code for errors that end the CLI before a run starts.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidTarget(_) => exit::INVALID_INPUT,
            _ => exit::FAILURE,
        }
    }
}
