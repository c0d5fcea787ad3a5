use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("No video/subtitle pairs found in {}", .0.display())]
    NoPairsFound(PathBuf),

    #[error("{0} not found on PATH")]
    ToolNotFound(String),

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("{tool} exited with {status}: {stderr}")]
    ExternalProcess {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Interrupted while running {0}")]
    Interrupted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MuxError>;
