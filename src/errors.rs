// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only errors that prevent a run from starting surface through this type.
//! Per-node connection and command failures are recorded in the node's run
//! state instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScatterError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("SSH key not found: {0}")]
    KeyNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ScatterError>;
