// src/config/mod.rs

//! Configuration loading and validation for scatter.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Resolve defaults and command groups into validated node descriptors
//!   (`validate.rs`).
//!
//! Everything here happens before the engine starts; configuration errors
//! never surface from inside a run.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{Config, DefaultsSection, NodeDescriptor, RawConfigFile, RawNode};
