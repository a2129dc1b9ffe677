//! Infrastructure layer for chaosflow.
//!
//! Loads `config.toml`, resolves the data directory, and reads and writes
//! workflow files on behalf of the CLI.

pub mod config;
pub mod filesystem;
