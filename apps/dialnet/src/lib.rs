//! # dialnet
//!
//! Library half of the dialnet binary: configuration loading, edit scripts
//! and the CLI command implementations, exposed so that integration tests can
//! drive them without spawning a process.

pub mod cli;
pub mod config;
pub mod script;

pub use config::{AppConfig, LogFormat};
pub use script::{EditCommand, Replay, ReplayFailure, parse_script, replay};
