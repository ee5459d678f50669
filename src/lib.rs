//! AutoPlay command-line front end
//!
//! Loads manifests, configuration and replay devices for the engine crates,
//! and exposes them for integration testing.

pub mod cli;
pub mod config;
pub mod manifest;
pub mod replay;

pub use config::AppConfig;
pub use manifest::Manifest;
pub use replay::{RecordedAction, ReplayController};
