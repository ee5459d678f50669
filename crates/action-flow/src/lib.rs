//! Engine Orchestration Layer
//!
//! Drives one device through recognize → plan → act:
//! - binds tasks to a controller, rejecting actions it cannot perform
//! - resolves the current UI state from template matches
//! - plans the cheapest route through the navigation graph
//! - executes, retries, recovers, and reports a terminal outcome

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod resolver;
pub mod session;
pub mod strategies;
pub mod types;

pub use config::{BackoffConfig, EngineConfig};
pub use engine::{BoundTask, Engine};
pub use errors::EngineError;
pub use events::{EngineEvent, EngineState, RetryKind};
pub use resolver::{resolve, Resolution};
pub use session::SessionState;
pub use strategies::RetryPolicy;
pub use types::{AbortReason, Outcome, RunReport, StepResult, Task, TaskStep};
