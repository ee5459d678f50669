//! Observability events emitted by the engine

use serde::Serialize;
use std::fmt;

/// Engine state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Capturing,
    Resolving,
    Planning,
    Acting,
    Stabilizing,
    Completed,
    Aborted,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Capturing => "capturing",
            EngineState::Resolving => "resolving",
            EngineState::Planning => "planning",
            EngineState::Acting => "acting",
            EngineState::Stabilizing => "stabilizing",
            EngineState::Completed => "completed",
            EngineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What was retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    Capture,
    Recognition,
    Action,
    Replan,
    /// An acknowledged edge left the device short of its destination
    Stalled,
    Step,
}

/// Events published to the optional observability sink
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        session: String,
        from: EngineState,
        to: EngineState,
    },
    NodeResolved {
        session: String,
        node: String,
        score: f64,
    },
    Ambiguous {
        session: String,
        candidates: Vec<(String, f64)>,
    },
    Unknown {
        session: String,
        recognition_failures: usize,
    },
    EdgeExecuted {
        session: String,
        from: String,
        to: String,
        action: String,
        latency_ms: u64,
    },
    RetryOccurred {
        session: String,
        kind: RetryKind,
        attempt: u32,
    },
    RecoveryExecuted {
        session: String,
        actions: usize,
    },
    StepExecuted {
        session: String,
        index: usize,
        success: bool,
    },
    Finished {
        session: String,
        success: bool,
        reason: Option<String>,
    },
}
