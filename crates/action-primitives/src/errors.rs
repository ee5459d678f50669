//! Error types for controllers and action execution

use autoplay_core_types::Capability;
use thiserror::Error;

/// Errors reported by a device backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Transport or I/O hiccup; the device may answer next time
    #[error("Device I/O error: {0}")]
    Io(String),

    /// Device did not acknowledge in time
    #[error("Device timeout: {0}")]
    Timeout(String),

    /// Connection dropped; the session cannot continue
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Backend does not implement this operation
    #[error("Operation not supported: {0}")]
    Unsupported(Capability),
}

impl ControllerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControllerError::DeviceLost(_))
    }
}

/// Errors returned when executing a single action
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Recoverable failure (transient I/O, template not on screen, ...)
    #[error("Action {action} failed: {reason}")]
    ActionFailed { action: String, reason: String },

    /// Action did not complete before its deadline
    #[error("Action {action} timed out after {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    /// Device connection dropped
    #[error("Device lost during {action}: {reason}")]
    DeviceLost { action: String, reason: String },

    /// Controller cannot perform the capability this action requires
    #[error("Capability {capability} unavailable for action {action}")]
    CapabilityUnavailable {
        action: String,
        capability: Capability,
    },

    /// Cancelled before the action was issued
    #[error("Operation interrupted: {0}")]
    Interrupted(String),
}

impl ActionError {
    /// Map a controller failure onto the action that triggered it
    pub fn from_controller(action: &str, err: ControllerError) -> Self {
        match err {
            ControllerError::Io(reason) => ActionError::ActionFailed {
                action: action.to_string(),
                reason,
            },
            ControllerError::Timeout(reason) => ActionError::ActionFailed {
                action: action.to_string(),
                reason: format!("timeout: {}", reason),
            },
            ControllerError::DeviceLost(reason) => ActionError::DeviceLost {
                action: action.to_string(),
                reason,
            },
            ControllerError::Unsupported(capability) => ActionError::CapabilityUnavailable {
                action: action.to_string(),
                capability,
            },
        }
    }

    pub fn failed(action: &str, reason: impl Into<String>) -> Self {
        ActionError::ActionFailed {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::ActionFailed { .. } | ActionError::Timeout { .. }
        )
    }

    /// Fatal errors end the session immediately
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::DeviceLost { .. })
    }
}
