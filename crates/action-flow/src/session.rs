//! Per-run session state

use autoplay_core_types::SessionId;
use nav_graph::NodeId;
use std::time::Instant;

/// Mutable state of one run.
///
/// Created when a run starts and dropped when it ends; never shared between
/// runs or devices.
#[derive(Debug)]
pub struct SessionState {
    pub id: SessionId,

    /// Best-known node; `None` while unknown
    pub current: Option<NodeId>,

    /// Consecutive capture failures
    pub consecutive_failures: u32,

    /// Consecutive unknown or ambiguous resolutions
    pub unresolved: u32,

    /// Re-plans forced by an edge exhausting its retry budget
    pub replans: u32,

    /// Acknowledged edges after which the screen was not the edge's destination
    pub stalled: u32,

    pub last_frame_at: Option<Instant>,

    /// Last time an action was acknowledged
    pub last_activity_at: Option<Instant>,

    pub started_at: Instant,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            current: None,
            consecutive_failures: 0,
            unresolved: 0,
            replans: 0,
            stalled: 0,
            last_frame_at: None,
            last_activity_at: None,
            started_at: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Some(Instant::now());
    }

    pub fn frame_captured(&mut self) {
        self.consecutive_failures = 0;
        self.last_frame_at = Some(Instant::now());
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
