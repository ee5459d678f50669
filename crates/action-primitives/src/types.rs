//! Core data types for device actions

use autoplay_core_types::Capability;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Execution context for a single action
///
/// Contains the runtime context needed to execute an action:
/// - Deadline for timeout enforcement
/// - Cancellation token, checked before the action is issued
/// - Unique action ID for tracing and correlation
#[derive(Clone)]
pub struct ExecCtx {
    /// Deadline for this operation
    pub deadline: Instant,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,

    /// Unique identifier for this action
    pub action_id: String,
}

impl ExecCtx {
    /// Create a new execution context
    pub fn new(timeout: Duration, cancel_token: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Check if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if this context has exceeded its deadline
    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get remaining time until deadline
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Hardware or soft keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Home,
    Back,
    Enter,
    /// Raw platform key code
    Code(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Escape => f.write_str("escape"),
            Key::Home => f.write_str("home"),
            Key::Back => f.write_str("back"),
            Key::Enter => f.write_str("enter"),
            Key::Code(code) => write!(f, "code:{}", code),
        }
    }
}

fn default_slope() -> f32 {
    1.0
}

fn default_swipe_ms() -> u64 {
    300
}

fn default_present() -> bool {
    true
}

/// Pointer swipe with cubic easing.
///
/// The end point may lie off screen, hence the signed coordinates. Slopes of
/// 1.0 at both ends give linear motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwipeGesture {
    pub start: (u32, u32),
    pub end: (i32, i32),
    #[serde(default = "default_swipe_ms")]
    pub duration_ms: u64,
    #[serde(default = "default_slope")]
    pub slope_in: f32,
    #[serde(default = "default_slope")]
    pub slope_out: f32,
}

impl SwipeGesture {
    pub fn new(start: (u32, u32), end: (i32, i32), duration: Duration) -> Self {
        Self {
            start,
            end,
            duration_ms: duration.as_millis() as u64,
            slope_in: 1.0,
            slope_out: 1.0,
        }
    }

    pub fn with_slopes(mut self, slope_in: f32, slope_out: f32) -> Self {
        self.slope_in = slope_in;
        self.slope_out = slope_out;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Eased progress in [0, 1] for normalized time `t`
    pub fn progress(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let a = self.slope_in;
        let b = -(2.0 * self.slope_in + self.slope_out - 3.0);
        let c = -(-self.slope_in - self.slope_out + 2.0);
        (a * t + b * t * t + c * t * t * t).clamp(0.0, 1.0)
    }

    /// Pointer position at normalized time `t`
    pub fn point_at(&self, t: f32) -> (i32, i32) {
        let p = self.progress(t);
        let lerp = |a: f32, b: f32| (a + (b - a) * p).round() as i32;
        (
            lerp(self.start.0 as f32, self.end.0 as f32),
            lerp(self.start.1 as f32, self.end.1 as f32),
        )
    }

    /// Intermediate pointer positions sampled every `step`, ending at `end`
    pub fn path(&self, step: Duration) -> Vec<(i32, i32)> {
        let total = self.duration_ms.max(1);
        let step = (step.as_millis() as u64).max(1);
        let mut points: Vec<(i32, i32)> = (step..total)
            .step_by(step as usize)
            .map(|ms| self.point_at(ms as f32 / total as f32))
            .collect();
        points.push(self.end);
        points
    }
}

/// Atomic, backend-agnostic device instruction.
///
/// The variant set is closed; each variant needs exactly one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Tap a coordinate
    Click { x: u32, y: u32 },

    /// Swipe between two coordinates
    Swipe(SwipeGesture),

    /// Press a key
    KeyPress { key: Key },

    /// Launch an application by package/identifier
    Launch { package: String },

    /// Pause for a fixed time
    Wait { duration_ms: u64 },

    /// Check that a template is (or is not) on screen
    Assert {
        template: String,
        #[serde(default = "default_present")]
        present: bool,
    },

    /// Tap the centre of a template located on a fresh capture
    ClickTemplate { template: String },
}

impl Action {
    /// The single capability needed to execute this action
    pub fn required_capability(&self) -> Capability {
        match self {
            Action::Click { .. } | Action::ClickTemplate { .. } => Capability::Tap,
            Action::Swipe(_) => Capability::Swipe,
            Action::KeyPress { .. } => Capability::KeyEvent,
            Action::Launch { .. } => Capability::AppLaunch,
            Action::Wait { .. } => Capability::Wait,
            Action::Assert { .. } => Capability::ScreenCapture,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Swipe(_) => "swipe",
            Action::KeyPress { .. } => "key_press",
            Action::Launch { .. } => "launch",
            Action::Wait { .. } => "wait",
            Action::Assert { .. } => "assert",
            Action::ClickTemplate { .. } => "click_template",
        }
    }

    /// Template referenced by this action, if any
    pub fn template(&self) -> Option<&str> {
        match self {
            Action::Assert { template, .. } | Action::ClickTemplate { template } => {
                Some(template)
            }
            _ => None,
        }
    }

    /// Time the action legitimately takes on the device, on top of its ack timeout
    pub fn nominal_duration(&self) -> Duration {
        match self {
            Action::Wait { duration_ms } => Duration::from_millis(*duration_ms),
            Action::Swipe(gesture) => gesture.duration(),
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { x, y } => write!(f, "click({}, {})", x, y),
            Action::Swipe(g) => write!(
                f,
                "swipe({:?} -> {:?}, {}ms)",
                g.start, g.end, g.duration_ms
            ),
            Action::KeyPress { key } => write!(f, "key_press({})", key),
            Action::Launch { package } => write!(f, "launch({})", package),
            Action::Wait { duration_ms } => write!(f, "wait({}ms)", duration_ms),
            Action::Assert { template, present } => {
                if *present {
                    write!(f, "assert({})", template)
                } else {
                    write!(f, "assert_absent({})", template)
                }
            }
            Action::ClickTemplate { template } => write!(f, "click_template({})", template),
        }
    }
}

/// Action execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Whether the action succeeded
    pub ok: bool,

    /// Action kind
    pub action: String,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// Coordinate actually tapped, for template-driven taps
    pub tapped_at: Option<(u32, u32)>,

    /// Error details (if failed)
    pub error: Option<String>,
}

impl ActionReport {
    /// Create a successful action report
    pub fn success(action: &Action, started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            action: action.kind().to_string(),
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            tapped_at: None,
            error: None,
        }
    }

    pub fn with_tap(mut self, point: (u32, u32)) -> Self {
        self.tapped_at = Some(point);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_capabilities() {
        assert_eq!(
            Action::Click { x: 1, y: 2 }.required_capability(),
            Capability::Tap
        );
        assert_eq!(
            Action::ClickTemplate {
                template: "ok".into()
            }
            .required_capability(),
            Capability::Tap
        );
        assert_eq!(
            Action::Launch {
                package: "com.example".into()
            }
            .required_capability(),
            Capability::AppLaunch
        );
        assert_eq!(
            Action::Wait { duration_ms: 5 }.required_capability(),
            Capability::Wait
        );
    }

    #[test]
    fn test_linear_swipe_progress() {
        let swipe = SwipeGesture::new((0, 0), (100, -100), Duration::from_millis(100));
        assert!((swipe.progress(0.5) - 0.5).abs() < 1e-6);
        assert_eq!(swipe.point_at(0.25), (25, -25));
        assert_eq!(swipe.point_at(1.0), (100, -100));
    }

    #[test]
    fn test_swipe_path_ends_at_target() {
        let swipe = SwipeGesture::new((10, 10), (10, 210), Duration::from_millis(100))
            .with_slopes(2.0, 0.0);
        let path = swipe.path(Duration::from_millis(10));
        assert_eq!(path.len(), 10);
        assert_eq!(path.last(), Some(&(10, 210)));
        // eased motion never moves backwards
        assert!(path.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_ctx_deadline() {
        let ctx = ExecCtx::new(Duration::from_secs(5), CancellationToken::new());
        assert!(!ctx.is_timeout());
        assert!(ctx.remaining_time() <= Duration::from_secs(5));

        let expired = ExecCtx::new(Duration::ZERO, CancellationToken::new());
        assert!(expired.is_timeout());
    }
}
