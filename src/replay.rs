//! Virtual device replaying a recorded sequence of screens
//!
//! Frames come from a directory of PNG files taken in file-name order.
//! Capture returns the current frame; every acknowledged input moves to the
//! next one and stays on the last.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use action_primitives::{Action, Controller, ControllerError, Key, SwipeGesture};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use autoplay_core_types::CapabilitySet;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use perceiver_visual::Frame;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Pointer sampling interval used when replaying swipes
const SWIPE_SAMPLE: Duration = Duration::from_millis(16);

/// One input received by the replay device
#[derive(Debug, Clone, Serialize)]
pub struct RecordedAction {
    /// Frame on screen when the input arrived
    pub frame: usize,
    pub action: String,
    pub at: DateTime<Utc>,
}

pub struct ReplayController {
    frames: Vec<Arc<DynamicImage>>,
    cursor: AtomicUsize,
    capabilities: CapabilitySet,
    recorded: Mutex<Vec<RecordedAction>>,
}

impl ReplayController {
    pub fn from_frames(frames: Vec<DynamicImage>) -> Result<Self> {
        if frames.is_empty() {
            bail!("replay needs at least one frame");
        }
        Ok(Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
            capabilities: CapabilitySet::all(),
            recorded: Mutex::new(Vec::new()),
        })
    }

    /// Load every `.png` in `dir`, sorted by file name
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        paths.sort();

        let frames = paths
            .iter()
            .map(|path| {
                image::open(path).with_context(|| format!("Failed to decode {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(dir = %dir.display(), frames = frames.len(), "replay frames loaded");
        Self::from_frames(frames)
            .with_context(|| format!("No PNG frames in {}", dir.display()))
    }

    /// Narrow the runtime capability set to emulate a locked-down device
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Index of the frame currently on screen
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub async fn recorded(&self) -> Vec<RecordedAction> {
        self.recorded.lock().await.clone()
    }

    async fn record(&self, action: String, advance: bool) {
        let frame = if advance {
            let last = self.frames.len() - 1;
            self.cursor
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |at| Some((at + 1).min(last)))
                .unwrap_or_else(|at| at)
        } else {
            self.position()
        };
        debug!(action = %action, frame, next = self.position(), "replay input");
        self.recorded.lock().await.push(RecordedAction {
            frame,
            action,
            at: Utc::now(),
        });
    }
}

#[async_trait]
impl Controller for ReplayController {
    const CAPABILITIES: CapabilitySet = CapabilitySet::all();

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    async fn capture(&self) -> Result<Frame, ControllerError> {
        let at = self.position();
        let image = self
            .frames
            .get(at)
            .ok_or_else(|| ControllerError::Io(format!("frame {} missing", at)))?;
        Ok(Frame {
            id: format!("replay-{}-{}", at, uuid::Uuid::new_v4()),
            image: Arc::clone(image),
            timestamp: SystemTime::now(),
        })
    }

    async fn tap(&self, x: u32, y: u32) -> Result<(), ControllerError> {
        self.record(Action::Click { x, y }.to_string(), true).await;
        Ok(())
    }

    async fn swipe(&self, gesture: &SwipeGesture) -> Result<(), ControllerError> {
        let path = gesture.path(SWIPE_SAMPLE);
        debug!(points = path.len(), end = ?path.last(), "replaying swipe");
        self.record(Action::Swipe(*gesture).to_string(), true).await;
        Ok(())
    }

    async fn key_event(&self, key: Key) -> Result<(), ControllerError> {
        self.record(Action::KeyPress { key }.to_string(), true).await;
        Ok(())
    }

    async fn launch_app(&self, package: &str) -> Result<(), ControllerError> {
        let action = Action::Launch {
            package: package.to_string(),
        };
        self.record(action.to_string(), true).await;
        Ok(())
    }

    /// Recorded time does not pass on a replay
    async fn wait(&self, duration: Duration) -> Result<(), ControllerError> {
        let action = Action::Wait {
            duration_ms: duration.as_millis() as u64,
        };
        self.record(action.to_string(), false).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoplay_core_types::Capability;
    use image::{GrayImage, Luma};

    fn gray(level: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([level])))
    }

    fn level(frame: &Frame) -> u8 {
        frame.image.to_luma8().get_pixel(0, 0)[0]
    }

    #[tokio::test]
    async fn test_inputs_advance_and_clamp() {
        let replay = ReplayController::from_frames(vec![gray(1), gray(2)]).unwrap();

        assert_eq!(level(&replay.capture().await.unwrap()), 1);
        replay.tap(5, 5).await.unwrap();
        assert_eq!(level(&replay.capture().await.unwrap()), 2);
        replay.key_event(Key::Back).await.unwrap();
        assert_eq!(replay.position(), 1);

        let recorded = replay.recorded().await;
        let actions: Vec<_> = recorded.iter().map(|r| (r.frame, r.action.as_str())).collect();
        assert_eq!(actions, vec![(0, "click(5, 5)"), (1, "key_press(back)")]);
    }

    #[tokio::test]
    async fn test_wait_does_not_advance() {
        let replay = ReplayController::from_frames(vec![gray(1), gray(2)]).unwrap();
        replay.wait(Duration::from_secs(30)).await.unwrap();
        assert_eq!(replay.position(), 0);
        assert_eq!(replay.recorded().await.len(), 1);
    }

    #[test]
    fn test_narrowed_capabilities() {
        let replay = ReplayController::from_frames(vec![gray(1)])
            .unwrap()
            .with_capabilities(CapabilitySet::all().without(Capability::AppLaunch));
        let effective = replay.effective_capabilities();
        assert!(!effective.contains(Capability::AppLaunch));
        assert!(effective.contains(Capability::Tap));
    }

    #[test]
    fn test_empty_replay_is_rejected() {
        assert!(ReplayController::from_frames(Vec::new()).is_err());
    }
}
