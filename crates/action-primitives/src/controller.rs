//! Device controller contract

use async_trait::async_trait;
use autoplay_core_types::{Capability, CapabilitySet};
use perceiver_visual::Frame;
use std::time::Duration;

use crate::errors::ControllerError;
use crate::types::{Key, SwipeGesture};

/// Binding of the capability contract to one device backend.
///
/// `CAPABILITIES` is the type-level description of what the backend can do.
/// `capabilities()` is the runtime view and may only narrow it, e.g. a
/// locked-down profile that disables app launch. Operations a backend does not
/// implement keep the default body, which reports `Unsupported`.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    const CAPABILITIES: CapabilitySet;

    /// Runtime capability set
    fn capabilities(&self) -> CapabilitySet {
        Self::CAPABILITIES
    }

    /// Capabilities usable right now: declared by the type and enabled at runtime
    fn effective_capabilities(&self) -> CapabilitySet {
        Self::CAPABILITIES.intersection(&self.capabilities())
    }

    /// Grab the current screen contents
    async fn capture(&self) -> Result<Frame, ControllerError>;

    async fn tap(&self, _x: u32, _y: u32) -> Result<(), ControllerError> {
        Err(ControllerError::Unsupported(Capability::Tap))
    }

    async fn swipe(&self, _gesture: &SwipeGesture) -> Result<(), ControllerError> {
        Err(ControllerError::Unsupported(Capability::Swipe))
    }

    async fn key_event(&self, _key: Key) -> Result<(), ControllerError> {
        Err(ControllerError::Unsupported(Capability::KeyEvent))
    }

    async fn launch_app(&self, _package: &str) -> Result<(), ControllerError> {
        Err(ControllerError::Unsupported(Capability::AppLaunch))
    }

    /// Timed wait; virtual devices may fast-forward instead of sleeping
    async fn wait(&self, duration: Duration) -> Result<(), ControllerError> {
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
