use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type for primitives that fail to parse or validate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Primitive operation kinds a device backend may support.
///
/// The set is closed: adding a platform operation means adding a variant here
/// and a matching arm in the action dispatcher.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Pointer tap at a coordinate.
    Tap,
    /// Pointer swipe between two coordinates.
    Swipe,
    /// Hardware or soft key event.
    KeyEvent,
    /// Launch an application by package/identifier.
    AppLaunch,
    /// Grab the current screen contents.
    ScreenCapture,
    /// Timed wait; virtual devices may fast-forward instead of sleeping.
    Wait,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Tap,
        Capability::Swipe,
        Capability::KeyEvent,
        Capability::AppLaunch,
        Capability::ScreenCapture,
        Capability::Wait,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Tap => "tap",
            Capability::Swipe => "swipe",
            Capability::KeyEvent => "key_event",
            Capability::AppLaunch => "app_launch",
            Capability::ScreenCapture => "screen_capture",
            Capability::Wait => "wait",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownCapability(s.to_string()))
    }
}

/// A set of [`Capability`] tags.
///
/// Backed by a bitmask so it can be built in `const` context and used as a
/// type-level capability description on controller implementations.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub const fn empty() -> Self {
        Self::EMPTY
    }

    pub const fn all() -> Self {
        let mut set = Self::EMPTY;
        let mut i = 0;
        while i < Capability::ALL.len() {
            set = set.with(Capability::ALL[i]);
            i += 1;
        }
        set
    }

    pub const fn with(self, cap: Capability) -> Self {
        Self(self.0 | cap.bit())
    }

    pub const fn without(self, cap: Capability) -> Self {
        Self(self.0 & !cap.bit())
    }

    pub const fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub const fn is_superset_of(&self, other: &CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersection(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 & other.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, cap: Capability) {
        *self = self.with(cap);
    }

    pub fn remove(&mut self, cap: Capability) {
        *self = self.without(cap);
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |cap| self.contains(*cap))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CapabilitySet::EMPTY, |set, cap| set.with(cap))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|cap| cap.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Identifier of one engine run. Never shared across devices.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
