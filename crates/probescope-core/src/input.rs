//! Input delivered by the renderer: key presses and object picks.

use serde::{Deserialize, Serialize};

use crate::events::ObjectId;

/// A modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

/// Modifier state at the time of a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    /// No modifiers held.
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
    };

    /// Only shift held.
    pub const SHIFT: Self = Self {
        ctrl: false,
        shift: true,
        alt: false,
    };

    /// Only ctrl held.
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
        alt: false,
    };

    /// Returns true if `m` is held.
    #[must_use]
    pub fn contains(self, m: Modifier) -> bool {
        match m {
            Modifier::Ctrl => self.ctrl,
            Modifier::Shift => self.shift,
            Modifier::Alt => self.alt,
        }
    }

    /// Returns a copy with `m` released.
    #[must_use]
    pub fn without(mut self, m: Modifier) -> Self {
        match m {
            Modifier::Ctrl => self.ctrl = false,
            Modifier::Shift => self.shift = false,
            Modifier::Alt => self.alt = false,
        }
        self
    }
}

/// A key-down event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Base key name, e.g. `"a"` or `"Delete"`.
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Creates a key event.
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    /// A key press without modifiers.
    pub fn plain(key: impl Into<String>) -> Self {
        Self::new(key, Modifiers::NONE)
    }
}

/// The renderer reports that the user picked a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickEvent {
    pub object: ObjectId,
}
