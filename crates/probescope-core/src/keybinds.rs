//! Keybind mappings.
//!
//! Two independent tables are kept: movement keys (continuous adjustments of the
//! active object's pose) and static keys (discrete scene actions). Both map a
//! chord such as `"Shift+a"` to a named intent and are stored as JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProbescopeError, Result};
use crate::input::{KeyEvent, Modifier, Modifiers};

/// A base key plus modifiers, written `Ctrl+Shift+Alt+key`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyChord {
    key: String,
    ctrl: bool,
    shift: bool,
    alt: bool,
}

impl KeyChord {
    /// Creates a chord. Single-character keys are case-folded.
    pub fn new(key: &str, modifiers: Modifiers) -> Self {
        let key = if key.chars().count() == 1 {
            key.to_lowercase()
        } else {
            key.to_string()
        };
        Self {
            key,
            ctrl: modifiers.ctrl,
            shift: modifiers.shift,
            alt: modifiers.alt,
        }
    }

    /// Returns the base key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the modifier state.
    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        Modifiers {
            ctrl: self.ctrl,
            shift: self.shift,
            alt: self.alt,
        }
    }
}

impl FromStr for KeyChord {
    type Err = ProbescopeError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        // "Ctrl++" binds the plus key itself.
        if s.ends_with("++") {
            parts.truncate(parts.len() - 2);
            parts.push("+");
        }
        let key = parts
            .pop()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProbescopeError::InvalidKeybind(format!("'{s}' has no key")))?;
        let mut modifiers = Modifiers::NONE;
        for m in parts {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "shift" => modifiers.shift = true,
                "alt" => modifiers.alt = true,
                other => {
                    return Err(ProbescopeError::InvalidKeybind(format!(
                        "unknown modifier '{other}' in '{s}'"
                    )))
                }
            }
        }
        Ok(Self::new(key, modifiers))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        f.write_str(&self.key)
    }
}

impl TryFrom<String> for KeyChord {
    type Error = ProbescopeError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<KeyChord> for String {
    fn from(c: KeyChord) -> Self {
        c.to_string()
    }
}

/// What a movement key does to the active object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementIntent {
    /// World -ML.
    Left,
    /// World +ML.
    Right,
    /// World +DV.
    Dorsal,
    /// World -DV.
    Ventral,
    /// World +AP.
    Anterior,
    /// World -AP.
    Posterior,
    /// Drive toward the tip along the shank axis.
    Advance,
    /// Withdraw along the shank axis.
    Retract,
    /// Increase elevation.
    TiltUp,
    /// Decrease elevation.
    TiltDown,
    /// Increase spin.
    SpinLeft,
    /// Decrease spin.
    SpinRight,
    /// Increase azimuth.
    RotateLeft,
    /// Decrease azimuth.
    RotateRight,
}

/// A movement intent with its base step (micrometers or degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementBinding {
    pub intent: MovementIntent,
    pub step: f64,
}

/// A discrete scene action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticAction {
    NextObject,
    PreviousObject,
    DeleteObject,
    Home,
}

/// The movement keybind table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementKeybinds {
    /// Modifier that selects the fine step.
    pub fine_modifier: Modifier,
    /// Factor applied to the base step when the fine modifier is held.
    pub fine_factor: f64,
    pub bindings: BTreeMap<KeyChord, MovementBinding>,
}

impl MovementKeybinds {
    /// Checks the table for settings that cannot be honoured.
    pub fn validate(&self) -> Result<()> {
        if !(self.fine_factor > 0.0 && self.fine_factor < 1.0) {
            return Err(ProbescopeError::InvalidKeybind(format!(
                "fine_factor must be in (0, 1), got {}",
                self.fine_factor
            )));
        }
        if self.fine_modifier == Modifier::Shift {
            return Err(ProbescopeError::InvalidKeybind(
                "shift selects alternate intents and cannot be the fine modifier".into(),
            ));
        }
        if let Some((chord, _)) = self
            .bindings
            .iter()
            .find(|(c, _)| c.modifiers().contains(self.fine_modifier))
        {
            return Err(ProbescopeError::InvalidKeybind(format!(
                "'{chord}' includes the fine modifier"
            )));
        }
        if let Some((chord, b)) = self.bindings.iter().find(|(_, b)| !b.step.is_finite()) {
            return Err(ProbescopeError::InvalidKeybind(format!(
                "'{chord}' has step {}",
                b.step
            )));
        }
        Ok(())
    }

    /// Resolves a key press into an intent and a scaled step.
    ///
    /// The fine modifier is stripped before lookup and scales the bound step;
    /// shift is part of the chord. Returns `None` for unmapped keys.
    #[must_use]
    pub fn resolve(&self, event: &KeyEvent) -> Option<MovementBinding> {
        let fine = event.modifiers.contains(self.fine_modifier);
        let chord = KeyChord::new(&event.key, event.modifiers.without(self.fine_modifier));
        let binding = self.bindings.get(&chord)?;
        let step = if fine {
            binding.step * self.fine_factor
        } else {
            binding.step
        };
        Some(MovementBinding {
            intent: binding.intent,
            step,
        })
    }
}

impl Default for MovementKeybinds {
    fn default() -> Self {
        use MovementIntent::{
            Advance, Anterior, Dorsal, Left, Posterior, Retract, Right, RotateLeft, RotateRight,
            SpinLeft, SpinRight, TiltDown, TiltUp, Ventral,
        };
        let table: [(&str, MovementIntent, f64); 14] = [
            ("a", Left, 100.0),
            ("d", Right, 100.0),
            ("f", Dorsal, 100.0),
            ("c", Ventral, 100.0),
            ("w", Anterior, 100.0),
            ("s", Posterior, 100.0),
            ("Shift+a", RotateLeft, 5.0),
            ("Shift+d", RotateRight, 5.0),
            ("Shift+w", TiltDown, 5.0),
            ("Shift+s", TiltUp, 5.0),
            ("q", SpinLeft, 5.0),
            ("e", SpinRight, 5.0),
            ("Shift+f", Retract, 100.0),
            ("Shift+c", Advance, 100.0),
        ];
        let bindings = table
            .into_iter()
            .filter_map(|(chord, intent, step)| {
                chord
                    .parse::<KeyChord>()
                    .ok()
                    .map(|c| (c, MovementBinding { intent, step }))
            })
            .collect();
        Self {
            fine_modifier: Modifier::Ctrl,
            fine_factor: 0.1,
            bindings,
        }
    }
}

/// The static keybind table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticKeybinds {
    pub bindings: BTreeMap<KeyChord, StaticAction>,
}

impl StaticKeybinds {
    /// Resolves a key press exactly, modifiers included.
    #[must_use]
    pub fn resolve(&self, event: &KeyEvent) -> Option<StaticAction> {
        self.bindings
            .get(&KeyChord::new(&event.key, event.modifiers))
            .copied()
    }
}

impl Default for StaticKeybinds {
    fn default() -> Self {
        let bindings = [
            ("n", StaticAction::NextObject),
            ("p", StaticAction::PreviousObject),
            ("Delete", StaticAction::DeleteObject),
            ("h", StaticAction::Home),
        ]
        .into_iter()
        .filter_map(|(chord, action)| chord.parse::<KeyChord>().ok().map(|c| (c, action)))
        .collect();
        Self { bindings }
    }
}
