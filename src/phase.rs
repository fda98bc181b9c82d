//! Traffic light phases and a lock-free cell for sharing them.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The two states a light can show.
///
/// There is no transitional or unknown value; the only transition is
/// [`Phase::toggled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    #[default]
    Red = 0,
    Green = 1,
}

impl Phase {
    /// The complementary phase.
    pub fn toggled(self) -> Self {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Red,
        }
    }

    pub fn is_green(self) -> bool {
        self == Phase::Green
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Red => "red",
            Phase::Green => "green",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Phase::Red,
            _ => Phase::Green,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Phase::Red),
            "green" => Ok(Phase::Green),
            other => Err(Error::Validation(format!("unknown phase: {other:?}"))),
        }
    }
}

/// A [`Phase`] that can be read and written from any thread.
///
/// Backed by a single byte, so a load always sees a whole value written by
/// some `store`. Acquire/Release pairs make the write that published a phase
/// visible together with the phase itself.
#[derive(Debug)]
pub struct AtomicPhase(AtomicU8);

impl AtomicPhase {
    pub fn new(phase: Phase) -> Self {
        Self(AtomicU8::new(phase as u8))
    }

    pub fn load(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, phase: Phase) {
        self.0.store(phase as u8, Ordering::Release);
    }

    /// Flip the phase and return the new value.
    pub fn toggle(&self) -> Phase {
        // XOR with 1 maps Red<->Green and nothing else.
        let prev = self.0.fetch_xor(1, Ordering::AcqRel);
        Phase::from_u8(prev).toggled()
    }
}

impl Default for AtomicPhase {
    fn default() -> Self {
        Self::new(Phase::default())
    }
}
