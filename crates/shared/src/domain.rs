use std::fmt;

use serde::{Deserialize, Serialize};

/// Capslock LED as mirrored into the one-byte shared LED cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedState {
    #[default]
    Off,
    On,
}

impl LedState {
    pub const OFF_BYTE: u8 = 0;
    pub const ON_BYTE: u8 = 1;

    /// Any non-zero cell value reads as `On`.
    pub fn from_byte(value: u8) -> Self {
        if value == Self::OFF_BYTE {
            Self::Off
        } else {
            Self::On
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Off => Self::OFF_BYTE,
            Self::On => Self::ON_BYTE,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    /// Text the keyboard side prints when it observes a transition.
    pub fn notice(self) -> &'static str {
        match self {
            Self::Off => "OFF ",
            Self::On => "ON ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Interrupt,
    Control,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("interrupt"),
            Self::Control => f.write_str("control"),
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
