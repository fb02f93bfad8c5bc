//! Byte alphabet spoken over the event, command and acknowledgement streams.

pub const NO_EVENT: u8 = b'#';
pub const CAPSLOCK_PRESS: u8 = b'@';
pub const CAPSLOCK_RELEASE: u8 = b'&';
pub const END_OF_INPUT: u8 = b'$';

pub const LED_COMMAND: u8 = b'C';
pub const LED_ACK: u8 = b'A';

pub const RUNNING: u8 = 0;
pub const TERMINATED: u8 = 1;

/// One decoded unit from the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    NoEvent,
    CapsLockPress,
    CapsLockRelease,
    EndOfInput,
    Char(u8),
}

impl Token {
    /// Out-of-alphabet bytes are literal characters, never errors.
    pub fn decode(byte: u8) -> Self {
        match byte {
            NO_EVENT => Self::NoEvent,
            CAPSLOCK_PRESS => Self::CapsLockPress,
            CAPSLOCK_RELEASE => Self::CapsLockRelease,
            END_OF_INPUT => Self::EndOfInput,
            other => Self::Char(other),
        }
    }

    pub fn is_capslock(self) -> bool {
        matches!(self, Self::CapsLockPress | Self::CapsLockRelease)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    LedChanged,
    Unknown(u8),
}

impl ControlCommand {
    pub fn decode(byte: u8) -> Self {
        match byte {
            LED_COMMAND => Self::LedChanged,
            other => Self::Unknown(other),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
