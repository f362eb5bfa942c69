use std::{borrow::Cow, fmt};

use crate::Label;

/// The discriminant of an HCI event packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventCode {
    ConnectionComplete,
    ConnectionRequest,
    DisconnectionComplete,
    Other(u8),
}

impl From<u8> for EventCode {
    fn from(code: u8) -> Self {
        match code {
            0x03 => EventCode::ConnectionComplete,
            0x04 => EventCode::ConnectionRequest,
            0x05 => EventCode::DisconnectionComplete,
            other => EventCode::Other(other),
        }
    }
}

impl From<EventCode> for u8 {
    fn from(code: EventCode) -> Self {
        match code {
            EventCode::ConnectionComplete => 0x03,
            EventCode::ConnectionRequest => 0x04,
            EventCode::DisconnectionComplete => 0x05,
            EventCode::Other(other) => other,
        }
    }
}

impl Label for EventCode {
    fn label(&self) -> Cow<'static, str> {
        match self {
            EventCode::ConnectionComplete => Cow::Borrowed("ConnectionComplete"),
            EventCode::ConnectionRequest => Cow::Borrowed("ConnectionRequest"),
            EventCode::DisconnectionComplete => Cow::Borrowed("DisconnectionComplete"),
            EventCode::Other(code) => Cow::Owned(format!("Event({code:#04x})")),
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
