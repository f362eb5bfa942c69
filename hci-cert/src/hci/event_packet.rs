use std::{borrow::Cow, fmt};

use super::{EventCode, HciEvent};
use crate::{Error, Label, Result};

/// A raw HCI event packet: event code, parameter length, parameters.
///
/// This is the unit carried by connection lifecycle streams. The header is
/// validated on construction; parameters are decoded lazily by
/// [`decode`](Self::decode) so that events the harness does not model still
/// flow through streams as noise.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EventPacket(Vec<u8>);

impl EventPacket {
    /// Wrap raw bytes, checking the two-byte header against the body length.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < 2 {
            return Err(Error::malformed("event packet shorter than its header"));
        }
        if bytes[1] as usize != bytes.len() - 2 {
            return Err(Error::malformed(format!(
                "event parameter length {} does not match body of {} bytes",
                bytes[1],
                bytes.len() - 2
            )));
        }
        Ok(Self(bytes))
    }

    /// Build a packet from an event code and its parameters.
    ///
    /// Parameters longer than 255 bytes cannot be expressed in the header and
    /// are rejected.
    pub fn from_parts(code: EventCode, parameters: &[u8]) -> Result<Self> {
        let len = u8::try_from(parameters.len())
            .map_err(|_| Error::malformed("event parameters exceed 255 bytes"))?;
        let mut bytes = Vec::with_capacity(parameters.len() + 2);
        bytes.push(code.into());
        bytes.push(len);
        bytes.extend_from_slice(parameters);
        Ok(Self(bytes))
    }

    #[inline]
    pub fn code(&self) -> EventCode {
        EventCode::from(self.0[0])
    }

    #[inline]
    pub fn parameters(&self) -> &[u8] {
        &self.0[2..]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Decode the parameters according to the event code.
    pub fn decode(&self) -> Result<HciEvent> {
        HciEvent::parse(self.code(), self.parameters())
    }
}

impl Label for EventPacket {
    fn label(&self) -> Cow<'static, str> {
        self.code().label()
    }
}

impl fmt::Debug for EventPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.code())?;
        for (i, byte) in self.parameters().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        f.write_str("]")
    }
}

impl TryFrom<Vec<u8>> for EventPacket {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_length_is_validated() {
        assert!(EventPacket::new(vec![0x05]).is_err());
        assert!(EventPacket::new(vec![0x05, 0x04, 0x00]).is_err());

        let packet = EventPacket::new(vec![0x05, 0x04, 0x00, 0x01, 0x00, 0x13]).unwrap();
        assert_eq!(packet.code(), EventCode::DisconnectionComplete);
        assert_eq!(packet.parameters(), &[0x00, 0x01, 0x00, 0x13]);
    }

    #[test]
    fn debug_shows_label_and_hex_parameters() {
        let packet = EventPacket::from_parts(EventCode::Other(0x0e), &[0x01, 0xab]).unwrap();
        assert_eq!(format!("{packet:?}"), "Event(0x0e)[01 ab]");
    }

    #[test]
    fn oversized_parameters_are_rejected() {
        let parameters = vec![0u8; 256];
        assert!(EventPacket::from_parts(EventCode::Other(0xff), &parameters).is_err());
    }
}
