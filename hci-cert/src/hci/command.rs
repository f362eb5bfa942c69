use super::{HANDLE_MASK, read_u16};
use crate::{Error, Result};

/// Reasons a host may give when requesting a disconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DisconnectReason {
    AuthenticationFailure = 0x05,
    RemoteUserTerminatedConnection = 0x13,
    RemoteDeviceTerminatedLowResources = 0x14,
    RemoteDeviceTerminatedPowerOff = 0x15,
    UnsupportedRemoteFeature = 0x1a,
    PairingWithUnitKeyNotSupported = 0x29,
    UnacceptableConnectionParameters = 0x3b,
}

impl From<DisconnectReason> for u8 {
    fn from(reason: DisconnectReason) -> Self {
        reason as u8
    }
}

impl TryFrom<u8> for DisconnectReason {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use DisconnectReason::*;
        Ok(match code {
            0x05 => AuthenticationFailure,
            0x13 => RemoteUserTerminatedConnection,
            0x14 => RemoteDeviceTerminatedLowResources,
            0x15 => RemoteDeviceTerminatedPowerOff,
            0x1a => UnsupportedRemoteFeature,
            0x29 => PairingWithUnitKeyNotSupported,
            0x3b => UnacceptableConnectionParameters,
            other => {
                return Err(Error::malformed(format!(
                    "{other:#04x} is not a disconnect reason"
                )));
            }
        })
    }
}

/// The HCI `Disconnect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Disconnect {
    pub handle: u16,
    pub reason: u8,
}

impl Disconnect {
    /// OGF 0x01 (link control), OCF 0x0006.
    pub const OPCODE: u16 = 0x0406;

    pub fn new(handle: u16, reason: impl Into<u8>) -> Self {
        Self {
            handle,
            reason: reason.into(),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6);
        bytes.extend_from_slice(&Self::OPCODE.to_le_bytes());
        bytes.push(3);
        bytes.extend_from_slice(&(self.handle & HANDLE_MASK).to_le_bytes());
        bytes.push(self.reason);
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let opcode = command_opcode(bytes)?;
        if opcode != Self::OPCODE {
            return Err(Error::UnsupportedCommand(opcode));
        }
        if bytes.len() != 6 || bytes[2] != 3 {
            return Err(Error::malformed("Disconnect carries exactly 3 parameter bytes"));
        }
        Ok(Self {
            handle: read_u16(bytes, 3) & HANDLE_MASK,
            reason: bytes[5],
        })
    }
}

/// Read the opcode of a serialized command packet.
pub fn command_opcode(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < 3 {
        return Err(Error::malformed("command packet shorter than its header"));
    }
    Ok(read_u16(bytes, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_wire_layout() {
        let bytes = Disconnect::new(0x0042, DisconnectReason::RemoteUserTerminatedConnection).serialize();
        assert_eq!(bytes, vec![0x06, 0x04, 0x03, 0x42, 0x00, 0x13]);
        assert_eq!(
            Disconnect::parse(&bytes).unwrap(),
            Disconnect {
                handle: 0x0042,
                reason: 0x13
            }
        );
    }

    #[test]
    fn other_opcodes_are_unsupported() {
        // HCI_Reset
        let reset = [0x03, 0x0c, 0x00];
        assert_eq!(Disconnect::parse(&reset), Err(Error::UnsupportedCommand(0x0c03)));
        assert!(command_opcode(&[0x03]).is_err());
    }

    #[test]
    fn reasons_convert_from_codes() {
        assert_eq!(
            DisconnectReason::try_from(0x13).unwrap(),
            DisconnectReason::RemoteUserTerminatedConnection
        );
        assert!(DisconnectReason::try_from(0x16).is_err());
        assert_eq!(u8::from(DisconnectReason::UnacceptableConnectionParameters), 0x3b);
    }
}
