use std::borrow::Cow;

use super::{EventCode, EventPacket, HANDLE_MASK, link_type, read_address, read_u16, status};
use crate::{Address, Error, Label, Result};

/// Connection Complete event parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionComplete {
    pub status: u8,
    pub handle: u16,
    pub address: Address,
    pub link_type: u8,
    pub encryption_enabled: bool,
}

impl ConnectionComplete {
    const LEN: usize = 11;

    pub fn is_success(&self) -> bool {
        self.status == status::SUCCESS
    }
}

impl Default for ConnectionComplete {
    fn default() -> Self {
        Self {
            status: status::SUCCESS,
            handle: 0,
            address: Address::default(),
            link_type: link_type::ACL,
            encryption_enabled: false,
        }
    }
}

/// Connection Request event parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionRequest {
    pub address: Address,
    pub class_of_device: [u8; 3],
    pub link_type: u8,
}

impl ConnectionRequest {
    const LEN: usize = 10;
}

/// Disconnection Complete event parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisconnectionComplete {
    pub status: u8,
    pub handle: u16,
    pub reason: u8,
}

impl DisconnectionComplete {
    const LEN: usize = 4;
}

/// A decoded HCI event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HciEvent {
    ConnectionComplete(ConnectionComplete),
    ConnectionRequest(ConnectionRequest),
    DisconnectionComplete(DisconnectionComplete),
    Other { code: u8, parameters: Vec<u8> },
}

impl HciEvent {
    pub(crate) fn parse(code: EventCode, p: &[u8]) -> Result<Self> {
        let expect = |len: usize| {
            if p.len() < len {
                Err(Error::malformed(format!(
                    "{code} needs {len} parameter bytes, got {}",
                    p.len()
                )))
            } else {
                Ok(())
            }
        };
        let event = match code {
            EventCode::ConnectionComplete => {
                expect(ConnectionComplete::LEN)?;
                HciEvent::ConnectionComplete(ConnectionComplete {
                    status: p[0],
                    handle: read_u16(p, 1) & HANDLE_MASK,
                    address: read_address(p, 3),
                    link_type: p[9],
                    encryption_enabled: p[10] != 0,
                })
            }
            EventCode::ConnectionRequest => {
                expect(ConnectionRequest::LEN)?;
                HciEvent::ConnectionRequest(ConnectionRequest {
                    address: read_address(p, 0),
                    class_of_device: [p[6], p[7], p[8]],
                    link_type: p[9],
                })
            }
            EventCode::DisconnectionComplete => {
                expect(DisconnectionComplete::LEN)?;
                HciEvent::DisconnectionComplete(DisconnectionComplete {
                    status: p[0],
                    handle: read_u16(p, 1) & HANDLE_MASK,
                    reason: p[3],
                })
            }
            EventCode::Other(code) => HciEvent::Other {
                code,
                parameters: p.to_vec(),
            },
        };
        Ok(event)
    }

    pub fn code(&self) -> EventCode {
        match self {
            HciEvent::ConnectionComplete(_) => EventCode::ConnectionComplete,
            HciEvent::ConnectionRequest(_) => EventCode::ConnectionRequest,
            HciEvent::DisconnectionComplete(_) => EventCode::DisconnectionComplete,
            HciEvent::Other { code, .. } => EventCode::from(*code),
        }
    }

    /// Encode this event as a raw packet.
    pub fn to_packet(&self) -> Result<EventPacket> {
        let mut p = Vec::new();
        match self {
            HciEvent::ConnectionComplete(e) => {
                p.push(e.status);
                p.extend_from_slice(&(e.handle & HANDLE_MASK).to_le_bytes());
                p.extend_from_slice(&e.address.to_le_bytes());
                p.push(e.link_type);
                p.push(u8::from(e.encryption_enabled));
            }
            HciEvent::ConnectionRequest(e) => {
                p.extend_from_slice(&e.address.to_le_bytes());
                p.extend_from_slice(&e.class_of_device);
                p.push(e.link_type);
            }
            HciEvent::DisconnectionComplete(e) => {
                p.push(e.status);
                p.extend_from_slice(&(e.handle & HANDLE_MASK).to_le_bytes());
                p.push(e.reason);
            }
            HciEvent::Other { parameters, .. } => p.extend_from_slice(parameters),
        }
        EventPacket::from_parts(self.code(), &p)
    }
}

impl Label for HciEvent {
    fn label(&self) -> Cow<'static, str> {
        self.code().label()
    }
}
