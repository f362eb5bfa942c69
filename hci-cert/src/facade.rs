use std::future::Future;

use crate::{
    Address, EventSource, Result,
    hci::{AclData, EventPacket},
};

/// Outbound connection request as carried to the transport.
///
/// `address` holds the canonical text form of the peer address
/// (`"AA:BB:CC:DD:EE:FF"` as UTF-8), whatever form the caller used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionMsg {
    pub address: Vec<u8>,
}

impl ConnectionMsg {
    pub fn new(address: Address) -> Self {
        Self {
            address: address.to_string().into_bytes(),
        }
    }

    /// Decode the carried address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`](crate::Error::InvalidAddress) if the
    /// bytes are not a valid address.
    pub fn address(&self) -> Result<Address> {
        Address::try_from(self.address.as_slice())
    }
}

impl From<Address> for ConnectionMsg {
    fn from(address: Address) -> Self {
        Self::new(address)
    }
}

/// The ACL manager surface of a device under test or a certification peer.
///
/// This is the seam between the harness and whatever actually talks to a
/// controller: an RPC client, a socket, or the in-process
/// [`SimController`](crate::sim::SimController).
///
/// Stream-returning calls hand back a live [`EventSource`]; the harness wraps
/// it in an [`EventStream`](crate::EventStream) and drops it when the stream
/// is closed. None of the calls wait for the peer to react.
///
/// Methods return futures but can be implemented as `async fn` directly.
pub trait AclFacade: Send + Sync + 'static {
    /// Subscribe to incoming connection lifecycle events
    /// (ConnectionRequest, ConnectionComplete, DisconnectionComplete).
    fn fetch_incoming_connection(
        &self,
    ) -> impl Future<Output = Result<EventSource<EventPacket>>> + Send;

    /// Start connecting to `msg.address`, returning the lifecycle events of
    /// the new link.
    fn create_connection(
        &self,
        msg: ConnectionMsg,
    ) -> impl Future<Output = Result<EventSource<EventPacket>>> + Send;

    /// Subscribe to data received on `handle`.
    fn fetch_acl_data(&self, handle: u16)
    -> impl Future<Output = Result<EventSource<AclData>>> + Send;

    /// Submit an encoded HCI command for an existing connection.
    fn connection_command(&self, packet: Vec<u8>) -> impl Future<Output = Result> + Send;

    /// Queue `data` for delivery on its connection.
    fn send_acl_data(&self, data: AclData) -> impl Future<Output = Result> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_canonical_text() {
        let address: Address = "00:11:22:aa:bb:cc".parse().unwrap();
        let msg = ConnectionMsg::new(address);
        assert_eq!(msg.address, b"00:11:22:AA:BB:CC".to_vec());
        assert_eq!(msg.address(), Ok(address));
    }
}
