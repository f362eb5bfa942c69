use std::{fmt, sync::Arc};

use crate::{
    AclFacade, Address, Config, EventStream, Observable, Result,
    hci::{AclData, Disconnect, EventPacket},
    testing::{HciCaptures, assert_that},
};

/// One established ACL link.
///
/// Created by [`AclManager::complete_incoming`](crate::AclManager::complete_incoming)
/// or [`complete_outgoing`](crate::AclManager::complete_outgoing). Owns two
/// streams: the lifecycle stream the link was established on, kept for
/// [`wait_for_disconnection_complete`](Self::wait_for_disconnection_complete),
/// and a private data stream for payloads received on its handle.
///
/// A remote disconnect does not close the connection; the scenario observes
/// it explicitly. Both streams are released by [`close`](Self::close) or on
/// drop.
///
/// Assertions on a connection run against its data stream, with the
/// `emits` and `emits_none` deadlines of the manager's [`Config`]:
///
/// ```ignore
/// assert_that(&mut connection)
///     .emits(Matcher::payload_contains(b"hello"))
///     .await?;
/// ```
pub struct AclConnection<F> {
    facade: Arc<F>,
    handle: u16,
    address: Address,
    events: EventStream<EventPacket>,
    data: EventStream<AclData>,
    config: Config,
    disconnect_reason: Option<u8>,
    closed: bool,
}

impl<F: AclFacade> AclConnection<F> {
    pub(crate) async fn open(
        facade: Arc<F>,
        handle: u16,
        address: Address,
        events: EventStream<EventPacket>,
        config: Config,
    ) -> Result<Self> {
        let source = facade.fetch_acl_data(handle).await?;
        let data = EventStream::open(format!("acl data {handle:#05x}"), source);
        tracing::info!(handle = %format_args!("{handle:#05x}"), %address, "connection established");
        Ok(Self {
            facade,
            handle,
            address,
            events,
            data,
            config,
            disconnect_reason: None,
            closed: false,
        })
    }

    /// Queue `payload` for delivery to the peer. Does not wait for
    /// acknowledgement.
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> Result {
        let data = AclData::new(self.handle, payload);
        tracing::trace!(handle = self.handle, len = data.payload.len(), "send");
        self.facade.send_acl_data(data).await
    }

    /// Request disconnection with `reason`. Does not wait for completion.
    pub async fn disconnect(&self, reason: impl Into<u8>) -> Result {
        let command = Disconnect::new(self.handle, reason);
        tracing::debug!(
            handle = self.handle,
            reason = %format_args!("{:#04x}", command.reason),
            "disconnect requested"
        );
        self.facade.connection_command(command.serialize()).await
    }

    /// Wait on the lifecycle stream for Disconnection Complete and return
    /// its reason code, which is also kept as
    /// [`disconnect_reason`](Self::disconnect_reason).
    ///
    /// Uses the configured disconnection timeout.
    pub async fn wait_for_disconnection_complete(&mut self) -> Result<u8> {
        let mut complete = HciCaptures::disconnection_complete();
        assert_that(&mut self.events)
            .emits(&mut complete)
            .within(self.config.disconnection_timeout())
            .await?;
        let reason = complete.take()?.reason;
        self.disconnect_reason = Some(reason);
        tracing::info!(
            handle = self.handle,
            address = %self.address,
            reason = %format_args!("{reason:#04x}"),
            "disconnected"
        );
        Ok(reason)
    }
}

impl<F> AclConnection<F> {
    #[inline]
    pub fn handle(&self) -> u16 {
        self.handle
    }

    /// The peer address.
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Reason reported by the last observed Disconnection Complete.
    #[inline]
    pub fn disconnect_reason(&self) -> Option<u8> {
        self.disconnect_reason
    }

    /// The private stream of payloads received on this handle.
    pub fn data_stream(&mut self) -> &mut EventStream<AclData> {
        &mut self.data
    }

    /// The lifecycle stream this connection was established on.
    pub fn connection_events(&mut self) -> &mut EventStream<EventPacket> {
        &mut self.events
    }

    /// Release both streams. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        self.data.close();
        tracing::debug!(handle = self.handle, "connection closed");
    }
}

impl<F> Observable for AclConnection<F> {
    type Event = AclData;

    fn event_stream(&mut self) -> &mut EventStream<AclData> {
        &mut self.data
    }

    fn config(&self) -> Option<&Config> {
        Some(&self.config)
    }
}

impl<F> Drop for AclConnection<F> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<F> fmt::Debug for AclConnection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclConnection")
            .field("handle", &format_args!("{:#05x}", self.handle))
            .field("address", &self.address)
            .field("disconnect_reason", &self.disconnect_reason)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use futures_util::{StreamExt, stream};

    use super::*;
    use crate::{
        Error, EventSource, facade::ConnectionMsg,
        hci::{DisconnectReason, DisconnectionComplete, HciEvent},
        testing::Matcher,
    };

    const PEER: Address = Address::new([0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]);

    #[derive(Default)]
    struct Loopback {
        commands: Mutex<Vec<Vec<u8>>>,
        sent: Mutex<Vec<AclData>>,
    }

    impl AclFacade for Loopback {
        async fn fetch_incoming_connection(&self) -> Result<EventSource<EventPacket>> {
            Ok(stream::pending().boxed())
        }

        async fn create_connection(&self, _msg: ConnectionMsg) -> Result<EventSource<EventPacket>> {
            Ok(stream::pending().boxed())
        }

        async fn fetch_acl_data(&self, handle: u16) -> Result<EventSource<AclData>> {
            // Echo whatever was sent before the data stream was fetched.
            let sent: Vec<_> = self.sent.lock().unwrap().clone();
            let echoed = sent.into_iter().map(move |d| AclData::new(handle, d.payload));
            Ok(stream::iter(echoed).chain(stream::pending()).boxed())
        }

        async fn connection_command(&self, packet: Vec<u8>) -> Result {
            self.commands.lock().unwrap().push(packet);
            Ok(())
        }

        async fn send_acl_data(&self, data: AclData) -> Result {
            self.sent.lock().unwrap().push(data);
            Ok(())
        }
    }

    fn disconnection(reason: u8) -> EventPacket {
        HciEvent::DisconnectionComplete(DisconnectionComplete {
            status: 0,
            handle: 0x001,
            reason,
        })
        .to_packet()
        .unwrap()
    }

    async fn connection(
        facade: Arc<Loopback>,
        lifecycle: Vec<EventPacket>,
    ) -> AclConnection<Loopback> {
        let config = Config::default().with_disconnection_timeout(Duration::from_millis(100));
        let events = EventStream::open("lifecycle", stream::iter(lifecycle).chain(stream::pending()).boxed());
        AclConnection::open(facade, 0x001, PEER, events, config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn send_goes_to_the_transport_with_the_handle() {
        let facade = Arc::new(Loopback::default());
        let connection = connection(facade.clone(), vec![]).await;
        connection.send(b"hello".to_vec()).await.unwrap();
        assert_eq!(
            *facade.sent.lock().unwrap(),
            vec![AclData::new(0x001, b"hello".to_vec())]
        );
    }

    #[tokio::test]
    async fn disconnect_encodes_the_command() {
        let facade = Arc::new(Loopback::default());
        let connection = connection(facade.clone(), vec![]).await;
        connection
            .disconnect(DisconnectReason::RemoteUserTerminatedConnection)
            .await
            .unwrap();
        assert_eq!(
            *facade.commands.lock().unwrap(),
            vec![vec![0x06, 0x04, 0x03, 0x01, 0x00, 0x13]]
        );
    }

    #[tokio::test]
    async fn records_disconnection_reason() {
        let facade = Arc::new(Loopback::default());
        let mut connection = connection(facade, vec![disconnection(0x16)]).await;
        assert_eq!(connection.disconnect_reason(), None);
        assert_eq!(connection.wait_for_disconnection_complete().await, Ok(0x16));
        assert_eq!(connection.disconnect_reason(), Some(0x16));
    }

    #[tokio::test]
    async fn missing_disconnection_times_out() {
        let facade = Arc::new(Loopback::default());
        let mut connection = connection(facade, vec![]).await;
        let err = connection.wait_for_disconnection_complete().await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert_eq!(connection.disconnect_reason(), None);
    }

    #[tokio::test]
    async fn data_stream_is_observable() {
        let facade = Arc::new(Loopback::default());
        facade
            .send_acl_data(AclData::new(0x001, b"early".to_vec()))
            .await
            .unwrap();
        let mut connection = connection(facade, vec![]).await;
        assert_that(&mut connection)
            .emits(Matcher::payload_contains(b"early".to_vec()))
            .within(Duration::from_millis(200))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn assertions_take_deadlines_from_the_config() {
        let config = Config::default()
            .with_emits_timeout(Duration::from_millis(50))
            .with_emits_none_timeout(Duration::from_millis(30));
        let events = EventStream::open("lifecycle", stream::pending().boxed());
        let mut connection = AclConnection::open(Arc::new(Loopback::default()), 0x001, PEER, events, config)
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let err = assert_that(&mut connection).emits(Matcher::any()).await.unwrap_err();
        assert!(
            matches!(err, Error::EmitsTimeout { timeout, .. } if timeout == Duration::from_millis(50)),
            "{err}"
        );
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_that(&mut connection).emits_none().await.unwrap();
    }

    #[tokio::test]
    async fn close_releases_both_streams_and_is_idempotent() {
        let facade = Arc::new(Loopback::default());
        let mut connection = connection(facade, vec![]).await;
        connection.close();
        connection.close();
        assert!(connection.data_stream().is_closed());
        assert!(connection.connection_events().is_closed());
        assert!(matches!(
            connection.wait_for_disconnection_complete().await,
            Err(Error::StreamClosed(_))
        ));
    }
}
