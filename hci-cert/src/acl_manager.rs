use std::{fmt, sync::Arc};

use crate::{
    AclConnection, AclFacade, Config, Direction, Error, EventStream, Result, ToAddress,
    facade::ConnectionMsg,
    slot::Slot,
    testing::{HciCaptures, assert_that},
};

/// Drives connection establishment against one [`AclFacade`].
///
/// Tracks at most one outstanding incoming listen and one outstanding
/// outgoing connect. Each direction moves `Idle -> Pending -> Idle`: a
/// `listen`/`initiate` makes it pending, and the matching `complete_*` call
/// consumes the pending lifecycle stream and turns it into an
/// [`AclConnection`].
///
/// # Example
///
/// ```ignore
/// let mut cert = AclManager::new(cert_controller);
/// let mut dut = AclManager::new(dut_controller);
///
/// dut.listen().await?;
/// cert.initiate("00:11:22:AA:BB:CC").await?;
/// let mut dut_link = dut.complete_incoming().await?;
/// let mut cert_link = cert.complete_outgoing().await?;
/// ```
///
/// Pending streams that were never completed are released by
/// [`close`](Self::close) or on drop.
pub struct AclManager<F> {
    facade: Arc<F>,
    config: Config,
    incoming: Slot,
    outgoing: Slot,
}

impl<F: AclFacade> AclManager<F> {
    pub fn new(facade: F) -> Self {
        Self::with_shared(Arc::new(facade))
    }

    /// Create a manager over a facade that is also used elsewhere.
    pub fn with_shared(facade: Arc<F>) -> Self {
        Self {
            facade,
            config: Config::default(),
            incoming: Slot::Idle,
            outgoing: Slot::Idle,
        }
    }

    /// Replace the deadlines used by this manager and the connections it creates.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Start accepting one incoming connection.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyPending`] if a listen is already outstanding; the
    /// outstanding one is left untouched.
    pub async fn listen(&mut self) -> Result {
        self.incoming.ensure_idle(Direction::Incoming)?;
        let source = self.facade.fetch_incoming_connection().await?;
        self.incoming = Slot::Pending(EventStream::open("incoming connection", source));
        tracing::debug!(direction = %Direction::Incoming, "connection pending");
        Ok(())
    }

    /// Start connecting to `address`.
    ///
    /// `address` may be an [`Address`](crate::Address), its text form, or
    /// raw octets; every form produces the same request.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyPending`] if a connect is already outstanding,
    /// [`Error::InvalidAddress`] if `address` cannot be normalized.
    pub async fn initiate(&mut self, address: impl ToAddress) -> Result {
        self.outgoing.ensure_idle(Direction::Outgoing)?;
        let address = address.to_address()?;
        let source = self
            .facade
            .create_connection(ConnectionMsg::new(address))
            .await?;
        self.outgoing = Slot::Pending(EventStream::open(
            format!("outgoing connection to {address}"),
            source,
        ));
        tracing::debug!(direction = %Direction::Outgoing, %address, "connection pending");
        Ok(())
    }

    /// Wait for the pending incoming connection to complete.
    pub async fn complete_incoming(&mut self) -> Result<AclConnection<F>> {
        self.complete(Direction::Incoming).await
    }

    /// Wait for the pending outgoing connection to complete.
    pub async fn complete_outgoing(&mut self) -> Result<AclConnection<F>> {
        self.complete(Direction::Outgoing).await
    }

    async fn complete(&mut self, direction: Direction) -> Result<AclConnection<F>> {
        let slot = match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        };
        let mut events = slot.take(direction)?;
        tracing::debug!(%direction, "completing connection");

        let mut complete = HciCaptures::connection_complete();
        assert_that(&mut events)
            .emits(&mut complete)
            .within(self.config.connection_timeout())
            .await?;

        let complete = complete.take()?;
        if !complete.is_success() {
            tracing::debug!(
                %direction,
                address = %complete.address,
                status = %format_args!("{:#04x}", complete.status),
                "connection failed"
            );
            return Err(Error::ConnectionFailed {
                address: complete.address,
                status: complete.status,
            });
        }

        AclConnection::open(
            self.facade.clone(),
            complete.handle,
            complete.address,
            events,
            self.config.clone(),
        )
        .await
    }
}

impl<F> AclManager<F> {
    /// Whether a request of `direction` is outstanding.
    pub fn is_pending(&self, direction: Direction) -> bool {
        match direction {
            Direction::Incoming => self.incoming.is_pending(),
            Direction::Outgoing => self.outgoing.is_pending(),
        }
    }

    /// The facade this manager issues requests through.
    pub fn facade(&self) -> &Arc<F> {
        &self.facade
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Release any pending lifecycle streams. Idempotent.
    pub fn close(&mut self) {
        if self.incoming.is_pending() || self.outgoing.is_pending() {
            tracing::debug!(
                incoming = self.incoming.is_pending(),
                outgoing = self.outgoing.is_pending(),
                "releasing pending connections"
            );
        }
        self.incoming.clear();
        self.outgoing.clear();
    }
}

impl<F> Drop for AclManager<F> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<F> fmt::Debug for AclManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclManager")
            .field("config", &self.config)
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use futures_util::{StreamExt, stream};

    use super::*;
    use crate::{
        Address, EventSource,
        hci::{AclData, ConnectionComplete, ConnectionRequest, EventPacket, HciEvent, status},
    };

    const PEER: Address = Address::new([0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]);

    /// Records requests; every lifecycle source replays `lifecycle` and then
    /// stays open.
    #[derive(Default)]
    struct Recording {
        listens: AtomicUsize,
        requests: Mutex<Vec<ConnectionMsg>>,
        lifecycle: Mutex<Vec<EventPacket>>,
    }

    impl Recording {
        fn replaying(events: Vec<HciEvent>) -> Self {
            let packets = events.iter().map(|e| e.to_packet().unwrap()).collect();
            Self {
                lifecycle: Mutex::new(packets),
                ..Default::default()
            }
        }

        fn lifecycle_source(&self) -> EventSource<EventPacket> {
            let events = self.lifecycle.lock().unwrap().clone();
            stream::iter(events).chain(stream::pending()).boxed()
        }
    }

    impl AclFacade for Recording {
        async fn fetch_incoming_connection(&self) -> Result<EventSource<EventPacket>> {
            self.listens.fetch_add(1, Ordering::SeqCst);
            Ok(self.lifecycle_source())
        }

        async fn create_connection(&self, msg: ConnectionMsg) -> Result<EventSource<EventPacket>> {
            self.requests.lock().unwrap().push(msg);
            Ok(self.lifecycle_source())
        }

        async fn fetch_acl_data(&self, _handle: u16) -> Result<EventSource<AclData>> {
            Ok(stream::pending().boxed())
        }

        async fn connection_command(&self, _packet: Vec<u8>) -> Result {
            Ok(())
        }

        async fn send_acl_data(&self, _data: AclData) -> Result {
            Ok(())
        }
    }

    fn manager(facade: Recording) -> AclManager<Recording> {
        AclManager::new(facade)
            .with_config(Config::default().with_connection_timeout(Duration::from_millis(100)))
    }

    fn completed(handle: u16, status: u8) -> HciEvent {
        HciEvent::ConnectionComplete(ConnectionComplete {
            status,
            handle,
            address: PEER,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn second_listen_fails_without_touching_the_first() {
        let mut manager = manager(Recording::replaying(vec![completed(0x002, status::SUCCESS)]));
        manager.listen().await.unwrap();

        assert_eq!(
            manager.listen().await,
            Err(Error::AlreadyPending(Direction::Incoming))
        );
        assert_eq!(manager.facade().listens.load(Ordering::SeqCst), 1);
        assert!(manager.is_pending(Direction::Incoming));

        let connection = manager.complete_incoming().await.unwrap();
        assert_eq!(connection.handle(), 0x002);
        assert!(!manager.is_pending(Direction::Incoming));
    }

    #[tokio::test]
    async fn second_initiate_fails() {
        let mut manager = manager(Recording::default());
        manager.initiate(PEER).await.unwrap();
        assert_eq!(
            manager.initiate(PEER).await,
            Err(Error::AlreadyPending(Direction::Outgoing))
        );
        assert_eq!(manager.facade().requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completing_without_a_request_fails_fast() {
        let mut manager = manager(Recording::default());
        assert_eq!(
            manager.complete_outgoing().await.unwrap_err(),
            Error::NotPending(Direction::Outgoing)
        );
        assert_eq!(
            manager.complete_incoming().await.unwrap_err(),
            Error::NotPending(Direction::Incoming)
        );
    }

    #[tokio::test]
    async fn text_and_bytes_produce_identical_requests() {
        let raw: [u8; 6] = [0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc];
        let inputs: Vec<Box<dyn ToAddress + Send>> = vec![
            Box::new("00:11:22:AA:BB:CC"),
            Box::new("00:11:22:aa:bb:cc".to_string()),
            Box::new(raw),
            Box::new(b"00:11:22:AA:BB:CC".to_vec()),
            Box::new(PEER),
        ];

        let mut requests = Vec::new();
        for input in inputs {
            let mut manager = manager(Recording::default());
            manager.initiate(&*input).await.unwrap();
            requests.extend(manager.facade().requests.lock().unwrap().drain(..));
        }

        assert_eq!(requests.len(), 5);
        assert!(requests.iter().all(|r| *r == ConnectionMsg::new(PEER)));
    }

    #[tokio::test]
    async fn invalid_address_leaves_slot_idle() {
        let mut manager = manager(Recording::default());
        assert!(matches!(
            manager.initiate("not an address").await,
            Err(Error::InvalidAddress(_))
        ));
        assert!(!manager.is_pending(Direction::Outgoing));
        assert!(manager.facade().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_skips_connection_request() {
        let mut manager = manager(Recording::replaying(vec![
            HciEvent::ConnectionRequest(ConnectionRequest {
                address: PEER,
                ..Default::default()
            }),
            completed(0x003, status::SUCCESS),
        ]));
        manager.listen().await.unwrap();
        let connection = manager.complete_incoming().await.unwrap();
        assert_eq!(connection.handle(), 0x003);
        assert_eq!(connection.address(), PEER);
    }

    #[tokio::test]
    async fn failed_status_is_reported() {
        let mut manager = manager(Recording::replaying(vec![completed(0, status::PAGE_TIMEOUT)]));
        manager.initiate(PEER).await.unwrap();
        assert_eq!(
            manager.complete_outgoing().await.unwrap_err(),
            Error::ConnectionFailed {
                address: PEER,
                status: status::PAGE_TIMEOUT,
            }
        );
        assert!(!manager.is_pending(Direction::Outgoing));
    }

    #[tokio::test]
    async fn missing_completion_times_out_and_clears_the_slot() {
        let mut manager = manager(Recording::default());
        manager.listen().await.unwrap();
        let err = manager.complete_incoming().await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(!manager.is_pending(Direction::Incoming));
        manager.listen().await.unwrap();
    }

    #[tokio::test]
    async fn close_releases_pending_requests() {
        let mut manager = manager(Recording::default());
        manager.listen().await.unwrap();
        manager.initiate(PEER).await.unwrap();

        manager.close();
        manager.close();
        assert!(!manager.is_pending(Direction::Incoming));
        assert!(!manager.is_pending(Direction::Outgoing));
    }
}
