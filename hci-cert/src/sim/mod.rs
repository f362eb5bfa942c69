//! In-process controllers for running scenarios without hardware.
//!
//! A [`SimRadio`] is the shared medium; every [`SimController`] attached to it
//! is one device with its own address. Controllers implement [`AclFacade`],
//! so an [`AclManager`](crate::AclManager) can drive them exactly like a real
//! device, and they expose [`send_acl_packet`](SimController::send_acl_packet)
//! for certification-style raw fragments with explicit flags.
//!
//! ```ignore
//! let radio = SimRadio::new();
//! let dut = radio.attach("00:11:22:AA:BB:CC").await?;
//! let cert = radio.attach("00:11:22:DD:EE:FF").await?;
//! ```
//!
//! Behaviour of the simulated link layer:
//! - Connecting to an absent device, to itself, or to one with page scan
//!   disabled completes with status `0x04` (page timeout).
//! - Otherwise the request waits until the target listens. The target then
//!   sees ConnectionRequest followed by ConnectionComplete, the initiator
//!   sees ConnectionComplete, and each side gets its own handle.
//! - Data sent before the peer fetched its data stream is buffered.
//! - Raw fragments flagged as active peripheral broadcast are dropped.
//!   Point-to-point fragments are recombined into L2CAP PDUs.
//! - `Disconnect` reports its reason to both sides and ends both data streams.
//!   Fetching the data stream of a disconnected handle yields an ended
//!   stream, so a side that completes late still sees the disconnection.

mod reassembler;

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt, mem,
    sync::Arc,
};

use futures_util::{StreamExt, stream};
use tokio::sync::{
    Mutex,
    mpsc::{self, UnboundedSender},
};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    AclFacade, Address, Error, EventSource, Result, ToAddress,
    facade::ConnectionMsg,
    hci::{
        AclData, AclPacket, BroadcastFlag, ConnectionComplete, ConnectionRequest, Disconnect,
        DisconnectionComplete, EventPacket, HANDLE_MASK, HciEvent, link_type, status,
    },
};
use reassembler::Reassembler;

/// Class of device reported in ConnectionRequest: computer, laptop.
const CLASS_OF_DEVICE: [u8; 3] = [0x0c, 0x01, 0x00];

/// The shared medium simulated controllers are attached to.
#[derive(Clone, Default)]
pub struct SimRadio {
    state: Arc<Mutex<RadioState>>,
}

impl SimRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a controller with `address`. Page scan starts enabled.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateAddress`] if a controller with that address is
    /// already attached, [`Error::InvalidAddress`] if `address` cannot be
    /// parsed.
    pub async fn attach(&self, address: impl ToAddress) -> Result<SimController> {
        let address = address.to_address()?;
        let mut state = self.state.lock().await;
        if state.devices.contains_key(&address) {
            return Err(Error::DuplicateAddress(address));
        }
        state.devices.insert(address, Device::new());
        tracing::debug!(%address, "controller attached");
        Ok(SimController {
            address,
            radio: self.clone(),
        })
    }

    /// Number of live links, counting each side separately.
    pub async fn link_count(&self) -> usize {
        self.state.lock().await.links.len()
    }
}

impl fmt::Debug for SimRadio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRadio").finish_non_exhaustive()
    }
}

/// One simulated device on a [`SimRadio`].
#[derive(Clone)]
pub struct SimController {
    address: Address,
    radio: SimRadio,
}

impl SimController {
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Enable or disable page scan, which decides whether this device can
    /// be connected to.
    pub async fn set_page_scan(&self, enabled: bool) {
        let mut state = self.radio.state.lock().await;
        state.device_mut(self.address).page_scan = enabled;
        tracing::debug!(address = %self.address, enabled, "page scan");
    }

    /// Send one raw ACL fragment with explicit boundary and broadcast flags.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownHandle`] if `packet.handle` is not a live link of this
    /// controller.
    pub async fn send_acl_packet(&self, packet: AclPacket) -> Result {
        let mut state = self.radio.state.lock().await;
        let peer = state.peer_link_mut(self.address, packet.handle)?;
        if packet.broadcast != BroadcastFlag::PointToPoint {
            tracing::warn!(handle = packet.handle, "broadcast fragment dropped");
            return Ok(());
        }
        if let Some(pdu) = peer.link.reassembler.push(packet.boundary, &packet.payload) {
            peer.link.data.deliver(AclData::new(peer.handle, pdu));
        }
        Ok(())
    }
}

impl AclFacade for SimController {
    async fn fetch_incoming_connection(&self) -> Result<EventSource<EventPacket>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.radio.state.lock().await;
        match state.device_mut(self.address).take_request() {
            Some(request) => state.establish(request.initiator, request.events, self.address, tx)?,
            None => state.device_mut(self.address).listeners.push_back(tx),
        }
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn create_connection(&self, msg: ConnectionMsg) -> Result<EventSource<EventPacket>> {
        let target = msg.address()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.radio.state.lock().await;

        let reachable = target != self.address
            && state.devices.get(&target).is_some_and(|device| device.page_scan);
        if !reachable {
            tracing::debug!(initiator = %self.address, %target, "page timeout");
            emit(
                &tx,
                HciEvent::ConnectionComplete(ConnectionComplete {
                    status: status::PAGE_TIMEOUT,
                    address: target,
                    ..Default::default()
                }),
            )?;
            return Ok(UnboundedReceiverStream::new(rx).boxed());
        }

        match state.device_mut(target).take_listener() {
            Some(listener) => state.establish(self.address, tx, target, listener)?,
            None => state.device_mut(target).requests.push_back(PendingRequest {
                initiator: self.address,
                events: tx,
            }),
        }
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn fetch_acl_data(&self, handle: u16) -> Result<EventSource<AclData>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.radio.state.lock().await;
        if state.disconnected.contains(&(self.address, handle)) {
            tracing::debug!(address = %self.address, handle, "data stream of a disconnected link");
            return Ok(stream::empty().boxed());
        }
        let link = state
            .links
            .get_mut(&(self.address, handle))
            .ok_or(Error::UnknownHandle(handle))?;
        link.data.go_live(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn connection_command(&self, packet: Vec<u8>) -> Result {
        let command = Disconnect::parse(&packet)?;
        let mut state = self.radio.state.lock().await;
        let link = state
            .links
            .remove(&(self.address, command.handle))
            .ok_or(Error::UnknownHandle(command.handle))?;
        state.disconnected.insert((self.address, command.handle));
        state.disconnected.insert((link.peer, link.peer_handle));

        emit(
            &link.events,
            HciEvent::DisconnectionComplete(DisconnectionComplete {
                status: status::SUCCESS,
                handle: command.handle,
                reason: command.reason,
            }),
        )?;
        if let Some(peer) = state.links.remove(&(link.peer, link.peer_handle)) {
            emit(
                &peer.events,
                HciEvent::DisconnectionComplete(DisconnectionComplete {
                    status: status::SUCCESS,
                    handle: link.peer_handle,
                    reason: command.reason,
                }),
            )?;
        }
        tracing::info!(
            address = %self.address,
            peer = %link.peer,
            reason = %format_args!("{:#04x}", command.reason),
            "link disconnected"
        );
        Ok(())
    }

    async fn send_acl_data(&self, data: AclData) -> Result {
        let mut state = self.radio.state.lock().await;
        let peer = state.peer_link_mut(self.address, data.handle)?;
        peer.link.data.deliver(AclData::new(peer.handle, data.payload));
        Ok(())
    }
}

impl fmt::Debug for SimController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimController")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RadioState {
    devices: HashMap<Address, Device>,
    /// Keyed by owning device and that device's handle.
    links: HashMap<(Address, u16), Link>,
    /// Links that were established and have since been disconnected.
    disconnected: HashSet<(Address, u16)>,
    next_handle: u16,
}

impl RadioState {
    fn device_mut(&mut self, address: Address) -> &mut Device {
        self.devices.entry(address).or_insert_with(Device::new)
    }

    fn allocate_handle(&mut self) -> u16 {
        self.next_handle = self.next_handle % HANDLE_MASK + 1;
        self.next_handle
    }

    fn establish(
        &mut self,
        initiator: Address,
        initiator_events: UnboundedSender<EventPacket>,
        target: Address,
        target_events: UnboundedSender<EventPacket>,
    ) -> Result {
        let initiator_handle = self.allocate_handle();
        let target_handle = self.allocate_handle();

        emit(
            &target_events,
            HciEvent::ConnectionRequest(ConnectionRequest {
                address: initiator,
                class_of_device: CLASS_OF_DEVICE,
                link_type: link_type::ACL,
            }),
        )?;
        emit(
            &target_events,
            HciEvent::ConnectionComplete(ConnectionComplete {
                handle: target_handle,
                address: initiator,
                ..Default::default()
            }),
        )?;
        emit(
            &initiator_events,
            HciEvent::ConnectionComplete(ConnectionComplete {
                handle: initiator_handle,
                address: target,
                ..Default::default()
            }),
        )?;

        self.disconnected.remove(&(initiator, initiator_handle));
        self.disconnected.remove(&(target, target_handle));
        self.links.insert(
            (initiator, initiator_handle),
            Link::new(target, target_handle, initiator_events),
        );
        self.links.insert(
            (target, target_handle),
            Link::new(initiator, initiator_handle, target_events),
        );
        tracing::info!(
            %initiator,
            %target,
            initiator_handle,
            target_handle,
            "link established"
        );
        Ok(())
    }

    /// The receiving side of the link `owner` knows as `handle`.
    fn peer_link_mut(&mut self, owner: Address, handle: u16) -> Result<PeerLink<'_>> {
        let link = self
            .links
            .get(&(owner, handle))
            .ok_or(Error::UnknownHandle(handle))?;
        let key = (link.peer, link.peer_handle);
        let link = self
            .links
            .get_mut(&key)
            .ok_or(Error::UnknownHandle(handle))?;
        Ok(PeerLink {
            handle: key.1,
            link,
        })
    }
}

struct PeerLink<'a> {
    handle: u16,
    link: &'a mut Link,
}

struct Device {
    page_scan: bool,
    listeners: VecDeque<UnboundedSender<EventPacket>>,
    requests: VecDeque<PendingRequest>,
}

impl Device {
    fn new() -> Self {
        Self {
            page_scan: true,
            listeners: VecDeque::new(),
            requests: VecDeque::new(),
        }
    }

    /// Next listener whose stream is still open.
    fn take_listener(&mut self) -> Option<UnboundedSender<EventPacket>> {
        while let Some(listener) = self.listeners.pop_front() {
            if !listener.is_closed() {
                return Some(listener);
            }
        }
        None
    }

    /// Next connection request whose initiator is still waiting.
    fn take_request(&mut self) -> Option<PendingRequest> {
        while let Some(request) = self.requests.pop_front() {
            if !request.events.is_closed() {
                return Some(request);
            }
        }
        None
    }
}

struct PendingRequest {
    initiator: Address,
    events: UnboundedSender<EventPacket>,
}

/// One side of an established link.
struct Link {
    peer: Address,
    peer_handle: u16,
    events: UnboundedSender<EventPacket>,
    data: DataSink,
    reassembler: Reassembler,
}

impl Link {
    fn new(peer: Address, peer_handle: u16, events: UnboundedSender<EventPacket>) -> Self {
        Self {
            peer,
            peer_handle,
            events,
            data: DataSink::Buffered(Vec::new()),
            reassembler: Reassembler::default(),
        }
    }
}

enum DataSink {
    /// Nobody fetched the data stream yet.
    Buffered(Vec<AclData>),
    Live(UnboundedSender<AclData>),
}

impl DataSink {
    fn deliver(&mut self, data: AclData) {
        match self {
            DataSink::Buffered(backlog) => backlog.push(data),
            DataSink::Live(tx) => {
                if tx.send(data).is_err() {
                    tracing::trace!("data stream gone, payload dropped");
                }
            }
        }
    }

    fn go_live(&mut self, tx: UnboundedSender<AclData>) {
        if let DataSink::Buffered(backlog) = mem::replace(self, DataSink::Live(tx)) {
            for data in backlog {
                self.deliver(data);
            }
        }
    }
}

fn emit(events: &UnboundedSender<EventPacket>, event: HciEvent) -> Result {
    let packet = event.to_packet()?;
    if events.send(packet).is_err() {
        tracing::trace!(event = %crate::Label::label(&event), "lifecycle stream gone, event dropped");
    }
    Ok(())
}
