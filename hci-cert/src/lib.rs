#![cfg_attr(docsrs, feature(doc_cfg))]
//! # hci-cert
//!
//! A conformance harness for the Bluetooth HCI ACL link layer.
//!
//! Scenarios drive a device under test (DUT) and a certification peer (CERT)
//! through connection establishment, data exchange and disconnection, and
//! assert on what each side observes. Everything a device reports arrives on
//! an [`EventStream`]; scenarios consume those streams with the assertions in
//! [`testing`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hci_cert::{AclManager, hci::DisconnectReason, sim::SimRadio, testing::*};
//!
//! #[tokio::main]
//! async fn main() -> hci_cert::Result {
//!     let radio = SimRadio::new();
//!     let mut dut = AclManager::new(radio.attach("00:11:22:AA:BB:CC").await?);
//!     let mut cert = AclManager::new(radio.attach("00:11:22:DD:EE:FF").await?);
//!
//!     dut.listen().await?;
//!     cert.initiate("00:11:22:AA:BB:CC").await?;
//!     let dut_link = dut.complete_incoming().await?;
//!     let mut cert_link = cert.complete_outgoing().await?;
//!
//!     dut_link.send(b"\x05\x00\x07\x00hello".to_vec()).await?;
//!     assert_that(&mut cert_link)
//!         .emits(Matcher::payload_contains(b"hello".to_vec()))
//!         .await?;
//!
//!     cert_link.disconnect(DisconnectReason::RemoteUserTerminatedConnection).await?;
//!     cert_link.wait_for_disconnection_complete().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EventStream`] | Buffered single-consumer view of one transport source |
//! | [`AclManager`] | Listens for and initiates connections, one pending request per direction |
//! | [`AclConnection`] | One established link: send, disconnect, observe data |
//! | [`AclFacade`] | The transport seam a device is driven through |
//! | [`Config`] | Deadlines for completion, disconnection and assertions |
//! | [`Address`] | A device address, normalized from text or raw octets |
//!
//! ## Features
//!
//! - **`serde`** - `Serialize`/`Deserialize` for addresses, configuration and
//!   packet value types

mod acl_connection;
mod acl_manager;
mod address;
mod config;
mod direction;
mod error;
mod event_stream;
mod facade;
mod label;
mod slot;

pub mod hci;
pub mod sim;
pub mod testing;

pub use acl_connection::AclConnection;
pub use acl_manager::AclManager;
pub use address::{Address, ToAddress};
pub use config::Config;
pub use direction::Direction;
pub use error::{Error, Mismatch};
pub use event_stream::{EventSource, EventStream, Observable};
pub use facade::{AclFacade, ConnectionMsg};
pub use label::Label;

/// Convenience alias for `Result<T, hci_cert::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
