//! CERT connects to the DUT, both sides exchange data, the DUT disconnects.
//!
//! Two simulated controllers share one radio. The DUT is driven through an
//! `AclManager`, exactly as a real device behind an RPC facade would be; the
//! certification peer also sends one payload as raw ACL fragments to show
//! L2CAP recombination on the DUT side.
//!
//! ```text
//! DUT (00:11:22:AA:BB:CC) ◄──── ACL link ────► CERT (00:11:22:DD:EE:FF)
//! ```
//!
//! Run with `RUST_LOG=hci_cert=debug` for the full connection lifecycle.

use std::time::Duration;

use hci_cert::{
    AclManager, Config,
    hci::{AclPacket, BroadcastFlag, DisconnectReason, PacketBoundary},
    sim::SimRadio,
    testing::{Matcher, assert_that},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> hci_cert::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let radio = SimRadio::new();
    let dut_controller = radio.attach("00:11:22:AA:BB:CC").await?;
    let cert_controller = radio.attach("00:11:22:DD:EE:FF").await?;
    let dut_address = dut_controller.address();

    let config = Config::default().with_connection_timeout(Duration::from_secs(1));
    let mut dut = AclManager::new(dut_controller).with_config(config.clone());
    let mut cert = AclManager::new(cert_controller).with_config(config);

    dut.listen().await?;
    cert.initiate(dut_address).await?;
    let mut dut_link = dut.complete_incoming().await?;
    let mut cert_link = cert.complete_outgoing().await?;
    println!(
        "connected: DUT handle {:#05x} <-> CERT handle {:#05x}",
        dut_link.handle(),
        cert_link.handle()
    );

    dut_link
        .send(b"\x29\x00\x07\x00This is just SomeMoreAclData from the DUT".to_vec())
        .await?;
    cert.facade()
        .send_acl_packet(AclPacket::new(
            cert_link.handle(),
            PacketBoundary::FirstAutomaticallyFlushable,
            BroadcastFlag::PointToPoint,
            b"\x26\x00\x07\x00This is just SomeAcl".to_vec(),
        ))
        .await?;
    cert.facade()
        .send_acl_packet(AclPacket::new(
            cert_link.handle(),
            PacketBoundary::ContinuingFragment,
            BroadcastFlag::PointToPoint,
            b"Data from the Cert".to_vec(),
        ))
        .await?;

    assert_that(&mut cert_link)
        .emits(Matcher::payload_contains(b"SomeMoreAclData".to_vec()))
        .await?;
    assert_that(&mut dut_link)
        .emits(Matcher::payload_contains(b"SomeAclData".to_vec()))
        .await?;
    println!("data exchanged");

    dut_link
        .disconnect(DisconnectReason::RemoteUserTerminatedConnection)
        .await?;
    let reason = dut_link.wait_for_disconnection_complete().await?;
    let peer_reason = cert_link.wait_for_disconnection_complete().await?;
    println!("disconnected: DUT saw {reason:#04x}, CERT saw {peer_reason:#04x}");

    Ok(())
}
