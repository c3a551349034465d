//! Shared fixtures for the integration scenarios

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use ransim_common::cli_wire::{CliMessage, CliMessageType};
use ransim_common::{AmfConfig, GnbConfig, OctetString, PagingDrx, Plmn, SNssai, UeConfig};
use ransim_gnb::sctp::SctpWireTx;
use ransim_gnb::tasks::SctpMessage;
use ransim_gnb::GnbNode;
use ransim_ngap::codec::{decode_ngap_pdu, encode_ngap_pdu, NgapPdu};
use ransim_ngap::ies::{PlmnSupportItem, ServedGuamiItem};
use ransim_ngap::procedures::{DownlinkNasTransport, NgSetupResponse};

/// The PLMN used across the fixtures.
pub fn plmn() -> Plmn {
    Plmn::new(901, 70, false)
}

/// A gNB configuration with `amf_count` AMFs.
pub fn gnb_config(amf_count: usize) -> GnbConfig {
    GnbConfig {
        gnb_id: 1,
        gnb_id_length: 32,
        name: "ransim-gnb-1".to_string(),
        plmn: plmn(),
        tac: 1,
        nci: 0x10,
        nssais: vec![SNssai::new(1)],
        paging_drx: PagingDrx::V128,
        amf_configs: (0..amf_count)
            .map(|i| AmfConfig::new("127.0.0.1".parse().unwrap(), 38412 + i as u16))
            .collect(),
        ignore_stream_ids: false,
        debug_stubs: false,
    }
}

/// A UE configuration with one default IPv4 session.
pub fn ue_config(supi: &str) -> UeConfig {
    UeConfig {
        supi: Some(supi.to_string()),
        imei: Some("356938035643803".to_string()),
        imeisv: None,
        plmn: plmn(),
        nssais: vec![SNssai::new(1)],
        configure_routing: false,
        auto_behaviour: true,
        sessions: vec![ransim_common::SessionConfig::default()],
        tun_name_prefix: "ransimtun".to_string(),
    }
}

/// A canned NG Setup Response.
pub fn ng_setup_response(amf_name: &str, capacity: u8) -> NgSetupResponse {
    NgSetupResponse {
        amf_name: amf_name.to_string(),
        served_guami_list: vec![ServedGuamiItem {
            guami: ransim_common::Guami {
                plmn: plmn(),
                amf_region_id: 1,
                amf_set_id: 1,
                amf_pointer: 0,
            },
            backup_amf_name: None,
        }],
        relative_amf_capacity: capacity,
        plmn_support_list: vec![PlmnSupportItem {
            plmn: plmn(),
            slice_support_list: vec![SNssai::new(1)],
        }],
    }
}

/// Injects an encoded NGAP PDU into the gNB as if it arrived from the
/// AMF on the given stream.
pub async fn inject_from_amf(node: &GnbNode, amf_id: i32, stream: u16, pdu: &NgapPdu) {
    let bytes = encode_ngap_pdu(pdu).expect("test PDU must encode");
    node.base
        .sctp_tx
        .send(SctpMessage::ReceiveMessage {
            amf_id,
            stream,
            buffer: OctetString::from_slice(&bytes),
        })
        .await
        .expect("SCTP task reachable");
}

/// Brings one AMF association up and completes NG Setup, consuming the
/// NG Setup Request from the wire. Returns when the request was seen.
pub async fn complete_ng_setup(
    node: &GnbNode,
    wire_rx: &mut mpsc::Receiver<SctpWireTx>,
    amf_id: i32,
    amf_name: &str,
) {
    node.base
        .sctp_tx
        .send(SctpMessage::AssociationSetup {
            amf_id,
            in_streams: 2,
            out_streams: 2,
        })
        .await
        .expect("SCTP task reachable");

    let wire = expect_wire_pdu(wire_rx).await;
    assert!(matches!(wire.1, NgapPdu::NgSetupRequest(_)));

    inject_from_amf(
        node,
        amf_id,
        0,
        &NgapPdu::NgSetupResponse(ng_setup_response(amf_name, 255)),
    )
    .await;
}

/// Reads the next outgoing PDU from the SCTP wire, decoded.
pub async fn expect_wire_pdu(wire_rx: &mut mpsc::Receiver<SctpWireTx>) -> (SctpWireTx, NgapPdu) {
    let wire = tokio::time::timeout(Duration::from_secs(5), wire_rx.recv())
        .await
        .expect("timed out waiting for outgoing PDU")
        .expect("wire channel open");
    let pdu = decode_ngap_pdu(wire.buffer.data()).expect("outgoing PDU must decode");
    (wire, pdu)
}

/// Waits for an outgoing PDU satisfying the predicate, skipping others.
pub async fn wait_for_wire_pdu<F>(
    wire_rx: &mut mpsc::Receiver<SctpWireTx>,
    mut predicate: F,
) -> (SctpWireTx, NgapPdu)
where
    F: FnMut(&NgapPdu) -> bool,
{
    loop {
        let (wire, pdu) = expect_wire_pdu(wire_rx).await;
        if predicate(&pdu) {
            return (wire, pdu);
        }
    }
}

/// Sends a downlink NAS PDU toward a UE through the gNB.
pub async fn send_downlink_nas(
    node: &GnbNode,
    amf_id: i32,
    stream: u16,
    amf_ue_ngap_id: i64,
    ran_ue_ngap_id: i64,
    nas_pdu: Vec<u8>,
) {
    inject_from_amf(
        node,
        amf_id,
        stream,
        &NgapPdu::DownlinkNasTransport(DownlinkNasTransport {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            nas_pdu,
        }),
    )
    .await;
}

/// Executes one CLI command against a node over the real UDP wire.
/// Returns `Ok(result)` or `Err(error_message)`.
pub async fn cli_query(port: u16, node_name: &str, command: &str) -> Result<String, String> {
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = CliMessage::command(server_addr, node_name, command);
    socket.send_to(&request.encode(), server_addr).await.unwrap();

    let mut buffer = [0u8; 8192];
    let (size, from) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buffer))
        .await
        .expect("timed out waiting for CLI response")
        .unwrap();

    let response = CliMessage::decode(&buffer[..size], from).expect("malformed CLI response");
    match response.msg_type {
        CliMessageType::Error => Err(response.value),
        _ => Ok(response.value),
    }
}

/// Polls `probe` until it returns true or the timeout elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
