//! End-to-end UE scenarios over the in-process air link

use std::time::Duration;

use tokio::sync::mpsc;

use ransim_common::{air, OctetString};
use ransim_gnb::tasks::{MrMessage, RrcMessage};
use ransim_gnb::GnbNode;
use ransim_ngap::codec::NgapPdu;
use ransim_nas::{decode_nas_message, encode_nas_message, NasMessage as NasPdu};
use ransim_nas::{PduSessionEstablishmentAccept, RegistrationAccept};
use ransim_ue::nas::mm::{MmState, MmSubState, RmState};
use ransim_ue::UeNode;

use crate::test_utils::*;

/// Boots a gNB with a completed NG Setup and a UE attached to its cell.
/// Returns the nodes and the AMF-side wire receiver.
async fn boot_attached_pair() -> (
    GnbNode,
    UeNode,
    mpsc::Receiver<ransim_gnb::sctp::SctpWireTx>,
) {
    let mut gnb = GnbNode::start(gnb_config(1), None, false).await.unwrap();
    let mut wire_rx = std::mem::replace(&mut gnb.sctp_wire_rx, mpsc::channel(1).1);
    complete_ng_setup(&gnb, &mut wire_rx, 1, "AMF1").await;

    let ue = UeNode::start(ue_config("imsi-901700000000001"), None, None, true)
        .await
        .unwrap();

    let (peer, endpoint) = air::link(1, "imsi-901700000000001", gnb.air_uplink.clone(), 64);
    gnb.base
        .mr_tx
        .send(MrMessage::UeConnected { peer })
        .await
        .unwrap();
    ue.connect_to_cell(endpoint).await;

    (gnb, ue, wire_rx)
}

/// Drives the registration exchange: answers the Initial UE Message with
/// a Registration Accept and returns the pair of NGAP IDs.
async fn complete_registration(
    gnb: &GnbNode,
    wire_rx: &mut mpsc::Receiver<ransim_gnb::sctp::SctpWireTx>,
) -> (i64, i64) {
    let (wire, pdu) =
        wait_for_wire_pdu(wire_rx, |pdu| matches!(pdu, NgapPdu::InitialUeMessage(_))).await;

    let initial = match pdu {
        NgapPdu::InitialUeMessage(initial) => initial,
        other => panic!("unexpected PDU: {other:?}"),
    };

    // the NAS PDU deposited at UE MM re-emerges byte-identical at the AMF
    let decoded = decode_nas_message(&initial.nas_pdu).unwrap();
    assert!(matches!(decoded, NasPdu::RegistrationRequest(_)));
    assert_eq!(encode_nas_message(&decoded), initial.nas_pdu);

    let amf_ue_ngap_id = 1000;
    let accept = encode_nas_message(&NasPdu::RegistrationAccept(RegistrationAccept {
        guti: None,
        tai_list: vec![ransim_common::Tai::new(plmn(), 1)],
        t3512_secs: Some(54 * 60),
    }));
    send_downlink_nas(
        gnb,
        1,
        wire.stream,
        amf_ue_ngap_id,
        initial.ran_ue_ngap_id,
        accept,
    )
    .await;

    (amf_ue_ngap_id, initial.ran_ue_ngap_id)
}

#[tokio::test]
async fn ue_boot_enters_plmn_search() {
    // no cell anywhere: the UE keeps searching
    let ue = UeNode::start(ue_config("imsi-901700000000002"), None, None, false)
        .await
        .unwrap();

    let searching = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().mm_sub_state() == MmSubState::DeregisteredPlmnSearch
    })
    .await;
    assert!(searching);

    ue.shutdown().await;
}

#[tokio::test]
async fn ue_registers_and_establishes_configured_session() {
    let (gnb, ue, mut wire_rx) = boot_attached_pair().await;
    complete_registration(&gnb, &mut wire_rx).await;

    // the UE lands in REGISTERED/NORMAL-SERVICE
    let registered = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().mm_sub_state() == MmSubState::RegisteredNormalService
            && ctx.mm.registers().rm_state() == RmState::Registered
    })
    .await;
    assert!(registered);

    // the configured session is requested; answer it
    let (wire, pdu) = wait_for_wire_pdu(&mut wire_rx, |pdu| {
        matches!(
            pdu,
            NgapPdu::UplinkNasTransport(transport)
                if matches!(
                    decode_nas_message(&transport.nas_pdu),
                    Ok(NasPdu::PduSessionEstablishmentRequest(_))
                )
        )
    })
    .await;
    let transport = match pdu {
        NgapPdu::UplinkNasTransport(transport) => transport,
        other => panic!("unexpected PDU: {other:?}"),
    };
    let request = match decode_nas_message(&transport.nas_pdu).unwrap() {
        NasPdu::PduSessionEstablishmentRequest(request) => request,
        other => panic!("unexpected NAS message: {other:?}"),
    };

    let accept = encode_nas_message(&NasPdu::PduSessionEstablishmentAccept(
        PduSessionEstablishmentAccept {
            psi: request.psi,
            pti: request.pti,
            session_type: request.session_type,
            pdu_address: "10.45.0.2".parse().unwrap(),
            qos_rules: vec![0x01],
        },
    ));
    send_downlink_nas(
        &gnb,
        1,
        wire.stream,
        transport.amf_ue_ngap_id,
        transport.ran_ue_ngap_id,
        accept,
    )
    .await;

    let established = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.sm.established_sessions().len() == 1
    })
    .await;
    assert!(established);

    // the UE status reports the session over the CLI
    let status = cli_query(ue.cli_port, "imsi-901700000000001", "status")
        .await
        .unwrap();
    assert!(status.contains("5GMM-REGISTERED.NORMAL-SERVICE"));
    assert!(status.contains("10.45.0.2"));

    gnb.shutdown().await;
    ue.shutdown().await;
}

#[tokio::test]
async fn switch_off_deregistration_aborted_by_cm_drop_enters_null() {
    let (gnb, ue, mut wire_rx) = boot_attached_pair().await;
    complete_registration(&gnb, &mut wire_rx).await;

    let registered = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().mm_sub_state() == MmSubState::RegisteredNormalService
    })
    .await;
    assert!(registered);

    // operator triggers a switch-off de-registration while disabling 5G
    let response = cli_query(
        ue.cli_port,
        "imsi-901700000000001",
        "deregister switch-off disable-5g",
    )
    .await
    .unwrap();
    assert!(response.contains("triggered"));

    // the request goes out toward the AMF
    let in_flight = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().mm_state() == MmState::DeregisteredInitiated
    })
    .await;
    assert!(in_flight);

    // no response arrives; instead the connection drops (RRC release)
    gnb.base
        .rrc_tx
        .send(RrcMessage::AnRelease { ue_id: 1 })
        .await
        .unwrap();

    // abnormal case: the procedure aborts into 5GMM-NULL and the pending
    // request is cleared
    let nulled = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().mm_state() == MmState::Null
            && ctx.mm.registers().mm_sub_state() == MmSubState::NullNa
            && !ctx.mm.deregistration_in_flight()
    })
    .await;
    assert!(nulled);

    gnb.shutdown().await;
    ue.shutdown().await;
}

#[tokio::test]
async fn downlink_nas_reaches_ue_through_the_full_chain() {
    let (gnb, ue, mut wire_rx) = boot_attached_pair().await;
    let (amf_id, ran_id) = complete_registration(&gnb, &mut wire_rx).await;

    let registered = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().rm_state() == RmState::Registered
    })
    .await;
    assert!(registered);

    // network-initiated de-registration travels the whole downlink chain
    // and the UE answers with an accept over the whole uplink chain
    let request = encode_nas_message(&NasPdu::DeregistrationRequestUeTerminated(
        ransim_nas::DeregistrationRequestUeTerminated::new(ransim_nas::DeRegistrationType::new(
            ransim_nas::DeRegistrationAccessType::ThreeGppAccess,
            ransim_nas::ReRegistrationRequired::NotRequired,
            ransim_nas::SwitchOff::NormalDeRegistration,
        )),
    ));
    send_downlink_nas(&gnb, 1, 1, amf_id, ran_id, request).await;

    let (_, pdu) = wait_for_wire_pdu(&mut wire_rx, |pdu| {
        matches!(
            pdu,
            NgapPdu::UplinkNasTransport(transport)
                if matches!(
                    decode_nas_message(&transport.nas_pdu),
                    Ok(NasPdu::DeregistrationAcceptUeTerminated(_))
                )
        )
    })
    .await;
    assert!(matches!(pdu, NgapPdu::UplinkNasTransport(_)));

    let deregistered = wait_until(Duration::from_secs(5), || async {
        let ctx = ue.nas_context.lock().await;
        ctx.mm.registers().rm_state() == RmState::Deregistered
    })
    .await;
    assert!(deregistered);

    gnb.shutdown().await;
    ue.shutdown().await;
}

#[tokio::test]
async fn user_plane_uplink_reaches_gtp_tunnel() {
    let (mut gnb, ue, mut wire_rx) = boot_attached_pair().await;
    complete_registration(&gnb, &mut wire_rx).await;

    // install a tunnel for UE 1, PSI 1
    gnb.base
        .gtp_tx
        .send(ransim_gnb::tasks::GtpMessage::SessionCreate {
            session: ransim_gtp::PduSession {
                ue_id: 1,
                psi: 1,
                uplink: ransim_gtp::GtpTunnel::new(0x1000, "10.0.0.1:2152".parse().unwrap()),
                downlink: ransim_gtp::GtpTunnel::new(0x2000, "10.0.0.2:2152".parse().unwrap()),
            },
        })
        .await
        .unwrap();

    // an uplink IP packet from the UE side surfaces as a G-PDU
    ue.base
        .mr_tx
        .send(ransim_ue::tasks::MrMessage::UplinkData {
            psi: 1,
            data: OctetString::from_slice(&[0x45, 0x00, 0x00, 0x14]),
        })
        .await
        .unwrap();

    let datagram = tokio::time::timeout(Duration::from_secs(5), gnb.upf_rx.recv())
        .await
        .expect("timed out waiting for uplink G-PDU")
        .unwrap();
    let header = ransim_gtp::GtpHeader::decode(&datagram.payload).unwrap();
    assert_eq!(header.teid, 0x1000);
    assert_eq!(header.payload.as_ref(), &[0x45, 0x00, 0x00, 0x14]);

    gnb.shutdown().await;
    ue.shutdown().await;
}
