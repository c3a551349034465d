//! gNB boot scenarios: NG Setup against one or more AMFs

use std::time::Duration;

use ransim_gnb::ngap::AmfState;
use ransim_gnb::GnbNode;
use ransim_ngap::cause::{NgapCause, TransportCause};
use ransim_ngap::codec::NgapPdu;
use ransim_ngap::procedures::{AmfConfigurationUpdate, TnlAssociationItem};

use crate::test_utils::*;

#[tokio::test]
async fn single_amf_boot_reaches_connected_and_reports_ngap_up() {
    let mut node = GnbNode::start(gnb_config(1), None, true).await.unwrap();
    let mut wire_rx = std::mem::replace(&mut node.sctp_wire_rx, tokio::sync::mpsc::channel(1).1);

    complete_ng_setup(&node, &mut wire_rx, 1, "AMF1").await;

    // AMF context reaches CONNECTED with the advertised defaults
    let connected = wait_until(Duration::from_secs(5), || async {
        let state = node.ngap_state.lock().await;
        state
            .amf_contexts
            .get(&1)
            .map(|ctx| ctx.state == AmfState::Connected && ctx.relative_capacity == 255)
            .unwrap_or(false)
    })
    .await;
    assert!(connected);

    // NGAP_IS_UP surfaces through the status sampled by the CLI
    let port = node.cli_port;
    let up = wait_until(Duration::from_secs(5), || async {
        matches!(
            cli_query(port, "ransim-gnb-1", "status").await,
            Ok(yaml) if yaml.contains("is-ngap-up: true")
        )
    })
    .await;
    assert!(up);

    node.shutdown().await;
}

#[tokio::test]
async fn two_amf_partial_boot_does_not_report_ngap_up() {
    let mut node = GnbNode::start(gnb_config(2), None, true).await.unwrap();
    let mut wire_rx = std::mem::replace(&mut node.sctp_wire_rx, tokio::sync::mpsc::channel(1).1);

    // only the first AMF completes NG Setup
    complete_ng_setup(&node, &mut wire_rx, 1, "AMF1").await;

    let connected = wait_until(Duration::from_secs(5), || async {
        let state = node.ngap_state.lock().await;
        state.amf_contexts[&1].state == AmfState::Connected
    })
    .await;
    assert!(connected);

    // the second AMF never connected: status must stay down
    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = cli_query(node.cli_port, "ransim-gnb-1", "status").await.unwrap();
    assert!(status.contains("is-ngap-up: false"));

    node.shutdown().await;
}

#[tokio::test]
async fn tnl_modification_is_rejected_with_transport_cause() {
    let mut node = GnbNode::start(gnb_config(1), None, false).await.unwrap();
    let mut wire_rx = std::mem::replace(&mut node.sctp_wire_rx, tokio::sync::mpsc::channel(1).1);

    complete_ng_setup(&node, &mut wire_rx, 1, "AMF1").await;

    inject_from_amf(
        &node,
        1,
        0,
        &NgapPdu::AmfConfigurationUpdate(AmfConfigurationUpdate {
            amf_name: None,
            relative_amf_capacity: None,
            served_guami_list: vec![],
            plmn_support_list: vec![],
            tnl_to_add: vec![TnlAssociationItem {
                address: "10.0.0.9".to_string(),
            }],
            tnl_to_remove: vec![],
            tnl_to_update: vec![],
        }),
    )
    .await;

    let (_, pdu) = wait_for_wire_pdu(&mut wire_rx, |pdu| {
        matches!(pdu, NgapPdu::AmfConfigurationUpdateFailure(_))
    })
    .await;

    match pdu {
        NgapPdu::AmfConfigurationUpdateFailure(failure) => {
            assert_eq!(failure.cause, NgapCause::Transport(TransportCause::Unspecified));
        }
        other => panic!("unexpected PDU: {other:?}"),
    }

    node.shutdown().await;
}
