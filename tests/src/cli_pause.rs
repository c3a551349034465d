//! CLI sampling under the pause protocol

use std::time::Duration;

use ransim_common::OctetString;
use ransim_gnb::tasks::NgapMessage;
use ransim_gnb::GnbNode;

use crate::test_utils::*;

#[tokio::test]
async fn ue_count_pauses_workers_and_returns_cardinality() {
    let mut node = GnbNode::start(gnb_config(1), None, true).await.unwrap();
    let mut wire_rx = std::mem::replace(&mut node.sctp_wire_rx, tokio::sync::mpsc::channel(1).1);

    complete_ng_setup(&node, &mut wire_rx, 1, "AMF1").await;

    // three UEs deliver their first uplink NAS, creating three contexts
    for ue_id in 1..=3 {
        node.base
            .ngap_tx
            .send(NgapMessage::UplinkNasDelivery {
                ue_id,
                pdu: OctetString::from_slice(&[0x7e, 0x00, 0x41]),
            })
            .await
            .unwrap();
    }

    let populated = wait_until(Duration::from_secs(5), || async {
        node.ngap_state.lock().await.ue_contexts.len() == 3
    })
    .await;
    assert!(populated);

    // watch the worker pause flags while the command is in flight; every
    // worker must be observed confirmed at some point
    let controls = node.base.worker_pause_controls();
    let watcher = tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut seen = vec![false; controls.len()];
        loop {
            for (index, control) in controls.iter().enumerate() {
                if control.is_pause_confirmed() {
                    seen[index] = true;
                }
            }
            if seen.iter().all(|&s| s) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::task::yield_now().await;
        }
    });

    let response = cli_query(node.cli_port, "ransim-gnb-1", "ue-count").await.unwrap();
    assert_eq!(response.trim(), "3");

    // every worker confirmed a pause during the command...
    assert!(watcher.await.unwrap());

    // ...and everything is unpaused afterwards
    for control in node.base.worker_pause_controls() {
        assert!(!control.is_pause_requested());
    }

    // the workers keep processing after the sample
    node.base
        .ngap_tx
        .send(NgapMessage::UplinkNasDelivery {
            ue_id: 4,
            pdu: OctetString::from_slice(&[0x7e, 0x00, 0x41]),
        })
        .await
        .unwrap();
    let grew = wait_until(Duration::from_secs(5), || async {
        node.ngap_state.lock().await.ue_contexts.len() == 4
    })
    .await;
    assert!(grew);

    node.shutdown().await;
}

#[tokio::test]
async fn unknown_amf_id_yields_operator_error() {
    let node = GnbNode::start(gnb_config(1), None, true).await.unwrap();

    let error = cli_query(node.cli_port, "ransim-gnb-1", "amf-info 42")
        .await
        .unwrap_err();
    assert_eq!(error, "AMF not found with given ID");

    node.shutdown().await;
}

#[tokio::test]
async fn parse_failure_returns_human_readable_error() {
    let node = GnbNode::start(gnb_config(1), None, true).await.unwrap();

    let error = cli_query(node.cli_port, "ransim-gnb-1", "frobnicate")
        .await
        .unwrap_err();
    assert!(error.contains("Unknown command"));

    let help = cli_query(node.cli_port, "ransim-gnb-1", "help").await.unwrap();
    assert!(help.contains("ue-count"));

    node.shutdown().await;
}
