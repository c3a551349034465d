//! Air interface stub between gNB and UE nodes
//!
//! The MR tasks on both sides exchange frames over in-process channels.
//! A frame is either an RRC-channel PDU or a PSI-tagged user-plane PDU.

use tokio::sync::mpsc;

use crate::octet_string::OctetString;

/// Logical RRC channel of an air frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcChannel {
    /// Uplink common control channel
    UlCcch,
    /// Uplink dedicated control channel
    UlDcch,
    /// Downlink common control channel
    DlCcch,
    /// Downlink dedicated control channel
    DlDcch,
    /// Paging control channel
    Pcch,
}

/// Payload of an air frame.
#[derive(Debug, Clone)]
pub enum AirPdu {
    /// RRC-channel signalling PDU
    Rrc {
        /// RRC channel the PDU belongs to
        channel: RrcChannel,
        /// Encoded RRC PDU
        pdu: OctetString,
    },
    /// User-plane data PDU tagged with its PDU session
    Data {
        /// PDU session identity
        psi: i32,
        /// IP packet
        pdu: OctetString,
    },
}

/// A frame on the air interface, tagged with the UE it belongs to.
#[derive(Debug, Clone)]
pub struct AirFrame {
    /// UE identity as known to the gNB
    pub ue_id: i32,
    /// Frame payload
    pub pdu: AirPdu,
}

/// UE-side endpoint of an air link.
#[derive(Debug)]
pub struct UeAirEndpoint {
    /// UE identity assigned for this link
    pub ue_id: i32,
    /// Sender toward the gNB MR task
    pub uplink: mpsc::Sender<AirFrame>,
    /// Receiver for downlink frames from the gNB
    pub downlink: mpsc::Receiver<AirFrame>,
}

/// gNB-side record of a connected UE link.
#[derive(Debug, Clone)]
pub struct GnbAirPeer {
    /// UE identity assigned for this link
    pub ue_id: i32,
    /// UE node name (for status displays)
    pub ue_name: String,
    /// Sender for downlink frames toward the UE
    pub downlink: mpsc::Sender<AirFrame>,
}

/// Creates a UE<->gNB air link.
///
/// `gnb_uplink` is the shared sender into the gNB MR task's uplink inbox;
/// the returned peer record is handed to the gNB MR task, the endpoint to
/// the UE MR task.
pub fn link(
    ue_id: i32,
    ue_name: impl Into<String>,
    gnb_uplink: mpsc::Sender<AirFrame>,
    capacity: usize,
) -> (GnbAirPeer, UeAirEndpoint) {
    let (downlink_tx, downlink_rx) = mpsc::channel(capacity);
    (
        GnbAirPeer {
            ue_id,
            ue_name: ue_name.into(),
            downlink: downlink_tx,
        },
        UeAirEndpoint {
            ue_id,
            uplink: gnb_uplink,
            downlink: downlink_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_air_link_round_trip() {
        let (uplink_tx, mut uplink_rx) = mpsc::channel(8);
        let (peer, mut endpoint) = link(7, "imsi-1", uplink_tx, 8);

        endpoint
            .uplink
            .send(AirFrame {
                ue_id: endpoint.ue_id,
                pdu: AirPdu::Rrc {
                    channel: RrcChannel::UlDcch,
                    pdu: OctetString::from_slice(&[0x7e, 0x00]),
                },
            })
            .await
            .unwrap();

        let frame = uplink_rx.recv().await.unwrap();
        assert_eq!(frame.ue_id, 7);

        peer.downlink
            .send(AirFrame {
                ue_id: 7,
                pdu: AirPdu::Data {
                    psi: 1,
                    pdu: OctetString::from_slice(&[0x45]),
                },
            })
            .await
            .unwrap();

        let frame = endpoint.downlink.recv().await.unwrap();
        assert!(matches!(frame.pdu, AirPdu::Data { psi: 1, .. }));
    }
}
