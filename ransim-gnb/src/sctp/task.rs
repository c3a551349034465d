//! SCTP task implementation
//!
//! Tracks one association per configured AMF. Outgoing payloads are
//! handed to the wire channel; the socket layer (or a test harness)
//! feeds association events and received payloads back in as messages.

use std::collections::HashMap;
use std::net::IpAddr;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ransim_common::OctetString;

use crate::tasks::{GnbTaskBase, NgapMessage, SctpMessage, Task, TaskMessage};

/// A payload leaving the node toward an AMF.
#[derive(Debug, Clone)]
pub struct SctpWireTx {
    /// AMF client id
    pub amf_id: i32,
    /// SCTP stream
    pub stream: u16,
    /// Payload bytes
    pub buffer: OctetString,
}

#[derive(Debug)]
struct AssociationEntry {
    address: IpAddr,
    port: u16,
    up: bool,
    in_streams: u16,
    out_streams: u16,
}

/// SCTP task owning the per-AMF association table.
pub struct SctpTask {
    task_base: GnbTaskBase,
    associations: HashMap<i32, AssociationEntry>,
    wire_tx: mpsc::Sender<SctpWireTx>,
}

impl SctpTask {
    /// Creates the SCTP task; `wire_tx` carries outgoing payloads to the
    /// socket layer.
    pub fn new(task_base: GnbTaskBase, wire_tx: mpsc::Sender<SctpWireTx>) -> Self {
        Self {
            task_base,
            associations: HashMap::new(),
            wire_tx,
        }
    }

    fn handle_connection_request(&mut self, amf_id: i32, address: IpAddr, port: u16) {
        info!("Connecting to AMF[{}] at {}:{}", amf_id, address, port);
        self.associations.insert(
            amf_id,
            AssociationEntry {
                address,
                port,
                up: false,
                in_streams: 0,
                out_streams: 0,
            },
        );
    }

    fn handle_connection_close(&mut self, amf_id: i32) {
        if let Some(entry) = self.associations.remove(&amf_id) {
            info!(
                "Closed association toward AMF[{}] at {}:{}",
                amf_id, entry.address, entry.port
            );
        }
    }

    async fn handle_association_setup(&mut self, amf_id: i32, in_streams: u16, out_streams: u16) {
        match self.associations.get_mut(&amf_id) {
            Some(entry) => {
                entry.up = true;
                entry.in_streams = in_streams;
                entry.out_streams = out_streams;
            }
            None => {
                warn!("Association setup for unknown AMF[{}]", amf_id);
                return;
            }
        }

        let msg = NgapMessage::AssociationUp {
            amf_id,
            in_streams,
            out_streams,
        };
        if let Err(e) = self.task_base.ngap_tx.send(msg).await {
            error!("Failed to report association up to NGAP: {}", e);
        }
    }

    async fn handle_association_shutdown(&mut self, amf_id: i32) {
        if let Some(entry) = self.associations.get_mut(&amf_id) {
            entry.up = false;
        }

        let msg = NgapMessage::AssociationDown { amf_id };
        if let Err(e) = self.task_base.ngap_tx.send(msg).await {
            error!("Failed to report association down to NGAP: {}", e);
        }
    }

    async fn handle_receive(&mut self, amf_id: i32, stream: u16, buffer: OctetString) {
        let stream = if self.task_base.config.ignore_stream_ids {
            0
        } else {
            stream
        };

        let msg = NgapMessage::ReceivePdu {
            amf_id,
            stream,
            pdu: buffer,
        };
        if let Err(e) = self.task_base.ngap_tx.send(msg).await {
            error!("Failed to deliver payload to NGAP: {}", e);
        }
    }

    async fn handle_send(&mut self, amf_id: i32, stream: u16, buffer: OctetString) {
        let up = self.associations.get(&amf_id).map(|a| a.up).unwrap_or(false);
        if !up {
            warn!("Send requested on down association toward AMF[{}], dropped", amf_id);
            return;
        }

        debug!(
            "Sending {} bytes to AMF[{}] on stream {}",
            buffer.len(),
            amf_id,
            stream
        );
        let wire = SctpWireTx {
            amf_id,
            stream,
            buffer,
        };
        if self.wire_tx.send(wire).await.is_err() {
            error!("SCTP wire channel closed");
        }
    }

    async fn dispatch(&mut self, msg: SctpMessage) {
        match msg {
            SctpMessage::ConnectionRequest { amf_id, address, port } => {
                self.handle_connection_request(amf_id, address, port);
            }
            SctpMessage::ConnectionClose { amf_id } => self.handle_connection_close(amf_id),
            SctpMessage::AssociationSetup {
                amf_id,
                in_streams,
                out_streams,
            } => {
                self.handle_association_setup(amf_id, in_streams, out_streams).await;
            }
            SctpMessage::AssociationShutdown { amf_id } => {
                self.handle_association_shutdown(amf_id).await;
            }
            SctpMessage::ReceiveMessage { amf_id, stream, buffer } => {
                self.handle_receive(amf_id, stream, buffer).await;
            }
            SctpMessage::SendMessage { amf_id, stream, buffer } => {
                self.handle_send(amf_id, stream, buffer).await;
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for SctpTask {
    type Message = SctpMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("SCTP task started");
        let pause = self.task_base.sctp_tx.pause();

        // Open one association per configured AMF.
        let amf_targets: Vec<(i32, _, _)> = self
            .task_base
            .config
            .amf_configs
            .iter()
            .enumerate()
            .map(|(index, amf)| (index as i32 + 1, amf.address, amf.port))
            .collect();
        for (amf_id, address, port) in amf_targets {
            self.handle_connection_request(amf_id, address, port);
        }

        loop {
            pause.pause_point().await;
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(msg)) => self.dispatch(msg).await,
                    Some(TaskMessage::Shutdown) | None => break,
                },
                _ = pause.wait_requested() => continue,
            }
        }

        info!("SCTP task stopped with {} associations", self.associations.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{GnbTaskReceivers, DEFAULT_CHANNEL_CAPACITY};
    use ransim_common::{AmfConfig, GnbConfig, PagingDrx, Plmn};

    fn test_config(ignore_stream_ids: bool) -> GnbConfig {
        GnbConfig {
            gnb_id: 1,
            gnb_id_length: 32,
            name: "test-gnb".to_string(),
            plmn: Plmn::new(901, 70, false),
            tac: 1,
            nci: 0x10,
            nssais: vec![],
            paging_drx: PagingDrx::V128,
            amf_configs: vec![AmfConfig::new("127.0.0.1".parse().unwrap(), 38412)],
            ignore_stream_ids,
            debug_stubs: false,
        }
    }

    fn setup(ignore_stream_ids: bool) -> (SctpTask, GnbTaskReceivers, mpsc::Receiver<SctpWireTx>) {
        let (base, receivers) =
            GnbTaskBase::new(test_config(ignore_stream_ids), None, DEFAULT_CHANNEL_CAPACITY);
        let (wire_tx, wire_rx) = mpsc::channel(16);
        (SctpTask::new(base, wire_tx), receivers, wire_rx)
    }

    #[tokio::test]
    async fn test_association_setup_forwarded_to_ngap() {
        let (mut task, mut receivers, _wire_rx) = setup(false);
        task.handle_connection_request(1, "127.0.0.1".parse().unwrap(), 38412);
        task.handle_association_setup(1, 2, 2).await;

        match receivers.ngap_rx.recv().await {
            Some(TaskMessage::Message(NgapMessage::AssociationUp {
                amf_id,
                in_streams,
                out_streams,
            })) => {
                assert_eq!((amf_id, in_streams, out_streams), (1, 2, 2));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_dropped_without_association() {
        let (mut task, _receivers, mut wire_rx) = setup(false);
        task.handle_send(1, 0, OctetString::from_slice(&[1, 2, 3])).await;
        assert!(wire_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_emitted_on_wire() {
        let (mut task, _receivers, mut wire_rx) = setup(false);
        task.handle_connection_request(1, "127.0.0.1".parse().unwrap(), 38412);
        task.handle_association_setup(1, 2, 2).await;

        task.handle_send(1, 1, OctetString::from_slice(&[0xde, 0xad])).await;

        let wire = wire_rx.recv().await.unwrap();
        assert_eq!(wire.amf_id, 1);
        assert_eq!(wire.stream, 1);
        assert_eq!(wire.buffer.data(), &[0xde, 0xad]);
    }

    #[tokio::test]
    async fn test_ignore_stream_ids_flattens_streams() {
        let (mut task, mut receivers, _wire_rx) = setup(true);
        task.handle_receive(1, 7, OctetString::from_slice(&[0x01])).await;

        match receivers.ngap_rx.recv().await {
            Some(TaskMessage::Message(NgapMessage::ReceivePdu { stream, .. })) => {
                assert_eq!(stream, 0);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
