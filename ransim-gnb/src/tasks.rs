//! gNB task framework
//!
//! The gNB is assembled from long-lived cooperating tasks communicating
//! only by typed message passing. Each task runs as an independent async
//! actor with a private mailbox.
//!
//! # Architecture
//!
//! - **App task**: CLI handling, status aggregation, pause coordination
//! - **NGAP task**: AMF contexts, UE contexts, NGAP procedures
//! - **RRC task**: per-UE RRC state, NAS carriage
//! - **GTP task**: user-plane tunnel table
//! - **MR task**: air-interface stub toward UE peers
//! - **SCTP task**: one association per configured AMF
//!
//! # Pause protocol
//!
//! Each task carries a pair of atomic flags (`requested`, `confirmed`).
//! An initiator sets `requested` on every task it wants quiescent, polls
//! `confirmed` at a 10 ms cadence for up to 3 s, samples state, then
//! unpauses unconditionally. A task only honours the request at the top
//! of its loop, between messages, so no mutation is concurrent with a
//! sample. Timer expiries are ordinary messages and are therefore
//! deferred while paused.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use ransim_common::{AirFrame, GnbAirPeer, GnbConfig, NodeListener, OctetString, RrcChannel};
use ransim_ngap::cause::NgapCause;
use ransim_ngap::ies::FiveGSTmsi;

/// Default channel capacity for task message queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Pause confirmation polling cadence.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Total budget for the pause protocol.
pub const PAUSE_CONFIRM_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// Task Message Envelope
// ============================================================================

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

// ============================================================================
// Pause Control
// ============================================================================

/// Per-task pause flag pair.
///
/// The initiator writes `requested`; the owning task is the only writer
/// of `confirmed`, and flips it only between message dispatches.
#[derive(Debug, Default)]
pub struct PauseControl {
    requested: AtomicBool,
    confirmed: AtomicBool,
}

impl PauseControl {
    /// Asks the task to quiesce at its next message boundary.
    pub fn request_pause(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Clears a pause request, resuming the task.
    pub fn request_unpause(&self) {
        self.requested.store(false, Ordering::Release);
    }

    /// True once the task has drained its current message and will not
    /// dispatch another until unpaused.
    pub fn is_pause_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Acquire)
    }

    /// True if a pause has been requested.
    pub fn is_pause_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Callee-side pause gate. Called at the top of a task loop, between
    /// messages: confirms the pause and parks until unpaused.
    pub async fn pause_point(&self) {
        if !self.requested.load(Ordering::Acquire) {
            return;
        }
        self.confirmed.store(true, Ordering::Release);
        while self.requested.load(Ordering::Acquire) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        self.confirmed.store(false, Ordering::Release);
    }

    /// Resolves once a pause has been requested. Used inside task select
    /// loops so an idle task still confirms promptly.
    pub async fn wait_requested(&self) {
        while !self.requested.load(Ordering::Acquire) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Initiator-side wait: polls every [`PAUSE_POLL_INTERVAL`] until every
/// control confirms or [`PAUSE_CONFIRM_TIMEOUT`] elapses. Returns true
/// if all confirmed within the budget.
pub async fn await_pause_confirmations(controls: &[Arc<PauseControl>]) -> bool {
    let deadline = tokio::time::Instant::now() + PAUSE_CONFIRM_TIMEOUT;
    loop {
        if controls.iter().all(|c| c.is_pause_confirmed()) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
    }
}

// ============================================================================
// Task Trait and Handle
// ============================================================================

/// Base trait for all gNB tasks.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop, processing messages until shutdown.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

/// Handle for sending messages to a task and driving its pause flags.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
    pause: Arc<PauseControl>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pause: Arc::clone(&self.pause),
        }
    }
}

impl<T> TaskHandle<T> {
    /// Creates a new task handle from a sender.
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self {
            tx,
            pause: Arc::new(PauseControl::default()),
        }
    }

    /// Sends a message to the task.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends a message without waiting for queue space.
    pub fn try_send(&self, msg: T) -> Result<(), mpsc::error::TrySendError<TaskMessage<T>>> {
        self.tx.try_send(TaskMessage::Message(msg))
    }

    /// Sends a shutdown signal to the task.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    /// Returns true if the task channel is closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// The pause flag pair shared between this handle and the task loop.
    pub fn pause(&self) -> Arc<PauseControl> {
        Arc::clone(&self.pause)
    }

    /// Asks the task to quiesce.
    pub fn request_pause(&self) {
        self.pause.request_pause();
    }

    /// Resumes the task.
    pub fn request_unpause(&self) {
        self.pause.request_unpause();
    }

    /// True once the task confirmed the pause.
    pub fn is_pause_confirmed(&self) -> bool {
        self.pause.is_pause_confirmed()
    }
}

/// Schedules a one-shot timer: after `delay`, `make(timer_id)` is pushed
/// to the owning task's mailbox. Expiry is an ordinary message, so a
/// paused task sees it only after unpause.
pub fn schedule_timer<T, F>(handle: TaskHandle<T>, timer_id: i32, delay: Duration, make: F)
where
    T: Send + 'static,
    F: FnOnce(i32) -> T + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = handle.send(make(timer_id)).await;
    });
}

// ============================================================================
// App Task Messages
// ============================================================================

/// Messages for the Application task.
#[derive(Debug)]
pub enum AppMessage {
    /// Status update from another task
    StatusUpdate(GnbStatusUpdate),
    /// CLI command received from the CLI server task
    CliCommand {
        /// Parsed command
        command: GnbCliCommand,
        /// Requester address for the response
        client_addr: SocketAddr,
    },
}

/// Status updates flowing to the App task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GnbStatusUpdate {
    /// NGAP reached (or lost) full initialization toward all AMFs
    NgapIsUp(bool),
}

/// CLI commands addressed to a gNB node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GnbCliCommand {
    /// Show gNB status
    Status,
    /// Show gNB configuration
    Info,
    /// List AMF contexts
    AmfList,
    /// Show one AMF context
    AmfInfo {
        /// AMF context id
        amf_id: i32,
    },
    /// List UE contexts
    UeList,
    /// Count UE contexts
    UeCount,
    /// Trigger the handover preparation hook
    HandoverPrepare {
        /// UE id
        ue_id: i32,
    },
    /// Trigger an Xn handover path switch
    Handover {
        /// Target AMF context id
        as_amf_id: i32,
        /// AMF UE NGAP ID (sent only when > 0)
        amf_ue_ngap_id: i64,
        /// RAN UE NGAP ID
        ran_ue_ngap_id: i64,
        /// UE context id
        ctxt_id: i32,
        /// Uplink SCTP stream
        uplink_stream: u16,
        /// AMF name for event emission
        amf_name: String,
    },
}

// ============================================================================
// NGAP Task Messages
// ============================================================================

/// Messages for the NGAP task.
#[derive(Debug)]
pub enum NgapMessage {
    /// SCTP association established toward an AMF
    AssociationUp {
        /// AMF context id (same as SCTP client id)
        amf_id: i32,
        /// Number of inbound streams
        in_streams: u16,
        /// Number of outbound streams
        out_streams: u16,
    },
    /// SCTP association lost
    AssociationDown {
        /// AMF context id
        amf_id: i32,
    },
    /// NGAP PDU received from an AMF
    ReceivePdu {
        /// AMF context id
        amf_id: i32,
        /// SCTP stream the PDU arrived on
        stream: u16,
        /// Encoded PDU
        pdu: OctetString,
    },
    /// Uplink NAS delivery from RRC
    UplinkNasDelivery {
        /// UE id
        ue_id: i32,
        /// Encoded NAS PDU
        pdu: OctetString,
    },
    /// Radio link failure notification from RRC
    RadioLinkFailure {
        /// UE id
        ue_id: i32,
    },
    /// Handover preparation hook (CLI)
    HandoverPreparation {
        /// UE id
        ue_id: i32,
    },
    /// Xn handover path switch trigger (CLI)
    XnHandover {
        /// Target AMF context id
        as_amf_id: i32,
        /// AMF UE NGAP ID (sent only when > 0)
        amf_ue_ngap_id: i64,
        /// RAN UE NGAP ID
        ran_ue_ngap_id: i64,
        /// UE context id
        ctxt_id: i32,
        /// Uplink SCTP stream
        uplink_stream: u16,
        /// AMF name for event emission
        amf_name: String,
    },
    /// Parameterless Xn handover debug entry (requires `debug_stubs`)
    XnHandoverDebug,
    /// Send an Error Indication toward an AMF
    SendErrorIndication {
        /// AMF context id
        amf_id: i32,
        /// Cause to report
        cause: NgapCause,
        /// UE id; UE-associated when > 0
        ue_id: i32,
    },
}

// ============================================================================
// RRC Task Messages
// ============================================================================

/// Messages for the RRC task.
#[derive(Debug)]
pub enum RrcMessage {
    /// NGAP layer finished initializing toward every AMF
    NgapLayerInitialized,
    /// Downlink NAS delivery (from NGAP)
    NasDelivery {
        /// UE id
        ue_id: i32,
        /// Encoded NAS PDU
        pdu: OctetString,
    },
    /// Send a standalone RRC Reconfiguration to a UE
    PerformReconfiguration {
        /// UE id
        ue_id: i32,
    },
    /// Release the RRC connection (from NGAP)
    AnRelease {
        /// UE id
        ue_id: i32,
    },
    /// Uplink RRC PDU (from MR)
    UplinkRrc {
        /// UE id
        ue_id: i32,
        /// RRC channel
        channel: RrcChannel,
        /// Encoded RRC PDU
        pdu: OctetString,
    },
    /// Radio link failure detected (from MR)
    RadioLinkFailure {
        /// UE id
        ue_id: i32,
    },
    /// Page a UE (from NGAP)
    Paging {
        /// Paged identity
        five_g_s_tmsi: FiveGSTmsi,
    },
}

// ============================================================================
// GTP Task Messages
// ============================================================================

/// Messages for the GTP task.
#[derive(Debug)]
pub enum GtpMessage {
    /// Install a PDU session tunnel pair
    SessionCreate {
        /// Session and tunnel description
        session: ransim_gtp::PduSession,
    },
    /// Release one PDU session
    SessionRelease {
        /// UE id
        ue_id: i32,
        /// PDU session id
        psi: u8,
    },
    /// Release every session of a UE
    UeContextRelease {
        /// UE id
        ue_id: i32,
    },
    /// Uplink user data from the MR task
    UplinkData {
        /// UE id
        ue_id: i32,
        /// PDU session id
        psi: i32,
        /// IP packet
        pdu: OctetString,
    },
    /// Downlink GTP-U datagram from the UPF side
    DownlinkDatagram {
        /// Raw datagram
        datagram: OctetString,
    },
}

// ============================================================================
// MR Task Messages
// ============================================================================

/// Messages for the MR (air interface stub) task.
#[derive(Debug)]
pub enum MrMessage {
    /// A UE connected over the air link
    UeConnected {
        /// Peer record with the downlink sender
        peer: GnbAirPeer,
    },
    /// A UE link was lost
    UeDisconnected {
        /// UE id
        ue_id: i32,
    },
    /// Downlink RRC PDU (from RRC)
    DownlinkRrc {
        /// UE id
        ue_id: i32,
        /// RRC channel
        channel: RrcChannel,
        /// Encoded RRC PDU
        pdu: OctetString,
    },
    /// Broadcast PCCH PDU to every connected UE (from RRC)
    DownlinkPcch {
        /// Encoded PCCH PDU
        pdu: OctetString,
    },
    /// Downlink user data (from GTP)
    DownlinkData {
        /// UE id
        ue_id: i32,
        /// PDU session id
        psi: i32,
        /// IP packet
        pdu: OctetString,
    },
}

// ============================================================================
// SCTP Task Messages
// ============================================================================

/// Messages for the SCTP task.
#[derive(Debug)]
pub enum SctpMessage {
    /// Request to establish an association
    ConnectionRequest {
        /// Client id (AMF context id)
        amf_id: i32,
        /// Remote address
        address: std::net::IpAddr,
        /// Remote port
        port: u16,
    },
    /// Close an association
    ConnectionClose {
        /// Client id
        amf_id: i32,
    },
    /// Association established (from the transport)
    AssociationSetup {
        /// Client id
        amf_id: i32,
        /// Number of inbound streams
        in_streams: u16,
        /// Number of outbound streams
        out_streams: u16,
    },
    /// Association lost (from the transport)
    AssociationShutdown {
        /// Client id
        amf_id: i32,
    },
    /// Payload received from the peer
    ReceiveMessage {
        /// Client id
        amf_id: i32,
        /// SCTP stream id
        stream: u16,
        /// Payload
        buffer: OctetString,
    },
    /// Send a payload to the peer
    SendMessage {
        /// Client id
        amf_id: i32,
        /// SCTP stream id
        stream: u16,
        /// Payload
        buffer: OctetString,
    },
}

// ============================================================================
// gNB Task Base
// ============================================================================

/// Frozen record of task handles shared by every gNB task.
///
/// Constructed once at boot; replaces direct task-to-task references.
#[derive(Clone)]
pub struct GnbTaskBase {
    /// gNB configuration
    pub config: Arc<GnbConfig>,
    /// Optional observability listener
    pub listener: Option<Arc<dyn NodeListener>>,
    /// Handle to the App task
    pub app_tx: TaskHandle<AppMessage>,
    /// Handle to the NGAP task
    pub ngap_tx: TaskHandle<NgapMessage>,
    /// Handle to the RRC task
    pub rrc_tx: TaskHandle<RrcMessage>,
    /// Handle to the GTP task
    pub gtp_tx: TaskHandle<GtpMessage>,
    /// Handle to the MR task
    pub mr_tx: TaskHandle<MrMessage>,
    /// Handle to the SCTP task
    pub sctp_tx: TaskHandle<SctpMessage>,
}

/// Mailbox receivers matching a [`GnbTaskBase`].
pub struct GnbTaskReceivers {
    /// App task mailbox
    pub app_rx: mpsc::Receiver<TaskMessage<AppMessage>>,
    /// NGAP task mailbox
    pub ngap_rx: mpsc::Receiver<TaskMessage<NgapMessage>>,
    /// RRC task mailbox
    pub rrc_rx: mpsc::Receiver<TaskMessage<RrcMessage>>,
    /// GTP task mailbox
    pub gtp_rx: mpsc::Receiver<TaskMessage<GtpMessage>>,
    /// MR task mailbox
    pub mr_rx: mpsc::Receiver<TaskMessage<MrMessage>>,
    /// SCTP task mailbox
    pub sctp_rx: mpsc::Receiver<TaskMessage<SctpMessage>>,
}

impl GnbTaskBase {
    /// Creates the task base and the matching receivers.
    pub fn new(
        config: GnbConfig,
        listener: Option<Arc<dyn NodeListener>>,
        channel_capacity: usize,
    ) -> (Self, GnbTaskReceivers) {
        let (app_tx, app_rx) = mpsc::channel(channel_capacity);
        let (ngap_tx, ngap_rx) = mpsc::channel(channel_capacity);
        let (rrc_tx, rrc_rx) = mpsc::channel(channel_capacity);
        let (gtp_tx, gtp_rx) = mpsc::channel(channel_capacity);
        let (mr_tx, mr_rx) = mpsc::channel(channel_capacity);
        let (sctp_tx, sctp_rx) = mpsc::channel(channel_capacity);

        let base = Self {
            config: Arc::new(config),
            listener,
            app_tx: TaskHandle::new(app_tx),
            ngap_tx: TaskHandle::new(ngap_tx),
            rrc_tx: TaskHandle::new(rrc_tx),
            gtp_tx: TaskHandle::new(gtp_tx),
            mr_tx: TaskHandle::new(mr_tx),
            sctp_tx: TaskHandle::new(sctp_tx),
        };

        let receivers = GnbTaskReceivers {
            app_rx,
            ngap_rx,
            rrc_rx,
            gtp_rx,
            mr_rx,
            sctp_rx,
        };

        (base, receivers)
    }

    /// The five worker tasks the CLI handler quiesces before sampling.
    pub fn worker_pause_controls(&self) -> Vec<Arc<PauseControl>> {
        vec![
            self.sctp_tx.pause(),
            self.gtp_tx.pause(),
            self.mr_tx.pause(),
            self.ngap_tx.pause(),
            self.rrc_tx.pause(),
        ]
    }

    /// Sends shutdown signals to all tasks.
    pub async fn shutdown_all(&self) {
        let _ = self.app_tx.shutdown().await;
        let _ = self.ngap_tx.shutdown().await;
        let _ = self.rrc_tx.shutdown().await;
        let _ = self.gtp_tx.shutdown().await;
        let _ = self.mr_tx.shutdown().await;
        let _ = self.sctp_tx.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
