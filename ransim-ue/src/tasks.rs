//! UE task framework
//!
//! The UE is assembled from long-lived cooperating tasks communicating
//! only by typed message passing, plus a dynamically created TUN task
//! per established PDU session.
//!
//! # Architecture
//!
//! - **App task**: TUN session array, CLI handling, switch-off
//! - **NAS task**: 5GMM and 5GSM state machines, NAS timers
//! - **RRC task**: cell attachment, NAS carriage over DCCH
//! - **MR task**: air-interface stub toward the gNB
//!
//! The pause protocol and timer semantics match the gNB runtime: pause
//! flags are honoured only between message dispatches, and timer expiry
//! is an ordinary message, deferred while paused.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use ransim_common::{
    NodeListener, OctetString, PduSessionType, RrcChannel, UeAirEndpoint, UeConfig,
};

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

/// Per-task pause flag pair; see the gNB runtime for the protocol.
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

    /// Callee-side pause gate between message dispatches.
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

    /// Resolves once a pause has been requested.
    pub async fn wait_requested(&self) {
        while !self.requested.load(Ordering::Acquire) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Initiator-side wait with the 3 s budget and 10 ms cadence.
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

/// Base trait for all UE tasks.
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
}

/// Schedules a one-shot timer delivered as a mailbox message.
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

/// Summary of an established PDU session, as reported to the App task.
#[derive(Debug, Clone)]
pub struct PduSessionSummary {
    /// PDU session identity (1..=15)
    pub psi: u8,
    /// Session type
    pub session_type: PduSessionType,
    /// Allocated PDU address
    pub address: Ipv4Addr,
}

/// Status updates flowing from NAS to the App task.
#[derive(Debug, Clone)]
pub enum UeStatusUpdate {
    /// A PDU session was established
    SessionEstablishment {
        /// Session summary
        session: PduSessionSummary,
    },
    /// A PDU session was released
    SessionRelease {
        /// PDU session identity
        psi: u8,
    },
}

/// CLI commands addressed to a UE node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UeCliCommand {
    /// Show UE configuration
    Info,
    /// Show UE status (MM registers, sessions)
    Status,
    /// Show NAS timers
    Timers,
    /// Trigger de-registration
    DeRegister {
        /// Switch-off de-registration
        is_switch_off: bool,
        /// De-registration due to disabling 5GS services
        due_to_disable_5g: bool,
    },
}

/// Messages for the Application task.
#[derive(Debug)]
pub enum AppMessage {
    /// Downlink user data from MR, routed to the session's TUN task
    MrDataDelivery {
        /// PDU session identity
        psi: i32,
        /// IP packet
        data: OctetString,
    },
    /// Uplink user data from a TUN task, forwarded to MR
    TunDataDelivery {
        /// PDU session identity
        psi: i32,
        /// IP packet
        data: OctetString,
    },
    /// A TUN task failed
    TunError {
        /// PDU session identity
        psi: i32,
        /// Error description
        error: String,
    },
    /// NAS asks the node to switch off (after de-registration)
    PerformSwitchOff,
    /// Status update from NAS
    StatusUpdate(UeStatusUpdate),
    /// CLI command received from the CLI server task
    CliCommand {
        /// Parsed command
        command: UeCliCommand,
        /// Requester address for the response
        client_addr: SocketAddr,
    },
    /// One-shot timer expiry
    TimerExpired {
        /// Timer identity
        timer_id: i32,
    },
}

// ============================================================================
// NAS Task Messages
// ============================================================================

/// Messages for the NAS task.
#[derive(Debug)]
pub enum NasMessage {
    /// Downlink NAS PDU (from RRC)
    NasDelivery {
        /// Encoded NAS PDU
        pdu: OctetString,
    },
    /// RRC connection established (from RRC)
    RrcConnectionSetup,
    /// RRC connection released (from RRC)
    RrcConnectionRelease,
    /// Radio link failure (from RRC)
    RadioLinkFailure,
    /// Paging indication (from RRC)
    Paging,
    /// Run one MM cycle (internal)
    PerformMmCycle,
    /// Periodic NAS timer tick (internal)
    TimerTick,
    /// Initiate de-registration (from App/CLI)
    DeRegister {
        /// Switch-off de-registration
        is_switch_off: bool,
        /// De-registration due to disabling 5GS services
        due_to_disable_5g: bool,
    },
    /// Establish the configured PDU sessions (internal, post-registration)
    EstablishInitialSessions,
}

// ============================================================================
// RRC Task Messages
// ============================================================================

/// Messages for the RRC task.
#[derive(Debug)]
pub enum RrcMessage {
    /// Search for a suitable cell (from NAS)
    PlmnSearchRequest,
    /// Uplink NAS delivery (from NAS)
    UplinkNasDelivery {
        /// Encoded NAS PDU
        pdu: OctetString,
    },
    /// Release the connection locally (from NAS)
    LocalReleaseConnection,
    /// A cell answered the search (from MR)
    CellFound,
    /// Downlink RRC PDU (from MR)
    DownlinkRrcDelivery {
        /// RRC channel
        channel: RrcChannel,
        /// Encoded RRC PDU
        pdu: OctetString,
    },
    /// The air link failed (from MR)
    RadioLinkFailure,
}

// ============================================================================
// MR Task Messages
// ============================================================================

/// Messages for the MR (air interface stub) task.
#[derive(Debug)]
pub enum MrMessage {
    /// Attach to a cell's air link
    ConnectCell {
        /// Link endpoint toward the gNB
        endpoint: UeAirEndpoint,
    },
    /// Probe for a cell (from RRC)
    PlmnSearch,
    /// Uplink RRC PDU (from RRC)
    UplinkRrc {
        /// RRC channel
        channel: RrcChannel,
        /// Encoded RRC PDU
        pdu: OctetString,
    },
    /// Uplink user data (from App)
    UplinkData {
        /// PDU session identity
        psi: i32,
        /// IP packet
        data: OctetString,
    },
    /// A frame arrived on the downlink (internal, from the link pump)
    DownlinkFrame {
        /// The received frame
        frame: ransim_common::AirFrame,
    },
    /// The air link closed (internal, from the link pump)
    LinkLost,
}

// ============================================================================
// TUN Task Messages
// ============================================================================

/// Messages for a per-session TUN task.
#[derive(Debug)]
pub enum TunMessage {
    /// Downlink IP packet to write to the device
    DownlinkData {
        /// IP packet
        data: OctetString,
    },
}

// ============================================================================
// UE Task Base
// ============================================================================

/// Frozen record of task handles shared by every UE task.
#[derive(Clone)]
pub struct UeTaskBase {
    /// UE configuration
    pub config: Arc<UeConfig>,
    /// Optional observability listener
    pub listener: Option<Arc<dyn NodeListener>>,
    /// Handle to the App task
    pub app_tx: TaskHandle<AppMessage>,
    /// Handle to the NAS task
    pub nas_tx: TaskHandle<NasMessage>,
    /// Handle to the RRC task
    pub rrc_tx: TaskHandle<RrcMessage>,
    /// Handle to the MR task
    pub mr_tx: TaskHandle<MrMessage>,
}

/// Mailbox receivers matching a [`UeTaskBase`].
pub struct UeTaskReceivers {
    /// App task mailbox
    pub app_rx: mpsc::Receiver<TaskMessage<AppMessage>>,
    /// NAS task mailbox
    pub nas_rx: mpsc::Receiver<TaskMessage<NasMessage>>,
    /// RRC task mailbox
    pub rrc_rx: mpsc::Receiver<TaskMessage<RrcMessage>>,
    /// MR task mailbox
    pub mr_rx: mpsc::Receiver<TaskMessage<MrMessage>>,
}

impl UeTaskBase {
    /// Creates the task base and the matching receivers.
    pub fn new(
        config: UeConfig,
        listener: Option<Arc<dyn NodeListener>>,
        channel_capacity: usize,
    ) -> (Self, UeTaskReceivers) {
        let (app_tx, app_rx) = mpsc::channel(channel_capacity);
        let (nas_tx, nas_rx) = mpsc::channel(channel_capacity);
        let (rrc_tx, rrc_rx) = mpsc::channel(channel_capacity);
        let (mr_tx, mr_rx) = mpsc::channel(channel_capacity);

        let base = Self {
            config: Arc::new(config),
            listener,
            app_tx: TaskHandle::new(app_tx),
            nas_tx: TaskHandle::new(nas_tx),
            rrc_tx: TaskHandle::new(rrc_tx),
            mr_tx: TaskHandle::new(mr_tx),
        };

        let receivers = UeTaskReceivers {
            app_rx,
            nas_rx,
            rrc_rx,
            mr_rx,
        };

        (base, receivers)
    }

    /// The worker tasks the UE CLI handler quiesces before sampling.
    pub fn worker_pause_controls(&self) -> Vec<Arc<PauseControl>> {
        vec![self.nas_tx.pause(), self.rrc_tx.pause(), self.mr_tx.pause()]
    }

    /// Sends shutdown signals to all tasks.
    pub async fn shutdown_all(&self) {
        let _ = self.app_tx.shutdown().await;
        let _ = self.nas_tx.shutdown().await;
        let _ = self.rrc_tx.shutdown().await;
        let _ = self.mr_tx.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ransim_common::Plmn;

    fn test_config() -> UeConfig {
        UeConfig {
            supi: Some("imsi-901700000000001".to_string()),
            imei: None,
            imeisv: None,
            plmn: Plmn::new(901, 70, false),
            nssais: vec![],
            configure_routing: false,
            auto_behaviour: true,
            sessions: vec![],
            tun_name_prefix: "ransimtun".to_string(),
        }
    }

    #[tokio::test]
    async fn test_task_base_creation() {
        let (base, receivers) = UeTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        assert!(!base.nas_tx.is_closed());
        assert_eq!(base.worker_pause_controls().len(), 3);
        drop(receivers);
        assert!(base.nas_tx.is_closed());
    }

    #[tokio::test]
    async fn test_nas_message_delivery() {
        let (base, mut receivers) = UeTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        base.nas_tx.send(NasMessage::PerformMmCycle).await.unwrap();
        match receivers.nas_rx.recv().await {
            Some(TaskMessage::Message(NasMessage::PerformMmCycle)) => {}
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timer_expiry_deferred_while_paused() {
        let (base, mut receivers) = UeTaskBase::new(test_config(), None, DEFAULT_CHANNEL_CAPACITY);
        let pause = base.app_tx.pause();

        schedule_timer(
            base.app_tx.clone(),
            1,
            Duration::from_millis(5),
            |timer_id| AppMessage::TimerExpired { timer_id },
        );

        // a paused task does not dispatch the expiry...
        pause.request_pause();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // ...but the message is waiting in the mailbox after unpause
        pause.request_unpause();
        match receivers.app_rx.recv().await {
            Some(TaskMessage::Message(AppMessage::TimerExpired { timer_id })) => {
                assert_eq!(timer_id, 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
