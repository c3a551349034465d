//! Node observability listener
//!
//! An optional listener a node embedder can install to observe state
//! switches and sent PDUs without touching the task internals.

/// Kind of node emitting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// gNodeB
    Gnb,
    /// User Equipment
    Ue,
    /// AMF peer (used as the remote side of send events)
    Amf,
}

/// Kind of state register being switched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    /// 5GMM main state
    Mm,
    /// 5GMM sub-state
    MmSub,
    /// Registration management state
    Rm,
    /// Connection management state
    Cm,
    /// 5GS update status
    U5,
}

/// Connection type for send events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// NGAP over SCTP toward the AMF
    Ngap,
    /// RRC over the air interface
    Rrc,
}

/// Observability callbacks. Implementations must be cheap and
/// non-blocking; they run inline in the emitting task.
pub trait NodeListener: Send + Sync {
    /// A state register switched from `old` to `new`.
    fn on_switch(
        &self,
        node_type: NodeType,
        node_name: &str,
        state_type: StateType,
        old: &str,
        new: &str,
    );

    /// A PDU was sent toward a peer; `rendered` is a human-readable dump
    /// of the PDU contents.
    fn on_send(
        &self,
        from_type: NodeType,
        from_name: &str,
        to_type: NodeType,
        to_name: &str,
        connection: ConnectionType,
        rendered: &str,
    );
}
