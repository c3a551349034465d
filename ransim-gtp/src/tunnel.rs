//! GTP-U tunnel table
//!
//! Per-UE/per-session tunnel bookkeeping for the gNB user plane. Each
//! PDU session owns an uplink and a downlink tunnel endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;

use crate::codec::{GtpError, GtpHeader};

/// GTP-U default port.
pub const GTP_U_PORT: u16 = 2152;

/// Tunnel management errors.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// No session matches the downlink TEID
    #[error("tunnel not found: TEID {0:#x}")]
    TunnelNotFound(u32),
    /// No session for this UE/PSI pair
    #[error("PDU session not found: UE {ue_id}, PSI {psi}")]
    SessionNotFound {
        /// UE identifier
        ue_id: i32,
        /// PDU session identifier
        psi: u8,
    },
    /// A session for this UE/PSI pair already exists
    #[error("duplicate PDU session: UE {ue_id}, PSI {psi}")]
    DuplicateSession {
        /// UE identifier
        ue_id: i32,
        /// PDU session identifier
        psi: u8,
    },
    /// Codec failure while encapsulating or decapsulating
    #[error("GTP codec error: {0}")]
    Codec(#[from] GtpError),
}

/// One GTP tunnel endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtpTunnel {
    /// Tunnel Endpoint Identifier
    pub teid: u32,
    /// Remote endpoint address
    pub address: SocketAddr,
}

impl GtpTunnel {
    /// Creates a tunnel endpoint.
    pub fn new(teid: u32, address: SocketAddr) -> Self {
        Self { teid, address }
    }
}

/// A PDU session with its uplink and downlink tunnels.
#[derive(Debug, Clone)]
pub struct PduSession {
    /// UE identifier
    pub ue_id: i32,
    /// PDU session identifier (1-15)
    pub psi: u8,
    /// Uplink tunnel (gNB -> UPF)
    pub uplink: GtpTunnel,
    /// Downlink tunnel (UPF -> gNB)
    pub downlink: GtpTunnel,
}

/// The gNB-side tunnel table.
#[derive(Debug, Default)]
pub struct TunnelManager {
    sessions: HashMap<(i32, u8), PduSession>,
    by_downlink_teid: HashMap<u32, (i32, u8)>,
}

impl TunnelManager {
    /// Creates an empty tunnel table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a session. Fails on a duplicate UE/PSI pair.
    pub fn create_session(&mut self, session: PduSession) -> Result<(), TunnelError> {
        let key = (session.ue_id, session.psi);
        if self.sessions.contains_key(&key) {
            return Err(TunnelError::DuplicateSession {
                ue_id: session.ue_id,
                psi: session.psi,
            });
        }
        self.by_downlink_teid.insert(session.downlink.teid, key);
        self.sessions.insert(key, session);
        Ok(())
    }

    /// Removes one session.
    pub fn release_session(&mut self, ue_id: i32, psi: u8) -> Result<PduSession, TunnelError> {
        let session = self
            .sessions
            .remove(&(ue_id, psi))
            .ok_or(TunnelError::SessionNotFound { ue_id, psi })?;
        self.by_downlink_teid.remove(&session.downlink.teid);
        Ok(session)
    }

    /// Removes all sessions of a UE, returning how many were released.
    pub fn release_ue(&mut self, ue_id: i32) -> usize {
        let keys: Vec<(i32, u8)> = self
            .sessions
            .keys()
            .filter(|(id, _)| *id == ue_id)
            .copied()
            .collect();
        for key in &keys {
            if let Some(session) = self.sessions.remove(key) {
                self.by_downlink_teid.remove(&session.downlink.teid);
            }
        }
        keys.len()
    }

    /// Looks up a session by UE/PSI.
    pub fn find_session(&self, ue_id: i32, psi: u8) -> Option<&PduSession> {
        self.sessions.get(&(ue_id, psi))
    }

    /// Number of installed sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Encapsulates an uplink T-PDU for the session's uplink tunnel.
    pub fn encapsulate_uplink(
        &self,
        ue_id: i32,
        psi: u8,
        t_pdu: Bytes,
    ) -> Result<(SocketAddr, Bytes), TunnelError> {
        let session = self
            .find_session(ue_id, psi)
            .ok_or(TunnelError::SessionNotFound { ue_id, psi })?;
        let encoded = GtpHeader::g_pdu(session.uplink.teid, t_pdu).encode();
        Ok((session.uplink.address, encoded))
    }

    /// Decapsulates a downlink G-PDU, resolving the owning session by
    /// the downlink TEID.
    pub fn decapsulate_downlink(&self, datagram: &[u8]) -> Result<(i32, u8, Bytes), TunnelError> {
        let header = GtpHeader::decode(datagram)?;
        let (ue_id, psi) = self
            .by_downlink_teid
            .get(&header.teid)
            .copied()
            .ok_or(TunnelError::TunnelNotFound(header.teid))?;
        Ok((ue_id, psi, header.payload))
    }
}
