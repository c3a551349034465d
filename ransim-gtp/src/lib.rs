//! GTP-U (GPRS Tunneling Protocol - User Plane) library
//!
//! Header encoding/decoding and the per-UE/per-session tunnel table used
//! by the gNB user plane (3GPP TS 29.281 subset).

pub mod codec;
pub mod tunnel;

pub use codec::{GtpError, GtpHeader, GtpMessageType};
pub use tunnel::{GtpTunnel, PduSession, TunnelError, TunnelManager, GTP_U_PORT};
