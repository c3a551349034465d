//! NGAP (NG Application Protocol) library
//!
//! Models the NGAP PDUs exchanged between gNB and AMF (3GPP TS 38.413
//! subset) as owned Rust trees, with constraint validation and a
//! deterministic byte codec.
//!
//! # Modules
//!
//! - `codec` - PDU encoding/decoding and the constraint check gate
//! - `cause` - NGAP cause groups and values
//! - `ies` - information elements shared between procedures
//! - `procedures` - per-procedure message definitions

pub mod cause;
pub mod codec;
pub mod ies;
pub mod procedures;

pub use cause::*;
pub use codec::{check_constraints, decode_ngap_pdu, encode_ngap_pdu, NgapCodecError, NgapPdu};
