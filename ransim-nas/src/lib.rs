//! NAS (Non-Access Stratum) library
//!
//! Models the 5GMM and 5GSM messages the UE state machines exchange with
//! the core (3GPP TS 24.501 subset), with a byte codec whose round trips
//! are exact.

pub mod codec;
pub mod enums;
pub mod messages;
pub mod security;

pub use codec::{decode_nas_message, encode_nas_message, NasCodecError, NasMessage};
pub use enums::*;
pub use messages::*;
pub use security::*;
