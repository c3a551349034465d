//! RRC (Radio Resource Control) library
//!
//! Models the RRC messages the simulator exchanges over the air
//! interface (3GPP TS 38.331 subset) as owned trees with a deterministic
//! byte codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_dl_dcch, decode_pcch, decode_ul_dcch, encode_dl_dcch, encode_pcch, encode_ul_dcch,
    RrcCodecError,
};
pub use messages::*;
