//! Common types and utilities for ransim
//!
//! This crate provides the shared types, configuration structures and
//! utilities used across all ransim crates.

pub mod air;
pub mod cli_wire;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod octet_string;
pub mod octet_view;
pub mod types;

pub use air::{AirFrame, AirPdu, GnbAirPeer, RrcChannel, UeAirEndpoint};
pub use cli_wire::{
    CliMessage, CliMessageType, ProcTableEntry, CMD_SERVER_IP, PROC_TABLE_DIR,
    VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH,
};
pub use config::{AmfConfig, GnbConfig, PagingDrx, SessionConfig, UeConfig};
pub use error::Error;
pub use listener::{ConnectionType, NodeListener, NodeType, StateType};
pub use logging::{init_logging, init_logging_with_filter, LogLevel};
pub use octet_string::OctetString;
pub use octet_view::{OctetView, OutOfData};
pub use types::*;
