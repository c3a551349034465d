//! gNB application layer
//!
//! CLI server, command handling under the pause protocol, and status
//! aggregation.

pub mod cli_server;
pub mod cmd_handler;
pub mod status;
pub mod task;

pub use cli_server::{parse_gnb_cli_command, ParseOutcome};
pub use cmd_handler::{CmdResponse, GnbCmdHandler};
pub use status::GnbStatusInfo;
pub use task::AppTask;
