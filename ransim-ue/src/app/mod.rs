//! UE application layer
//!
//! Per-session TUN tasks, CLI handling and the switch-off path.

pub mod cli_server;
pub mod cmd_handler;
pub mod task;

pub use cli_server::{parse_ue_cli_command, ParseOutcome};
pub use cmd_handler::{CmdResponse, UeCmdHandler};
pub use task::{AppTask, UeController};
