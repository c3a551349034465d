//! NGAP procedures
//!
//! Per-procedure message definitions as defined in 3GPP TS 38.413.

pub mod configuration_update;
pub mod error_indication;
pub mod nas_transport;
pub mod ng_setup;
pub mod overload;
pub mod paging;
pub mod path_switch;
pub mod ue_context_release;

pub use configuration_update::*;
pub use error_indication::*;
pub use nas_transport::*;
pub use ng_setup::*;
pub use overload::*;
pub use paging::*;
pub use path_switch::*;
pub use ue_context_release::*;
