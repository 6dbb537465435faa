//! Order statuses, exit/move outcomes, and the order record log.

pub mod outcome;
pub mod record;
pub mod status;

pub use outcome::{ExitOutcome, SlMove};
pub use record::{OrderRecord, OrderRecordLog};
pub use status::{OrderStatus, RejectReason};
