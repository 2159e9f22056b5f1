//! Concurrency primitives shared by the join stages.
//!
//! - Cooperative cancellation checked at every worker loop boundary
//! - Channel helpers that stay responsive to cancellation while blocked

pub mod cancel;

pub use cancel::{recv_or_cancel, send_or_cancel, CancelOnPanic, CancellationToken};
