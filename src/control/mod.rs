//! Allocation control: the allocator, its clock and its periodic task.

pub mod allocator;
/// Monotonic and manual time sources.
pub mod clock;
pub mod heartbeat;
/// Per-pass allocation records.
pub mod report;

pub use allocator::{Allocator, Dispatch, Tick, Timing};
pub use clock::{Clock, ManualClock, SystemClock};
pub use heartbeat::{CancelToken, Heartbeat};
pub use report::{Allocation, PassReport};
