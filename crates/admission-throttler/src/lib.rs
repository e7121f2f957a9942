//! Priority-queue throttler with a bounded worker pool: four
//! priority lanes drained strictly highest-first, with configurable drop
//! policies for a lane at capacity and cooperative cancellation for
//! still-queued work.

pub mod config;
pub mod events;
pub mod job;
pub mod priority;
pub mod queue;
pub mod throttler;

pub use config::{DropPolicy, ThrottlerConfig, ThrottlerConfigBuilder};
pub use events::ThrottlerEvent;
pub use job::{CancelHandle, Outcome};
pub use priority::Priority;
pub use throttler::{Throttler, ThrottlerBuilder};
