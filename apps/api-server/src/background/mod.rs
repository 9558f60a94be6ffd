//! Background processing.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError};
