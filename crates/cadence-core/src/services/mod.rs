//! Application services built on the domain and the ports.

mod scheduling;
mod sweeper;

pub use scheduling::{PostEdit, ScheduleChange, SchedulingService, compose_timestamp};
pub use sweeper::{DueSweeper, SweepError, SweepReport, SweeperConfig};
