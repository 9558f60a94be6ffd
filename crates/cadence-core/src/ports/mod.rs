//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod clock;
mod publisher;
mod repository;

pub use auth::{AuthError, TokenClaims, TokenService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use publisher::{PublishError, PublishOutcome, Publisher};
pub use repository::{BaseRepository, PostFilter, PostRepository, ScheduleStats};
