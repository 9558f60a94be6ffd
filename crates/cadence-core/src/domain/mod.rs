//! Domain entities - the core business objects.

mod post;
mod retry;
mod user;

pub use post::{Claim, Post, PostStatus, RejectionOutcome};
pub use retry::RetryPolicy;
pub use user::{Actor, Role};
