//! Publishing backends.

mod simulated;

#[cfg(feature = "http-publisher")]
mod http;

pub use simulated::{SimulatedPublisher, SimulatedPublisherConfig};

#[cfg(feature = "http-publisher")]
pub use http::{HttpPublisher, HttpPublisherConfig};
