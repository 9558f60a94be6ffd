//! # Cadence Core
//!
//! The domain layer of the Cadence post scheduler.
//! This crate contains the post lifecycle, the scheduling engine and the
//! due-post sweeper. Storage, publishing and time are reached through ports.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::DomainError;
