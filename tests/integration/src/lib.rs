//! Integration test utilities for the gateway client
//!
//! This crate runs whole sessions against a scripted gateway over the
//! in-memory transport.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
