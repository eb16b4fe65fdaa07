//! Async session runner and reconnect policy

mod backoff;
mod client;

pub use backoff::{Backoff, ReconnectConfig};
pub use client::{GatewayClient, GatewayHandle};
