//! Session lifecycle
//!
//! The controller decides; the runner acts.

mod controller;
mod heartbeat;
mod state;

pub use controller::SessionController;
pub use heartbeat::HeartbeatTracker;
pub use state::{Command, DisconnectReason, SessionState, NORMAL_CLOSE_CODE, RESUMABLE_CLOSE_CODE};
