//! HTTP control surface
//!
//! Lets a button, hotkey daemon, or script drive push-to-talk locally:
//! - POST /ptt/press - Start recording
//! - POST /ptt/release - Stop recording and send it
//! - GET /status - Session, connection, and latest texts
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
