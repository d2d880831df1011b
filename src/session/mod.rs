//! Push-to-talk session management
//!
//! - `machine`: the Idle/Recording/AwaitingReply/Playing state machine
//! - `session`: one press-to-release recording and its accumulated samples
//! - `observers`: watch-based status, transcript, response, and audio streams
//! - `config`: capture parameters shared by every recording

mod config;
mod machine;
mod observers;
mod session;

pub use config::SessionConfig;
pub use machine::*;
pub use observers::{ClientSnapshot, Observers, StatusLevel, StatusUpdate};
pub use session::RecordingSession;
