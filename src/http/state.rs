use crate::client::InputHandle;
use crate::session::Observers;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Queues push-to-talk requests onto the client loop
    pub input: InputHandle,

    /// Read side of the client's status streams
    pub observers: Observers,
}

impl AppState {
    pub fn new(input: InputHandle, observers: Observers) -> Self {
        Self { input, observers }
    }
}
