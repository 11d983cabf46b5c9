/// The current state of a connection.
/// Loosely follows net/base/load_states.h, collapsed to what a
/// single-exchange connection can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Opened; headers and body may still be configured.
    #[default]
    Idle,

    /// The exchange is in flight, redirects included.
    SendingRequest,

    /// The response has been received in full.
    Completed,

    /// The connection has been disconnected and can no longer be used.
    Closed,
}

impl LoadState {
    /// True once the request can no longer be modified.
    pub fn is_started(self) -> bool {
        !matches!(self, LoadState::Idle)
    }
}
