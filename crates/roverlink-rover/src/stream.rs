use serde::Serialize;

/// Lifecycle of the position streaming service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Streaming slots have not been configured since the link was attached.
    Unconfigured,
    /// Configured and not streaming.
    Configured,
    /// Notifications are flowing.
    Active,
}

/// Host-side view of the controller's streaming session.
///
/// Only tracks what the host has sent; the controller never confirms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSession {
    configured: bool,
    active: bool,
}

impl StreamSession {
    pub fn state(&self) -> StreamState {
        match (self.configured, self.active) {
            (_, true) => StreamState::Active,
            (true, false) => StreamState::Configured,
            (false, false) => StreamState::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn configured(&mut self) {
        self.configured = true;
    }

    pub(crate) fn started(&mut self) {
        self.configured = true;
        self.active = true;
    }

    pub(crate) fn stopped(&mut self) {
        self.active = false;
    }
}
