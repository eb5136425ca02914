/// Errors that can occur in rover engine operations.
#[derive(Debug, thiserror::Error)]
pub enum RoverError {
    /// No channel is attached to the engine.
    #[error("rover link not attached")]
    NotReady,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] roverlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] roverlink_frame::FrameError),

    /// The channel closed while waiting for the controller.
    #[error("rover disconnected: {0}")]
    Disconnected(String),

    /// No matching reply arrived within the configured bound.
    #[error("reply timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, RoverError>;
