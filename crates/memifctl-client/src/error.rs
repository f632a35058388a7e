/// Errors raised by the control client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] memifctl_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] memifctl_frame::FrameError),

    /// A message could not be encoded, decoded or resolved to an id.
    #[error("api error: {0}")]
    Api(#[from] memifctl_api::ApiError),

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The dataplane connection is gone.
    #[error("dataplane disconnected: {0}")]
    Disconnected(String),

    /// Another call is still waiting for its reply.
    #[error("a call is already in progress on this connection")]
    CallInProgress,

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Handshake timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ClientError {
    /// True when the channel to the dataplane failed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_)
                | ClientError::Frame(_)
                | ClientError::Disconnected(_)
                | ClientError::Timeout(_)
        )
    }

    /// Signed call result code for this failure.
    ///
    /// Errors raised before anything was sent map to
    /// [`LOCAL_ERROR`](crate::LOCAL_ERROR); everything else to
    /// [`TRANSPORT_ERROR`](crate::TRANSPORT_ERROR).
    pub fn result_code(&self) -> i32 {
        match self {
            ClientError::Api(_) | ClientError::CallInProgress => crate::LOCAL_ERROR,
            _ => crate::TRANSPORT_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
