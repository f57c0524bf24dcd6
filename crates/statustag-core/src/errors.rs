//! Error taxonomy for the streaming engine.

use crate::ids::DeviceId;
use crate::image::ImageIdentity;
use crate::source::SourceError;

/// Failures surfaced while streaming to a device.
///
/// Classified into session-ending faults and recoverable ones. Recoverable
/// errors are logged and the session keeps serving its last good patch list.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    // Rejected before a session exists
    #[error("invalid connection parameters: {0}")]
    Configuration(String),

    // Recoverable: retried next poll
    #[error("image source unavailable for device {0}")]
    SourceUnavailable(DeviceId),
    #[error("failed to decode image {identity}: {reason}")]
    DecodeFailure {
        identity: ImageIdentity,
        reason: String,
    },
    #[error(transparent)]
    Source(#[from] SourceError),

    // Session-ending
    #[error("device {0} stopped acknowledging heartbeats")]
    LivenessTimeout(DeviceId),
    #[error("transport fault: {0}")]
    TransportFault(String),
}

impl StreamError {
    /// True when the session must be torn down.
    pub fn closes_session(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::LivenessTimeout(_) | Self::TransportFault(_)
        )
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::DecodeFailure { .. } => "decode_failure",
            Self::Source(_) => "source",
            Self::LivenessTimeout(_) => "liveness_timeout",
            Self::TransportFault(_) => "transport_fault",
        }
    }
}
