//! Error types of the serializer element.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a sidecar metadata file.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to read sidecar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record failed to parse; the whole load is rejected so that record
    /// indices never drift from the frame count.
    #[error("malformed record #{index} in sidecar file {path}: {source}")]
    MalformedRecord {
        path: PathBuf,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SerializerError {
    /// Caps the element cannot describe as a frame message.
    #[error("not supported caps {caps}: {reason}")]
    Negotiation { caps: String, reason: String },

    #[error("invalid source ID pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("duplicate source IDs generated by pattern {pattern:?}: {duplicate}")]
    DuplicateSourceIds { pattern: String, duplicate: String },

    #[error("source ID is required when enable-multistream=false")]
    MissingSourceId,

    #[error("invalid framerate {0:?}")]
    InvalidFramerate(String),

    #[error("number-of-streams must be within 1..={max}, got {value}")]
    InvalidStreamCount { value: usize, max: usize },

    #[error("unsupported frame type {0:?}")]
    UnsupportedFrameType(String),

    #[error("buffer received before caps were negotiated")]
    NotNegotiated,

    #[error("element is not started")]
    NotStarted,

    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error("failed to serialize {kind} message: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("output sink is closed")]
    SinkClosed,
}

impl SerializerError {
    /// Configuration faults prevent the element from entering the running
    /// state; everything else is reported per buffer or per event.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. }
                | Self::DuplicateSourceIds { .. }
                | Self::MissingSourceId
                | Self::InvalidFramerate(_)
                | Self::InvalidStreamCount { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SerializerError>;
