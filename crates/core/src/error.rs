use crate::store::{MarkerId, SegmentId};

/// Result alias that carries the custom [`LipSyncError`] type.
pub type Result<T> = std::result::Result<T, LipSyncError>;

/// Common error type for the core crate.
///
/// Missing images are deliberately absent from this taxonomy: the renderer
/// degrades to the neutral viseme instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// Free-form message, mostly produced by the command line front end.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Image decoding or encoding failed.
    #[error("{0}")]
    Image(#[from] image::ImageError),
    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// An operation was invoked before the audio clip reported its duration.
    #[error("{operation} requires a loaded audio clip")]
    NotReady { operation: &'static str },
    #[error("unknown marker `{0}`")]
    UnknownMarker(MarkerId),
    #[error("unknown segment `{0}`")]
    UnknownSegment(SegmentId),
    #[error("marker `{0}` already belongs to a segment")]
    MarkerAlreadyPaired(MarkerId),
    #[error("marker `{0}` is already being dragged")]
    DragInProgress(MarkerId),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl LipSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn not_ready(operation: &'static str) -> Self {
        Self::NotReady { operation }
    }
}

impl From<&str> for LipSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LipSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
