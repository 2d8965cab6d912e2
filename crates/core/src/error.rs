/// Result alias that carries the custom [`StemPlayerError`] type.
pub type Result<T> = std::result::Result<T, StemPlayerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum StemPlayerError {
    /// A stem's audio or event resource could not be retrieved or decoded.
    /// Non-fatal for the overall load; the stem is reported and skipped.
    #[error("failed to load resource `{resource}`: {reason}")]
    ResourceFetch { resource: String, reason: String },
    /// The manifest itself could not be retrieved or parsed. Fatal to a load.
    #[error("failed to load manifest `{resource}`: {reason}")]
    ManifestFetch { resource: String, reason: String },
    /// Event-track bytes do not look like a standard chunked event file.
    #[error("malformed event track: {0}")]
    MalformedInput(&'static str),
    /// Event-track uses an encoding this crate does not handle.
    #[error("unsupported event track: {0}")]
    UnsupportedFormat(&'static str),
    #[error("player has not finished loading")]
    NotLoaded,
    #[error("unknown stem `{0}`")]
    UnknownStem(String),
    /// A single-use playback handle was started a second time.
    #[error("playback handle has already been started")]
    HandleReused,
    /// Free-form message, mostly used for poisoned locks.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl StemPlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn fetch(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::ResourceFetch {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for StemPlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StemPlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
