/// Result alias that carries the custom [`SaberError`] type.
pub type Result<T> = std::result::Result<T, SaberError>;

/// Common error type for the core crate.
///
/// Gameplay outcomes such as misses or a depleted health bar are not errors;
/// they travel through [`crate::GameEvent`]. This type only covers problems
/// with configuration, files and the shared hand cell.
#[derive(Debug, thiserror::Error)]
pub enum SaberError {
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A configuration or chart file could not be (de)serialised.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// A configuration value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A thread panicked while holding a shared slot.
    #[error("{0} has been poisoned")]
    SharedStatePoisoned(&'static str),
}

impl SaberError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
