/// Crate-wide result alias.
pub type PostResult<T> = Result<T, PostError>;

/// Errors produced by channels, frame buffers, the post-effect pipeline and render sessions.
#[derive(thiserror::Error, Debug)]
pub enum PostError {
    /// A precondition on the arguments did not hold (rect outside buffer, bad size, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// A channel was missing, already present or had an unexpected layout.
    #[error("channel error: {0}")]
    Channel(String),

    /// The channel is already open elsewhere.
    #[error("channel busy: {0}")]
    Busy(String),

    /// A post-effect or the pipeline itself failed.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Cooperative cancellation was observed.
    #[error("canceled")]
    Canceled,

    /// Invalid render-session state transition or renderer failure.
    #[error("session error: {0}")]
    Session(String),

    /// Settings or configuration could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Foreign error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PostError {
    /// Build a [`PostError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PostError::Channel`].
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Build a [`PostError::Busy`].
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Build a [`PostError::Pipeline`].
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Build a [`PostError::Session`].
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Build a [`PostError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for [`PostError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
