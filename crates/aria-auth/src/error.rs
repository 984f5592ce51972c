//! Account domain error types.

/// Account domain error.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Subscription tier name is not a known enum value.
    #[error("invalid subscription type: {0}")]
    InvalidTier(String),

    /// Backing-file error (load or rewrite).
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
}
