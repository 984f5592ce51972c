//! Server error types.

/// Fatal server-level failures. Per-request failures never surface here;
/// they are answered on the wire and the connection continues.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
}
