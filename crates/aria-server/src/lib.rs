//! Aria server library.
//!
//! Exposes the server implementation for integration tests and embedding.

pub mod cli;
mod error;
mod handler;
mod router;
mod server;
mod util;

pub use cli::ServerArgs;
pub use error::ServerError;
pub use router::Router;
pub use server::{run, run_with_shutdown, DEFAULT_SHUTDOWN_TIMEOUT};
pub use tokio_util::sync::CancellationToken;
