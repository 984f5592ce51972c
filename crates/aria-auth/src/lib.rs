//! Account directory and login-challenge primitives.
//!
//! This crate owns everything the socket protocol consults or mutates:
//! the [`UserRecord`] entity, the [`UserStore`] trait with its file-backed
//! [`FileStore`] implementation, the [`NonceRegistry`] of pending login
//! challenges, and the challenge digest helpers.

mod error;
pub mod hash;
mod nonce;
mod record;
mod store;

pub use error::AuthError;
pub use nonce::NonceRegistry;
pub use record::{SubscriptionTier, UserRecord};
pub use store::{FileStore, UserStore};
