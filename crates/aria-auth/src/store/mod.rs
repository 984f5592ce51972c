//! The account directory and its durability contract.

mod file;

pub use file::FileStore;

use async_trait::async_trait;

use crate::UserRecord;

/// Single authority over account existence and fields.
///
/// One implementation is constructed at process start and shared by every
/// connection task; adapters (the socket router today, an HTTP layer
/// tomorrow) consult and mutate accounts only through this trait. Callers
/// receive cloned records, never shared mutable handles.
///
/// `lookup` runs the lazy subscription-expiry check as a side effect but
/// must never write the backing file.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a record by email, expiry-normalized. `None` if absent.
    async fn lookup(&self, email: &str) -> Option<UserRecord>;

    /// Add a new record. Fails (returns `false`) if the email is taken.
    async fn insert(&self, record: UserRecord) -> bool;

    /// Mutate the record with the given email and persist the result.
    /// Lookup, the closure, and the snapshot rewrite all run under one
    /// lock hold, so concurrent updates to the same record cannot lose
    /// writes. Returns the closure's result, or `None` if no record
    /// exists. The record is expiry-normalized before the closure sees
    /// it.
    async fn update<F, R>(&self, email: &str, apply: F) -> Option<R>
    where
        F: FnOnce(&mut UserRecord) -> R + Send,
        R: Send;

    /// Delete by email. Fails if absent.
    async fn remove(&self, email: &str) -> bool;

    /// Number of accounts in the directory.
    async fn len(&self) -> usize;
}
