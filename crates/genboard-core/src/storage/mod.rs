//! Persistence port for workspace records.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::project::WorkspaceRecord;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Trait for workspace persistence backends.
///
/// Backends treat the record as an opaque blob keyed by id; the in-memory
/// and filesystem implementations here cover tests and desktop use, and a
/// remote backend can implement the same surface.
pub trait Storage: Send + Sync {
    /// Save a workspace record.
    fn save(&self, id: &str, record: &WorkspaceRecord) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a workspace record.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<WorkspaceRecord>>;

    /// Delete a workspace record.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all record IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a record exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    // Simple blocking executor for tests
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
