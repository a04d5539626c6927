//! Remote object store client
//!
//! The reconciliation pipeline talks to the bucket only through the
//! [`ObjectStore`] trait. Implementations must be safe for concurrent
//! use by every worker thread; calls are blocking.
//!
//! - [`S3Store`]: Amazon S3 (or any S3-compatible endpoint) via aws-sdk-s3
//! - [`MemoryStore`]: in-process map, used for tests and dry experiments

pub mod memory;
pub mod s3;

pub use memory::{MemoryStore, StoreCalls};
pub use s3::{S3Store, S3StoreConfig};

use crate::error::StoreResult;
use crate::types::{Meta, RemoteObject};

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects on this page
    pub objects: Vec<RemoteObject>,

    /// Token for the next page, `None` on the last page
    pub next: Option<String>,
}

/// Blocking client for one bucket
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this client targets
    fn bucket(&self) -> &str;

    /// Size and modification time of the object at `key`
    ///
    /// A missing object is `Ok(None)`, not an error.
    fn head_object(&self, key: &str) -> StoreResult<Option<Meta>>;

    /// Fetch one listing page, starting after `continuation`
    fn list_page(&self, continuation: Option<&str>) -> StoreResult<ObjectPage>;

    /// Create or overwrite the object at `key`
    fn put_object(&self, key: &str, data: Vec<u8>) -> StoreResult<()>;

    /// Full contents of the object at `key`
    fn get_object(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Remove the object at `key`
    fn delete_object(&self, key: &str) -> StoreResult<()>;
}
