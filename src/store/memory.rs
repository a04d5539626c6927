//! In-memory object store
//!
//! Keeps objects in a sorted map so listing pages are stable. Every call
//! is counted, which lets callers assert that a dry run never issued a
//! mutating request. Keys can be marked as failing to exercise the
//! fatal-error path of a live run.

use super::{ObjectPage, ObjectStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{Meta, RemoteObject};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of objects per listing page (S3 uses 1000)
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// Snapshot of how many times each operation was called
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub head: u64,
    pub list: u64,
    pub put: u64,
    pub get: u64,
    pub delete: u64,
}

impl StoreCalls {
    /// Number of calls that could have changed the bucket or local files
    pub fn transfers(&self) -> u64 {
        self.put + self.get + self.delete
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    head: AtomicU64,
    list: AtomicU64,
    put: AtomicU64,
    get: AtomicU64,
    delete: AtomicU64,
}

/// Object store backed by a map in memory
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    page_size: usize,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing: Mutex<HashSet<String>>,
    calls: CallCounters,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
            objects: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: CallCounters::default(),
        }
    }

    /// Set the listing page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Insert an object with an explicit modification time
    pub fn insert(&self, key: impl Into<String>, data: Vec<u8>, modified: DateTime<Utc>) {
        self.objects
            .lock()
            .insert(key.into(), StoredObject { data, modified });
    }

    /// Make every request for `key` fail
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing.lock().insert(key.into());
    }

    /// Contents of an object, without counting a call
    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).map(|o| o.data.clone())
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Call counts so far
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            head: self.calls.head.load(Ordering::Relaxed),
            list: self.calls.list.load(Ordering::Relaxed),
            put: self.calls.put.load(Ordering::Relaxed),
            get: self.calls.get.load(Ordering::Relaxed),
            delete: self.calls.delete.load(Ordering::Relaxed),
        }
    }

    fn check(&self, operation: &'static str, key: &str) -> StoreResult<()> {
        if self.failing.lock().contains(key) {
            return Err(StoreError::Request {
                operation,
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }
}

impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn head_object(&self, key: &str) -> StoreResult<Option<Meta>> {
        self.calls.head.fetch_add(1, Ordering::Relaxed);
        self.check("HeadObject", key)?;
        Ok(self.objects.lock().get(key).map(|o| Meta {
            size: o.data.len() as u64,
            modified: o.modified,
        }))
    }

    fn list_page(&self, continuation: Option<&str>) -> StoreResult<ObjectPage> {
        self.calls.list.fetch_add(1, Ordering::Relaxed);

        let objects = self.objects.lock();
        let start = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };

        // One extra entry tells us whether another page follows
        let mut page: Vec<RemoteObject> = objects
            .range((start, Bound::Unbounded))
            .take(self.page_size + 1)
            .map(|(key, o)| RemoteObject {
                key: key.clone(),
                modified: o.modified,
                size: o.data.len() as u64,
            })
            .collect();

        let next = if page.len() > self.page_size {
            page.truncate(self.page_size);
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects: page,
            next,
        })
    }

    fn put_object(&self, key: &str, data: Vec<u8>) -> StoreResult<()> {
        self.calls.put.fetch_add(1, Ordering::Relaxed);
        self.check("PutObject", key)?;
        self.insert(key, data, Utc::now());
        Ok(())
    }

    fn get_object(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.calls.get.fetch_add(1, Ordering::Relaxed);
        self.check("GetObject", key)?;
        self.objects
            .lock()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::Request {
                operation: "GetObject",
                key: key.to_string(),
                reason: "NoSuchKey".into(),
            })
    }

    fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.calls.delete.fetch_add(1, Ordering::Relaxed);
        self.check("DeleteObject", key)?;
        self.objects.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_missing_is_none() {
        let store = MemoryStore::new("bucket");
        assert_eq!(store.head_object("/nope").unwrap(), None);
        assert_eq!(store.calls().head, 1);
    }

    #[test]
    fn test_put_then_head() {
        let store = MemoryStore::new("bucket");
        store.put_object("/a.txt", vec![0u8; 10]).unwrap();
        let meta = store.head_object("/a.txt").unwrap().unwrap();
        assert_eq!(meta.size, 10);
        assert_eq!(store.calls().put, 1);
    }

    #[test]
    fn test_listing_pages() {
        let store = MemoryStore::new("bucket").with_page_size(2);
        for key in ["a", "b", "c", "d", "e"] {
            store.insert(key, vec![1], Utc::now());
        }

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = store.list_page(token.as_deref()).unwrap();
            assert!(page.objects.len() <= 2);
            seen.extend(page.objects.into_iter().map(|o| o.key));
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(store.calls().list, 3);
    }

    #[test]
    fn test_empty_listing() {
        let store = MemoryStore::new("bucket");
        let page = store.list_page(None).unwrap();
        assert!(page.objects.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_injected_failure() {
        let store = MemoryStore::new("bucket");
        store.fail_key("/bad");
        assert!(store.put_object("/bad", vec![]).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_missing_is_error() {
        let store = MemoryStore::new("bucket");
        assert!(store.get_object("/missing").is_err());
    }
}
