//! In-memory [`ObjectStore`] implementation for tests and local runs.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so prefix listing comes
//! back sorted for free. Writes and deletes can be made to fail per key to
//! exercise partial-failure paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::ObjectStore;

struct StoredObject {
    body: Vec<u8>,
    content_type: String,
}

/// In-memory object store.
pub struct InMemoryObjectStore {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    rejected_writes: RwLock<HashSet<String>>,
    rejected_deletes: RwLock<HashSet<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create a store whose [`location`](ObjectStore::location) is
    /// `memory://{name}`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
            rejected_writes: RwLock::new(HashSet::new()),
            rejected_deletes: RwLock::new(HashSet::new()),
        }
    }

    /// Make every subsequent write to `key` fail.
    pub fn reject_writes_to(&self, key: impl Into<String>) {
        self.rejected_writes.write().unwrap().insert(key.into());
    }

    /// Make every subsequent delete of `key` fail.
    pub fn reject_deletes_of(&self, key: impl Into<String>) {
        self.rejected_deletes.write().unwrap().insert(key.into());
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.rejected_writes.write().unwrap().clear();
        self.rejected_deletes.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded for `key`, if present.
    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .map(|o| o.content_type.clone())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn location(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        if self.rejected_writes.read().unwrap().contains(key) {
            return Err(Error::upstream("memory", None, "write rejected"));
        }
        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().unwrap().get(key).map(|o| o.body.clone()))
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().unwrap().contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().unwrap();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        if self.rejected_deletes.read().unwrap().contains(key) {
            return Err(Error::upstream("memory", None, "delete rejected"));
        }
        self.objects.write().unwrap().remove(key);
        Ok(())
    }
}
