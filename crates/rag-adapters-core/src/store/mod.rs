//! Flat object-store abstraction.
//!
//! The [`ObjectStore`] trait is the minimal key/value surface the path
//! mapper needs from a vendor store. It assumes no hierarchical listing
//! beyond prefix filtering.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Abstract flat key/value object store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_object`](ObjectStore::put_object) | Create or overwrite one key |
/// | [`get_object`](ObjectStore::get_object) | Read one key (`None` when absent) |
/// | [`object_exists`](ObjectStore::object_exists) | Existence check |
/// | [`list_keys`](ObjectStore::list_keys) | Every key under a prefix, sorted |
/// | [`delete_object`](ObjectStore::delete_object) | Remove one key; absent is success |
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable location of the backing container (for logs and
    /// equality checks after reconstruction).
    fn location(&self) -> String;

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// Returns every key starting with `prefix`, in lexicographic order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Deleting a key that does not exist must succeed.
    async fn delete_object(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn location(&self) -> String {
        (**self).location()
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        (**self).put_object(key, body, content_type).await
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get_object(key).await
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        (**self).object_exists(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_keys(prefix).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        (**self).delete_object(key).await
    }
}
