//! # Content-Addressed Object Store
//!
//! Attestation metadata (inspection reports, AI judge output) is kept
//! off-ledger and referenced by content id. Storage is best effort: a
//! failed `put` is logged by the caller and the attestation is still
//! returned.

use std::collections::HashMap;
use std::sync::Arc;

use fairlens_crypto::content_id;
use parking_lot::RwLock;
use thiserror::Error;

/// Error from an object store backend.
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// A content-addressed JSON document store.
pub trait ObjectStore: Send + Sync {
    /// Store `document` and return its content id.
    fn put(&self, document: &serde_json::Value) -> Result<String, ObjectStoreError>;

    /// Fetch a document by content id.
    fn get(&self, cid: &str) -> Option<serde_json::Value>;
}

/// Process-local object store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, document: &serde_json::Value) -> Result<String, ObjectStoreError> {
        let cid = content_id(document);
        self.objects
            .write()
            .entry(cid.clone())
            .or_insert_with(|| document.clone());
        Ok(cid)
    }

    fn get(&self, cid: &str) -> Option<serde_json::Value> {
        self.objects.read().get(cid).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let doc = json!({"inspector": "A. Rahman", "result": "pass"});
        let a = store.put(&doc).unwrap();
        let b = store.put(&doc).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a), Some(doc));
    }

    #[test]
    fn unknown_cid_is_none() {
        assert!(InMemoryObjectStore::new().get("sha256:00").is_none());
    }
}
