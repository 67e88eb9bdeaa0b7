//! Flat key-to-metadata mirror of the backing store

use std::collections::HashMap;
use tracing::debug;

use crate::RemoteObject;

/// In-memory map from full object key to object metadata.
///
/// Only non-folder objects are indexed; folders are synthesized by the
/// tree projector.
#[derive(Debug, Default, Clone)]
pub struct ObjectKeyIndex {
    objects: HashMap<String, RemoteObject>,
}

impl ObjectKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index an object. Returns `false` for directory markers, which are skipped.
    pub fn insert(&mut self, object: RemoteObject) -> bool {
        if object.is_folder() {
            debug!(key = %object.key, "Skipping directory marker");
            return false;
        }
        self.objects.insert(object.key.clone(), object);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<RemoteObject> {
        self.objects.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&RemoteObject> {
        self.objects.get(key)
    }

    pub fn size_of(&self, key: &str) -> Option<u64> {
        self.objects.get(key).map(|o| o.size_bytes)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl Extend<RemoteObject> for ObjectKeyIndex {
    fn extend<T: IntoIterator<Item = RemoteObject>>(&mut self, iter: T) {
        for object in iter {
            self.insert(object);
        }
    }
}
