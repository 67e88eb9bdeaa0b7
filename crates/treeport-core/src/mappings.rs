//! Directory-mapping provider boundary
//!
//! Mappings are administered elsewhere; the projector only reads them.

use std::sync::Arc;

use crate::DirectoryMapping;

/// Read-only source of a user's directory mappings
pub trait MappingProvider: Send + Sync {
    /// Mappings visible to `user_id`, in a stable order
    fn mappings_for(&self, user_id: u64) -> Vec<Arc<DirectoryMapping>>;
}

/// Fixed mapping list, e.g. from the configuration file
#[derive(Debug, Clone, Default)]
pub struct StaticMappings {
    mappings: Vec<Arc<DirectoryMapping>>,
}

impl StaticMappings {
    pub fn new(mappings: impl IntoIterator<Item = DirectoryMapping>) -> Self {
        let mut mappings: Vec<_> = mappings.into_iter().map(Arc::new).collect();
        mappings.sort_by_key(|m| m.id);
        Self { mappings }
    }
}

impl MappingProvider for StaticMappings {
    fn mappings_for(&self, user_id: u64) -> Vec<Arc<DirectoryMapping>> {
        self.mappings
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }
}
