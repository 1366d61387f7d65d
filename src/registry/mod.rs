pub mod error;
pub mod schema;

pub use error::RegistryError;
pub use schema::{ArgSchema, ArgType, InputKind, OutputKind};

use crate::operations::{self, OperationHandler};
use std::collections::HashMap;

/// One catalog entry: an operation-id maps to a handler plus enough
/// metadata to validate caller-supplied arguments before dispatch.
pub struct OperationEntry {
    pub operation_id: &'static str,
    pub handler: Box<dyn OperationHandler>,
    pub arg_schema: ArgSchema,
    pub input_kind: InputKind,
    pub output_kind: OutputKind,
}

/// Process-wide, read-only catalog of operation-id -> handler. Populated
/// once at startup (spec §4.1); never mutated afterward.
pub struct OperationRegistry {
    entries: HashMap<&'static str, OperationEntry>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for entry in operations::built_in_entries() {
            entries.insert(entry.operation_id, entry);
        }
        Self { entries }
    }

    pub fn get(&self, operation_id: &str) -> Result<&OperationEntry, RegistryError> {
        self.entries
            .get(operation_id)
            .ok_or_else(|| RegistryError::UnknownOperation(operation_id.to_string()))
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.entries.contains_key(operation_id)
    }

    /// Catalog grouped by the leading path segment, e.g. `excel`, `sql` —
    /// used by the `GET /operations` contract (spec §6).
    pub fn grouped_catalog(&self) -> HashMap<String, Vec<String>> {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for id in self.entries.keys() {
            let group = id.split('/').next().unwrap_or(id).to_string();
            groups.entry(group).or_default().push(id.to_string());
        }
        for list in groups.values_mut() {
            list.sort();
        }
        groups
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_built_in_operations() {
        let registry = OperationRegistry::new();
        assert!(registry.contains("excel/extract-columns-to-file"));
        assert!(registry.contains("sql/generate-to-text"));
        assert!(registry.contains("normalization/apply"));
        assert!(registry.contains("search/filter-rows"));
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let registry = OperationRegistry::new();
        let err = registry.get("not/real").expect_err("should fail");
        assert!(matches!(err, RegistryError::UnknownOperation(id) if id == "not/real"));
    }

    #[test]
    fn grouped_catalog_buckets_by_leading_segment() {
        let registry = OperationRegistry::new();
        let groups = registry.grouped_catalog();
        assert!(groups.get("excel").unwrap().contains(&"excel/extract-columns-to-file".to_string()));
    }
}
