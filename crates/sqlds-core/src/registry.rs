//! DataSource registry.
//!
//! Schemas are loaded once and shared as `Arc<DataSource>`; DashMap gives
//! lock-free reads while a loader is still registering.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::datasource::DataSource;
use crate::error::SchemaError;

/// Id-keyed store of loaded DataSources.
#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    by_id: DashMap<String, Arc<DataSource>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
        }
    }

    /// Builds a registry from a set of DataSources.
    pub fn from_data_sources(
        data_sources: impl IntoIterator<Item = DataSource>,
    ) -> Result<Self, SchemaError> {
        let registry = Self::new();
        for ds in data_sources {
            registry.register(ds)?;
        }
        Ok(registry)
    }

    /// Registers a DataSource.
    ///
    /// Rejects a second DataSource with the same id and a DataSource that
    /// declares the same field name twice.
    pub fn register(&self, data_source: DataSource) -> Result<Arc<DataSource>, SchemaError> {
        let mut seen = HashSet::new();
        for field in data_source.fields() {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::AmbiguousField {
                    data_source: data_source.id.clone(),
                    field: field.name.clone(),
                });
            }
        }

        match self.by_id.entry(data_source.id.clone()) {
            Entry::Occupied(_) => Err(SchemaError::DuplicateDataSource(data_source.id)),
            Entry::Vacant(slot) => {
                let data_source = Arc::new(data_source);
                slot.insert(data_source.clone());
                tracing::debug!(
                    data_source = %data_source.id,
                    fields = data_source.fields().len(),
                    "Registered DataSource"
                );
                Ok(data_source)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<DataSource>> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    /// Looks up a DataSource, failing with `UnknownDataSource`.
    pub fn require(&self, id: &str) -> Result<Arc<DataSource>, SchemaError> {
        self.get(id)
            .ok_or_else(|| SchemaError::UnknownDataSource(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All registered DataSources, sorted by id.
    pub fn all(&self) -> Vec<Arc<DataSource>> {
        let mut all: Vec<_> = self.by_id.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, FieldType};

    #[test]
    fn test_register_and_lookup() {
        let registry = DataSourceRegistry::new();
        registry
            .register(
                DataSource::new("CountryDS", "country")
                    .with_field(Field::new("id", FieldType::Integer).with_primary_key()),
            )
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.require("CountryDS").unwrap().table_name, "country");
        assert!(matches!(
            registry.require("PlanetDS"),
            Err(SchemaError::UnknownDataSource(_))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = DataSourceRegistry::new();
        registry.register(DataSource::new("A", "a")).unwrap();
        let err = registry.register(DataSource::new("A", "a2")).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateDataSource("A".into()));
        assert_eq!(registry.require("A").unwrap().table_name, "a");
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let registry = DataSourceRegistry::new();
        let ds = DataSource::new("A", "a")
            .with_field(Field::new("x", FieldType::Text))
            .with_field(Field::new("x", FieldType::Integer));
        assert!(matches!(
            registry.register(ds),
            Err(SchemaError::AmbiguousField { .. })
        ));
        assert!(registry.is_empty());
    }
}
