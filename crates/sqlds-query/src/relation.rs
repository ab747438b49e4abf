//! Relation resolution.
//!
//! Resolves the three kinds of cross-DataSource references a field can carry:
//!
//! - a foreign key (`foreignKey = "LocationDS.id"`), one hop
//! - an include-from import (`includeFrom = "LocationDS.name"`), found through a
//!   local foreign-key field and possibly continuing through further
//!   include-from fields on the target (employee → location → country)
//! - a sub-fetch relation for entity and multi-valued fields, including the
//!   inverse ("mapped-by") case where only the foreign side holds the column
//!
//! Resolution reads the registry only; it performs no I/O and returns the same
//! value for the same schema snapshot.

use std::sync::Arc;

use sqlds_core::{DataSource, DataSourceRegistry, Field, FieldType, SchemaError};

/// Default bound on include-from hops.
pub const DEFAULT_MAX_RELATION_DEPTH: usize = 8;

/// One resolved foreign-key hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyRelation {
    pub source_data_source: String,
    pub source_table: String,
    pub source_field: String,
    pub source_column: String,
    pub target_data_source: String,
    pub target_table: String,
    pub target_field: String,
    pub target_column: String,
}

/// A resolved include-from field: the hops to walk and the value at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFromRelation {
    /// Include-from field on the requesting DataSource.
    pub field: String,
    /// Ordered hops from the requesting DataSource to the one holding the value.
    pub hops: Vec<ForeignKeyRelation>,
    pub target_data_source: String,
    pub target_field: String,
    pub target_column: String,
    pub target_type: Option<FieldType>,
    pub custom_select_expression: Option<String>,
}

/// How a deferred field's records are looked up.
///
/// The nested fetch runs against `foreign_data_source` with
/// `filter_field = <value of local_key_field>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFetchRelation {
    pub field: String,
    pub foreign_data_source: String,
    /// Field on the foreign DataSource that is filtered.
    pub filter_field: String,
    /// Local field supplying the filter value.
    pub local_key_field: String,
    /// Multi-valued or inverse relation.
    pub to_many: bool,
}

/// Splits `DataSourceId.fieldName`.
pub fn parse_reference<'a>(field: &str, value: &'a str) -> Result<(&'a str, &'a str), SchemaError> {
    let mut parts = value.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ds), Some(name), None) if !ds.is_empty() && !name.is_empty() => Ok((ds, name)),
        _ => Err(SchemaError::malformed_relation(field, value)),
    }
}

/// Resolves relations against a registry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RelationResolver<'a> {
    registry: &'a DataSourceRegistry,
    max_depth: usize,
}

impl<'a> RelationResolver<'a> {
    pub fn new(registry: &'a DataSourceRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_RELATION_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &'a DataSourceRegistry {
        self.registry
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolves the foreign key declared on `field`.
    pub fn resolve_foreign_key(
        &self,
        data_source: &DataSource,
        field: &Field,
    ) -> Result<ForeignKeyRelation, SchemaError> {
        let reference = field
            .foreign_key
            .as_deref()
            .ok_or_else(|| SchemaError::malformed_relation(&field.name, ""))?;
        let (target_id, target_name) = parse_reference(&field.name, reference)?;
        let target = self.registry.require(target_id)?;
        let target_field = target.field(target_name)?;

        Ok(ForeignKeyRelation {
            source_data_source: data_source.id.clone(),
            source_table: data_source.table_name.clone(),
            source_field: field.name.clone(),
            source_column: field.db_column().to_string(),
            target_data_source: target.id.clone(),
            target_table: target.table_name.clone(),
            target_field: target_field.name.clone(),
            target_column: target_field.db_column().to_string(),
        })
    }

    /// Resolves an include-from field into its hop chain.
    ///
    /// Each hop finds the local foreign-key field leading to the referenced
    /// DataSource. When the referenced field is itself include-from on that
    /// DataSource the walk continues from there, up to `max_depth` hops.
    pub fn resolve_include_from(
        &self,
        data_source: &DataSource,
        field: &Field,
    ) -> Result<ImportFromRelation, SchemaError> {
        let mut current: Option<Arc<DataSource>> = None;
        let mut importing = field.clone();
        let mut hops = Vec::new();

        loop {
            if hops.len() >= self.max_depth {
                return Err(SchemaError::RelationChainTooDeep {
                    field: field.name.clone(),
                    max_depth: self.max_depth,
                });
            }

            let owner = current.as_deref().unwrap_or(data_source);
            let reference = importing
                .include_from
                .as_deref()
                .ok_or_else(|| SchemaError::malformed_relation(&importing.name, ""))?;
            let (target_id, target_name) = parse_reference(&importing.name, reference)?;

            let source = self.find_source_field(owner, &importing, target_id)?;
            hops.push(self.resolve_foreign_key(owner, source)?);

            let target = self.registry.require(target_id)?;
            let target_field = target.field(target_name)?.clone();

            if target_field.is_include_from() {
                importing = target_field;
                current = Some(target);
                continue;
            }

            return Ok(ImportFromRelation {
                field: field.name.clone(),
                hops,
                target_data_source: target.id.clone(),
                target_field: target_field.name.clone(),
                target_column: target_field.db_column().to_string(),
                target_type: target_field.field_type,
                custom_select_expression: target_field.custom_select_expression.clone(),
            });
        }
    }

    /// Finds the local foreign-key field an include-from field is imported through.
    fn find_source_field<'d>(
        &self,
        owner: &'d DataSource,
        importing: &Field,
        target_id: &str,
    ) -> Result<&'d Field, SchemaError> {
        let no_source = || SchemaError::NoSourceField {
            data_source: owner.id.clone(),
            field: importing.name.clone(),
        };

        let references_target = |f: &Field| {
            f.foreign_key
                .as_deref()
                .and_then(|fk| parse_reference(&f.name, fk).ok())
                .is_some_and(|(ds, _)| ds == target_id)
        };

        if let Some(via) = importing.include_via.as_deref() {
            let source = owner.find_field(via).ok_or_else(no_source)?;
            return if references_target(source) {
                Ok(source)
            } else {
                Err(no_source())
            };
        }

        let candidates: Vec<&Field> = owner
            .fields()
            .iter()
            .filter(|f| references_target(f) && !f.needs_sub_fetch())
            .collect();

        let bound: Vec<&Field> = candidates
            .iter()
            .copied()
            .filter(|f| f.display_field.as_deref() == Some(importing.name.as_str()))
            .collect();

        match bound.as_slice() {
            [single] => Ok(*single),
            [] if candidates.len() > 1 => Err(SchemaError::AmbiguousForeignKey {
                data_source: owner.id.clone(),
                field: importing.name.clone(),
                target: target_id.to_string(),
            }),
            [] => Err(no_source()),
            _ => Err(SchemaError::AmbiguousForeignKey {
                data_source: owner.id.clone(),
                field: importing.name.clone(),
                target: target_id.to_string(),
            }),
        }
    }

    /// Resolves how records for an entity or multi-valued field are fetched.
    ///
    /// Multi-valued fields filter the foreign DataSource by its back-reference
    /// to this DataSource's primary key. Single entity fields filter the
    /// foreign field named by the foreign key with this field's own value.
    pub fn resolve_sub_fetch(
        &self,
        data_source: &DataSource,
        field: &Field,
    ) -> Result<SubFetchRelation, SchemaError> {
        let reference = field
            .foreign_key
            .as_deref()
            .ok_or_else(|| SchemaError::malformed_relation(&field.name, ""))?;
        let (foreign_id, foreign_name) = parse_reference(&field.name, reference)?;
        let foreign = self.registry.require(foreign_id)?;
        let named = foreign.field(foreign_name)?;

        if !field.multiple {
            return Ok(SubFetchRelation {
                field: field.name.clone(),
                foreign_data_source: foreign.id.clone(),
                filter_field: named.name.clone(),
                local_key_field: field.name.clone(),
                to_many: false,
            });
        }

        let local_key = data_source.single_primary_key()?;
        let back_reference = self.find_back_reference(data_source, &foreign, named)?;

        Ok(SubFetchRelation {
            field: field.name.clone(),
            foreign_data_source: foreign.id.clone(),
            filter_field: back_reference.name.clone(),
            local_key_field: local_key.name.clone(),
            to_many: true,
        })
    }

    /// The field on `foreign` whose foreign key points back at `local`.
    ///
    /// The field named by the relation wins when it already points back;
    /// otherwise exactly one field on the foreign side must.
    fn find_back_reference<'d>(
        &self,
        local: &DataSource,
        foreign: &'d DataSource,
        named: &'d Field,
    ) -> Result<&'d Field, SchemaError> {
        let points_back = |f: &Field| {
            f.foreign_key
                .as_deref()
                .and_then(|fk| parse_reference(&f.name, fk).ok())
                .is_some_and(|(ds, _)| ds == local.id)
        };

        if points_back(named) {
            return Ok(named);
        }

        let candidates: Vec<&Field> = foreign
            .fields()
            .iter()
            .filter(|f| points_back(f) && !f.needs_sub_fetch())
            .collect();

        match candidates.as_slice() {
            [single] => Ok(*single),
            [] => Err(SchemaError::NoSourceField {
                data_source: foreign.id.clone(),
                field: named.name.clone(),
            }),
            _ => Err(SchemaError::AmbiguousForeignKey {
                data_source: foreign.id.clone(),
                field: named.name.clone(),
                target: local.id.clone(),
            }),
        }
    }
}

/// Resolves every relation in the registry once, so definition errors
/// surface at load time instead of on the first request.
pub fn validate_registry(
    registry: &DataSourceRegistry,
    max_depth: usize,
) -> Result<(), SchemaError> {
    let resolver = RelationResolver::new(registry).with_max_depth(max_depth);

    for ds in registry.all() {
        if !ds.is_sql() {
            continue;
        }
        for field in ds.fields() {
            if field.needs_sub_fetch() {
                resolver.resolve_sub_fetch(&ds, field)?;
            } else if field.is_include_from() {
                resolver.resolve_include_from(&ds, field)?;
            } else if field.foreign_key.is_some() {
                resolver.resolve_foreign_key(&ds, field)?;
            }
        }
    }

    tracing::debug!(data_sources = registry.len(), "Schema relations validated");
    Ok(())
}
