//! # sqlds-query
//!
//! Turns a [`Request`](sqlds_core::Request) and the schema model into SQL.
//!
//! The pipeline is a chain of pure stages, each taking immutable inputs and
//! returning an owned value:
//!
//! 1. [`relation`]: foreign-key, include-from and inverse relation resolution
//! 2. [`planner`]: output selection, extras, joins and deferred sub-fetch fields
//! 3. [`criteria`]: flat-map and tree criteria to a predicate with parameters
//! 4. [`template`]: `${...}` interpolation of operation-binding overrides
//! 5. [`sql_builder`]: final FETCH / count / INSERT / UPDATE / DELETE text
//!
//! All statements use `?` placeholders; drivers that need numbered
//! placeholders rewrite them at execution time.

pub mod criteria;
pub mod error;
pub mod planner;
pub mod relation;
pub mod sql_builder;
pub mod template;

pub use criteria::{CompiledCriteria, CriteriaCompiler, collect_referenced_fields};
pub use error::QueryError;
pub use planner::{DeferredField, FetchPlan, FetchPlanner, ItemRole, SelectItem};
pub use relation::{
    ForeignKeyRelation, ImportFromRelation, RelationResolver, SubFetchRelation,
    DEFAULT_MAX_RELATION_DEPTH, validate_registry,
};
pub use sql_builder::{
    AssembledFetch, FetchAssembler, MutationBuilder, TableColumns, escape_identifier,
};
