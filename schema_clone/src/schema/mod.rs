//! Schema module for schema_clone
//!
//! This module handles schema snapshots, comparison, dependency ordering and
//! migration script generation.

pub mod comparator;
pub mod cost;
pub mod diff;
pub mod generator;
pub mod ordering;
pub mod script;
pub mod types;

// Re-export key types
pub use comparator::{compare_schemas, SchemaComparator};
pub use cost::{CostInput, CostModel, DefaultCostModel, FlatCostModel};
pub use diff::{
    DiffAction, DiffSummary, DifferenceDetails, ObjectChange, ObjectType, SchemaDiff,
    SchemaDifference,
};
pub use generator::{generate_migration_script, MigrationGenerator};
pub use script::{MigrationOperation, MigrationScript, OperationKind, RiskLevel};
pub use types::{
    ColumnDefinition, ConstraintDefinition, ConstraintKind, ExtensionDefinition,
    FunctionDefinition, IndexDefinition, PolicyDefinition, SchemaDefinition, TableDefinition,
    TriggerDefinition,
};
