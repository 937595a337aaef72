//! Type definitions for database schema objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Join a schema and an object name into `schema.name`
pub fn qualify(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

fn default_schema() -> String {
    "public".to_string()
}

/// Snapshot of one database's structure at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
    #[serde(default)]
    pub extensions: Vec<ExtensionDefinition>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl Default for SchemaDefinition {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaDefinition {
    /// Create a new empty snapshot captured now
    pub fn new() -> Self {
        Self {
            schemas: Vec::new(),
            tables: Vec::new(),
            functions: Vec::new(),
            triggers: Vec::new(),
            indexes: Vec::new(),
            policies: Vec::new(),
            extensions: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    fn register_schema(&mut self, schema: &str) {
        if !self.schemas.iter().any(|s| s == schema) {
            self.schemas.push(schema.to_string());
        }
    }

    fn table_mut(&mut self, schema: &str, name: &str) -> Option<&mut TableDefinition> {
        self.tables
            .iter_mut()
            .find(|t| t.schema == schema && t.name == name)
    }

    /// Add a table; its embedded indexes, triggers and policies join the top-level lists
    pub fn add_table(&mut self, table: TableDefinition) {
        self.register_schema(&table.schema);
        self.indexes.extend(table.indexes.iter().cloned());
        self.triggers.extend(table.triggers.iter().cloned());
        self.policies.extend(table.policies.iter().cloned());
        self.tables.push(table);
    }

    /// Add a function to the snapshot
    pub fn add_function(&mut self, function: FunctionDefinition) {
        self.register_schema(&function.schema);
        self.functions.push(function);
    }

    /// Add a trigger, mirroring it onto its table when the table is present
    pub fn add_trigger(&mut self, trigger: TriggerDefinition) {
        if let Some(table) = self.table_mut(&trigger.schema, &trigger.table) {
            table.triggers.push(trigger.clone());
        }
        self.triggers.push(trigger);
    }

    /// Add an index, mirroring it onto its table when the table is present
    pub fn add_index(&mut self, index: IndexDefinition) {
        if let Some(table) = self.table_mut(&index.schema, &index.table) {
            table.indexes.push(index.clone());
        }
        self.indexes.push(index);
    }

    /// Add a policy, mirroring it onto its table when the table is present
    pub fn add_policy(&mut self, policy: PolicyDefinition) {
        if let Some(table) = self.table_mut(&policy.schema, &policy.table) {
            table.policies.push(policy.clone());
        }
        self.policies.push(policy);
    }

    /// Add an installed extension
    pub fn add_extension(&mut self, extension: ExtensionDefinition) {
        self.extensions.push(extension);
    }

    /// Look up a table by schema and name
    pub fn table(&self, schema: &str, name: &str) -> Option<&TableDefinition> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
    }

    /// Total number of objects of every category
    pub fn object_count(&self) -> usize {
        self.tables.len()
            + self.functions.len()
            + self.triggers.len()
            + self.indexes.len()
            + self.policies.len()
            + self.extensions.len()
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDefinition>,
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_row_count: Option<u64>,
}

impl TableDefinition {
    /// Create a new table with the given schema and name
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
            policies: Vec::new(),
            estimated_row_count: None,
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: ColumnDefinition) {
        self.columns.push(column);
    }

    /// Add a constraint to the table
    pub fn add_constraint(&mut self, constraint: ConstraintDefinition) {
        self.constraints.push(constraint);
    }

    /// Builder form of [`TableDefinition::add_column`]
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.add_column(column);
        self
    }

    /// Builder form of [`TableDefinition::add_constraint`]
    pub fn with_constraint(mut self, constraint: ConstraintDefinition) -> Self {
        self.add_constraint(constraint);
        self
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.estimated_row_count = Some(rows);
        self
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Qualified names of other tables referenced through foreign keys
    pub fn referenced_tables(&self) -> Vec<String> {
        let own = self.qualified_name();
        let mut referenced: Vec<String> = Vec::new();
        for reference in self.constraints.iter().filter_map(|c| c.references.as_ref()) {
            let name = qualify(&reference.schema, &reference.table);
            if name != own && !referenced.contains(&name) {
                referenced.push(name);
            }
        }
        referenced
    }
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub is_identity: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnDefinition {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            max_length: None,
            default: None,
            is_identity: false,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default expression for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    /// Data type with the length modifier applied, e.g. `character varying(255)`
    pub fn full_type(&self) -> String {
        match self.max_length {
            Some(len) if !self.data_type.contains('(') => format!("{}({})", self.data_type, len),
            _ => self.data_type.clone(),
        }
    }
}

/// Kind of a table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Exclusion,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintKind::PrimaryKey => "PRIMARY KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::ForeignKey => "FOREIGN KEY",
            ConstraintKind::Check => "CHECK",
            ConstraintKind::Exclusion => "EXCLUDE",
        })
    }
}

/// Target of a foreign key constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyReference {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

/// Represents a table constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDefinition {
    pub name: String,
    pub kind: ConstraintKind,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyReference>,
    /// Expression for CHECK and EXCLUDE constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl ConstraintDefinition {
    pub fn primary_key(name: &str, columns: &[&str]) -> Self {
        Self::with_kind(name, ConstraintKind::PrimaryKey, columns)
    }

    pub fn unique(name: &str, columns: &[&str]) -> Self {
        Self::with_kind(name, ConstraintKind::Unique, columns)
    }

    pub fn check(name: &str, expression: &str) -> Self {
        let mut constraint = Self::with_kind(name, ConstraintKind::Check, &[]);
        constraint.expression = Some(expression.to_string());
        constraint
    }

    pub fn foreign_key(
        name: &str,
        columns: &[&str],
        ref_schema: &str,
        ref_table: &str,
        ref_columns: &[&str],
    ) -> Self {
        let mut constraint = Self::with_kind(name, ConstraintKind::ForeignKey, columns);
        constraint.references = Some(ForeignKeyReference {
            schema: ref_schema.to_string(),
            table: ref_table.to_string(),
            columns: ref_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
            on_update: None,
        });
        constraint
    }

    fn with_kind(name: &str, kind: ConstraintKind, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references: None,
            expression: None,
        }
    }
}

/// Function volatility class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Volatility {
    #[default]
    Volatile,
    Stable,
    Immutable,
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Volatility::Volatile => "VOLATILE",
            Volatility::Stable => "STABLE",
            Volatility::Immutable => "IMMUTABLE",
        })
    }
}

/// A function parameter; unnamed parameters are allowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub data_type: String,
}

/// Represents a stored function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    pub language: String,
    pub body: String,
    #[serde(default)]
    pub security_definer: bool,
    #[serde(default)]
    pub volatility: Volatility,
}

impl FunctionDefinition {
    pub fn new(schema: &str, name: &str, return_type: &str, language: &str, body: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            return_type: return_type.to_string(),
            parameters: Vec::new(),
            language: language.to_string(),
            body: body.to_string(),
            security_definer: false,
            volatility: Volatility::Volatile,
        }
    }

    pub fn with_parameter(mut self, name: Option<&str>, data_type: &str) -> Self {
        self.parameters.push(FunctionParameter {
            name: name.map(str::to_string),
            data_type: data_type.to_string(),
        });
        self
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.schema, &self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
            TriggerTiming::InsteadOf => "INSTEAD OF",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
            TriggerEvent::Truncate => "TRUNCATE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerOrientation {
    #[default]
    Row,
    Statement,
}

impl fmt::Display for TriggerOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerOrientation::Row => "ROW",
            TriggerOrientation::Statement => "STATEMENT",
        })
    }
}

/// Represents a trigger on a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    pub name: String,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    #[serde(default)]
    pub orientation: TriggerOrientation,
    #[serde(default = "default_schema")]
    pub function_schema: String,
    pub function_name: String,
}

impl TriggerDefinition {
    pub fn new(
        schema: &str,
        table: &str,
        name: &str,
        timing: TriggerTiming,
        events: &[TriggerEvent],
        function_name: &str,
    ) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            timing,
            events: events.to_vec(),
            orientation: TriggerOrientation::Row,
            function_schema: schema.to_string(),
            function_name: function_name.to_string(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.schema, self.table, self.name)
    }

    pub fn table_qualified_name(&self) -> String {
        qualify(&self.schema, &self.table)
    }

    pub fn function_qualified_name(&self) -> String {
        qualify(&self.function_schema, &self.function_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One key column of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    pub name: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(default = "default_index_method")]
    pub method: String,
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_primary: bool,
}

fn default_index_method() -> String {
    "btree".to_string()
}

impl IndexDefinition {
    pub fn new(schema: &str, table: &str, name: &str, columns: &[&str]) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            method: default_index_method(),
            columns: columns
                .iter()
                .map(|c| IndexColumn {
                    name: c.to_string(),
                    order: SortOrder::Asc,
                })
                .collect(),
            is_unique: false,
            is_primary: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.schema, &self.name)
    }

    pub fn table_qualified_name(&self) -> String {
        qualify(&self.schema, &self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyCommand {
    Select,
    Insert,
    Update,
    Delete,
    #[default]
    All,
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
            PolicyCommand::All => "ALL",
        })
    }
}

/// Represents a row level security policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinition {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub command: PolicyCommand,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
    #[serde(default = "default_true")]
    pub permissive: bool,
}

impl PolicyDefinition {
    pub fn new(schema: &str, table: &str, name: &str, command: PolicyCommand) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            command,
            roles: Vec::new(),
            using: None,
            with_check: None,
            permissive: true,
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn using(mut self, expression: &str) -> Self {
        self.using = Some(expression.to_string());
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.schema, self.table, self.name)
    }

    pub fn table_qualified_name(&self) -> String {
        qualify(&self.schema, &self.table)
    }
}

/// An installed database extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDefinition {
    pub name: String,
    pub version: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl ExtensionDefinition {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            schema: default_schema(),
        }
    }
}
