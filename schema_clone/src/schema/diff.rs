//! Schema difference types
//!
//! A [`SchemaDiff`] is the ordered result of comparing a source snapshot against a
//! target snapshot. Each [`SchemaDifference`] carries a typed before/after payload
//! for its object category.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::types::{
    ExtensionDefinition, FunctionDefinition, IndexDefinition, PolicyDefinition,
    TableDefinition, TriggerDefinition,
};

/// Category of a schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Table,
    Function,
    Index,
    Trigger,
    Policy,
    Extension,
}

impl ObjectType {
    /// Every category in tie-break order
    pub const ALL: [ObjectType; 6] = [
        ObjectType::Table,
        ObjectType::Function,
        ObjectType::Index,
        ObjectType::Trigger,
        ObjectType::Policy,
        ObjectType::Extension,
    ];

    /// Tie-break rank used when ordering differences
    pub fn rank(self) -> u8 {
        match self {
            ObjectType::Table => 0,
            ObjectType::Function => 1,
            ObjectType::Index => 2,
            ObjectType::Trigger => 3,
            ObjectType::Policy => 4,
            ObjectType::Extension => 5,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectType::Table => "table",
            ObjectType::Function => "function",
            ObjectType::Index => "index",
            ObjectType::Trigger => "trigger",
            ObjectType::Policy => "policy",
            ObjectType::Extension => "extension",
        })
    }
}

/// What has to happen to the target object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    Create,
    Alter,
    Drop,
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffAction::Create => "create",
            DiffAction::Alter => "alter",
            DiffAction::Drop => "drop",
        })
    }
}

/// Before and after versions of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectChange<T> {
    pub before: Option<T>,
    pub after: Option<T>,
    pub reason: String,
}

impl<T> ObjectChange<T> {
    pub fn created(after: T, reason: impl Into<String>) -> Self {
        Self {
            before: None,
            after: Some(after),
            reason: reason.into(),
        }
    }

    pub fn dropped(before: T, reason: impl Into<String>) -> Self {
        Self {
            before: Some(before),
            after: None,
            reason: reason.into(),
        }
    }

    pub fn altered(before: T, after: T, reason: impl Into<String>) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            reason: reason.into(),
        }
    }
}

/// Typed payload of a difference, keyed by object category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "change", rename_all = "lowercase")]
pub enum DifferenceDetails {
    Table(ObjectChange<TableDefinition>),
    Function(ObjectChange<FunctionDefinition>),
    Trigger(ObjectChange<TriggerDefinition>),
    Index(ObjectChange<IndexDefinition>),
    Policy(ObjectChange<PolicyDefinition>),
    Extension(ObjectChange<ExtensionDefinition>),
}

impl DifferenceDetails {
    pub fn object_type(&self) -> ObjectType {
        match self {
            DifferenceDetails::Table(_) => ObjectType::Table,
            DifferenceDetails::Function(_) => ObjectType::Function,
            DifferenceDetails::Trigger(_) => ObjectType::Trigger,
            DifferenceDetails::Index(_) => ObjectType::Index,
            DifferenceDetails::Policy(_) => ObjectType::Policy,
            DifferenceDetails::Extension(_) => ObjectType::Extension,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            DifferenceDetails::Table(c) => &c.reason,
            DifferenceDetails::Function(c) => &c.reason,
            DifferenceDetails::Trigger(c) => &c.reason,
            DifferenceDetails::Index(c) => &c.reason,
            DifferenceDetails::Policy(c) => &c.reason,
            DifferenceDetails::Extension(c) => &c.reason,
        }
    }

    pub(crate) fn reason_mut(&mut self) -> &mut String {
        match self {
            DifferenceDetails::Table(c) => &mut c.reason,
            DifferenceDetails::Function(c) => &mut c.reason,
            DifferenceDetails::Trigger(c) => &mut c.reason,
            DifferenceDetails::Index(c) => &mut c.reason,
            DifferenceDetails::Policy(c) => &mut c.reason,
            DifferenceDetails::Extension(c) => &mut c.reason,
        }
    }
}

/// One atomic change between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDifference {
    pub action: DiffAction,
    pub name: String,
    pub schema: String,
    pub details: DifferenceDetails,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub priority: u32,
}

impl SchemaDifference {
    pub fn object_type(&self) -> ObjectType {
        self.details.object_type()
    }

    pub fn reason(&self) -> &str {
        self.details.reason()
    }

    /// Fully qualified object name.
    ///
    /// Tables, functions and indexes are `schema.name`; triggers and policies live on a
    /// table and are `schema.table.name`; extensions are database-wide and use `name`.
    pub fn qualified_name(&self) -> String {
        match &self.details {
            DifferenceDetails::Trigger(change) => {
                match change.after.as_ref().or(change.before.as_ref()) {
                    Some(trigger) => trigger.qualified_name(),
                    None => format!("{}.{}", self.schema, self.name),
                }
            }
            DifferenceDetails::Policy(change) => {
                match change.after.as_ref().or(change.before.as_ref()) {
                    Some(policy) => policy.qualified_name(),
                    None => format!("{}.{}", self.schema, self.name),
                }
            }
            DifferenceDetails::Extension(_) => self.name.clone(),
            _ => format!("{}.{}", self.schema, self.name),
        }
    }
}

/// Difference counts per category and action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub total_differences: usize,
    pub tables: usize,
    pub functions: usize,
    pub triggers: usize,
    pub indexes: usize,
    pub policies: usize,
    pub extensions: usize,
    pub creates: usize,
    pub alters: usize,
    pub drops: usize,
}

impl DiffSummary {
    /// Count the given differences
    pub fn from_differences(differences: &[SchemaDifference]) -> Self {
        let mut summary = DiffSummary {
            total_differences: differences.len(),
            ..Default::default()
        };

        for difference in differences {
            match difference.object_type() {
                ObjectType::Table => summary.tables += 1,
                ObjectType::Function => summary.functions += 1,
                ObjectType::Trigger => summary.triggers += 1,
                ObjectType::Index => summary.indexes += 1,
                ObjectType::Policy => summary.policies += 1,
                ObjectType::Extension => summary.extensions += 1,
            }
            match difference.action {
                DiffAction::Create => summary.creates += 1,
                DiffAction::Alter => summary.alters += 1,
                DiffAction::Drop => summary.drops += 1,
            }
        }

        summary
    }

    pub fn count_for(&self, object_type: ObjectType) -> usize {
        match object_type {
            ObjectType::Table => self.tables,
            ObjectType::Function => self.functions,
            ObjectType::Trigger => self.triggers,
            ObjectType::Index => self.indexes,
            ObjectType::Policy => self.policies,
            ObjectType::Extension => self.extensions,
        }
    }
}

/// Result of comparing a source snapshot against a target snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiff {
    pub source_label: String,
    pub target_label: String,
    pub differences: Vec<SchemaDifference>,
    pub summary: DiffSummary,
    pub generated_at: DateTime<Utc>,
    /// Approximate row counts by qualified table name, used for duration estimates
    #[serde(default)]
    pub table_row_counts: IndexMap<String, u64>,
}

impl SchemaDiff {
    /// Build a diff and its summary from already-ordered differences
    pub fn new(
        source_label: &str,
        target_label: &str,
        differences: Vec<SchemaDifference>,
        table_row_counts: IndexMap<String, u64>,
    ) -> Self {
        let summary = DiffSummary::from_differences(&differences);
        Self {
            source_label: source_label.to_string(),
            target_label: target_label.to_string(),
            differences,
            summary,
            generated_at: Utc::now(),
            table_row_counts,
        }
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    /// Differences of one category, in diff order
    pub fn of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &SchemaDifference> {
        self.differences
            .iter()
            .filter(move |d| d.object_type() == object_type)
    }

    /// Find a difference by category and unqualified name
    pub fn find(&self, object_type: ObjectType, name: &str) -> Option<&SchemaDifference> {
        self.of_type(object_type).find(|d| d.name == name)
    }

    /// Recompute the summary after the difference list was edited by hand
    pub fn refresh_summary(&mut self) {
        self.summary = DiffSummary::from_differences(&self.differences);
    }
}
