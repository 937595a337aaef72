//! Migration script types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::diff::ObjectType;
use crate::utils::sql::check_statement;

/// Risk of running an operation against a live database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// One level higher, saturating at `High`
    pub fn raised(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium | RiskLevel::High => RiskLevel::High,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Ddl,
}

/// One statement of a migration script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOperation {
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub sql: String,
    pub dependencies: Vec<String>,
    /// Milliseconds
    pub estimated_duration: u64,
    pub risk_level: RiskLevel,
    pub object_type: ObjectType,
    pub object_name: String,
}

/// Ordered forward and rollback operations derived from a schema diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationScript {
    pub id: String,
    pub source_label: String,
    pub target_label: String,
    pub operations: Vec<MigrationOperation>,
    pub rollback_operations: Vec<MigrationOperation>,
    pub dependencies: Vec<String>,
    /// Sum of the forward operation estimates, in milliseconds
    pub estimated_duration: u64,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

impl MigrationScript {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Forward statements joined into one SQL document
    pub fn forward_sql(&self) -> String {
        join_sql(&self.operations)
    }

    /// Rollback statements joined into one SQL document
    pub fn rollback_sql(&self) -> String {
        join_sql(&self.rollback_operations)
    }

    /// Re-check every statement's shape, e.g. after loading a saved script
    pub fn validate(&self) -> Result<()> {
        for operation in self.operations.iter().chain(&self.rollback_operations) {
            if let Some(reason) = check_statement(&operation.sql) {
                return Err(Error::SyntaxError {
                    object: operation.object_name.clone(),
                    reason,
                });
            }
        }
        if self.estimated_duration != self.operations.iter().map(|o| o.estimated_duration).sum::<u64>() {
            return Err(Error::invalid_operation(
                &self.id,
                "estimated duration does not match the sum of its operations",
            ));
        }
        Ok(())
    }
}

fn join_sql(operations: &[MigrationOperation]) -> String {
    let mut sql = String::new();
    for operation in operations {
        sql.push_str(&operation.sql);
        sql.push('\n');
    }
    sql
}
