//! schema_clone: schema comparison and migration planning for environment cloning
//!
//! schema_clone compares a source database snapshot against a target snapshot, works
//! out the dependency-ordered changes needed to bring the target in line, and turns
//! them into forward and rollback migration scripts. Clone runs are tracked by an
//! operation monitor alongside any security incidents they raise.

pub mod config;
pub mod error;
pub mod monitoring;
pub mod schema;
pub mod snapshot;
pub mod utils;

use std::sync::Arc;

// Re-export main types for easier access
pub use config::Config;
pub use error::{Error, Result};
pub use monitoring::{HealthMonitor, OperationMonitor, SecurityIncidentManager};
pub use schema::comparator::compare_schemas;
pub use schema::diff::SchemaDiff;
pub use schema::generator::{generate_migration_script, MigrationGenerator};
pub use schema::script::MigrationScript;
pub use schema::types::SchemaDefinition;

use monitoring::{LogLevel, OperationError, OperationStatistics, OperationStatus};
use schema::diff::ObjectType;

/// Initialize schema_clone with the specified configuration file
pub fn init(config_path: &str) -> Result<SchemaCloneClient> {
    let config = config::load_from_file(config_path)?;
    Ok(SchemaCloneClient::new(config))
}

/// Result of planning a clone between two environments
#[derive(Debug, Clone)]
pub struct ClonePlan {
    pub operation_id: String,
    pub diff: SchemaDiff,
    pub script: MigrationScript,
}

/// The main client for planning environment clones
pub struct SchemaCloneClient {
    config: Config,
    monitor: Arc<OperationMonitor>,
    incidents: Arc<SecurityIncidentManager>,
}

impl SchemaCloneClient {
    /// Create a new client from configuration
    pub fn new(config: Config) -> Self {
        Self::with_monitors(
            config,
            Arc::new(OperationMonitor::new()),
            Arc::new(SecurityIncidentManager::new()),
        )
    }

    /// Create a client that reports into existing monitors
    pub fn with_monitors(
        config: Config,
        monitor: Arc<OperationMonitor>,
        incidents: Arc<SecurityIncidentManager>,
    ) -> Self {
        Self {
            config,
            monitor,
            incidents,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn monitor(&self) -> Arc<OperationMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn incidents(&self) -> Arc<SecurityIncidentManager> {
        Arc::clone(&self.incidents)
    }

    /// Health of the clone pipeline as seen by this client's monitors
    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.monitor(),
            self.incidents(),
            self.config.monitoring.clone(),
        )
    }

    /// Compare two snapshots and generate the migration script as one monitored operation.
    ///
    /// A failure is recorded on the operation before it is returned.
    pub async fn plan_clone(
        &self,
        source_environment: &str,
        target_environment: &str,
        source: &SchemaDefinition,
        target: &SchemaDefinition,
    ) -> Result<ClonePlan> {
        let id = self
            .monitor
            .start_operation(source_environment, target_environment)
            .await;
        self.monitor
            .update_operation_status(&id, OperationStatus::InProgress, None)
            .await?;

        match self.run_plan(&id, source, target).await {
            Ok((diff, script)) => {
                self.monitor
                    .update_operation_status(&id, OperationStatus::Completed, None)
                    .await?;
                Ok(ClonePlan {
                    operation_id: id,
                    diff,
                    script,
                })
            }
            Err(error) => {
                self.monitor
                    .log_operation(&id, LogLevel::Error, &error.to_string())
                    .await?;
                self.monitor
                    .fail_operation(&id, OperationError::from(&error))
                    .await?;
                Err(error)
            }
        }
    }

    async fn run_plan(
        &self,
        id: &str,
        source: &SchemaDefinition,
        target: &SchemaDefinition,
    ) -> Result<(SchemaDiff, MigrationScript)> {
        self.monitor
            .log_operation(id, LogLevel::Info, "Comparing schemas")
            .await?;
        let diff = compare_schemas(source, target, &self.config.comparison)?;
        self.monitor.update_progress(id, 50).await?;

        let summary = &diff.summary;
        self.monitor
            .update_statistics(
                id,
                &OperationStatistics {
                    tables_processed: summary.count_for(ObjectType::Table) as u64,
                    functions_processed: summary.count_for(ObjectType::Function) as u64,
                    triggers_processed: summary.count_for(ObjectType::Trigger) as u64,
                    indexes_processed: summary.count_for(ObjectType::Index) as u64,
                    policies_processed: summary.count_for(ObjectType::Policy) as u64,
                    ..Default::default()
                },
            )
            .await?;
        self.monitor
            .log_operation(
                id,
                LogLevel::Info,
                &format!("Found {} differences", summary.total_differences),
            )
            .await?;

        let script = generate_migration_script(&diff, &self.config.generator)?;
        self.monitor
            .log_operation(
                id,
                LogLevel::Info,
                &format!(
                    "Generated {} operations ({} rollback), risk {}",
                    script.operations.len(),
                    script.rollback_operations.len(),
                    script.risk_level
                ),
            )
            .await?;
        self.monitor.update_progress(id, 100).await?;

        Ok((diff, script))
    }
}
