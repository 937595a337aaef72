//! Clone operation tracking
//!
//! Each operation is one mutable record behind its own lock, so updates to the same
//! operation are applied in order while different operations update independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::utils::ids::{IdGenerator, UuidGenerator};

/// Lifecycle state of a clone operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }

    fn can_move_to(self, next: OperationStatus) -> bool {
        use OperationStatus::*;

        match (self, next) {
            (Pending, InProgress | Failed | Cancelled) => true,
            (InProgress, InProgress | Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationStatus::Pending => "pending",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One entry of an operation's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Work counters for an operation; also used as the delta in updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatistics {
    pub tables_processed: u64,
    pub records_processed: u64,
    pub functions_processed: u64,
    pub triggers_processed: u64,
    pub indexes_processed: u64,
    pub policies_processed: u64,
    pub bytes_transferred: u64,
}

impl OperationStatistics {
    fn absorb(&mut self, delta: &OperationStatistics) {
        self.tables_processed = self.tables_processed.saturating_add(delta.tables_processed);
        self.records_processed = self.records_processed.saturating_add(delta.records_processed);
        self.functions_processed = self.functions_processed.saturating_add(delta.functions_processed);
        self.triggers_processed = self.triggers_processed.saturating_add(delta.triggers_processed);
        self.indexes_processed = self.indexes_processed.saturating_add(delta.indexes_processed);
        self.policies_processed = self.policies_processed.saturating_add(delta.policies_processed);
        self.bytes_transferred = self.bytes_transferred.saturating_add(delta.bytes_transferred);
    }
}

/// Failure recorded on an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OperationError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&Error> for OperationError {
    fn from(error: &Error) -> Self {
        let code = match error {
            Error::ConfigError(_) => "config",
            Error::SchemaAnalysisError(_) | Error::InvalidPattern { .. } => "schema_analysis",
            Error::InvalidOperation { .. } => "invalid_operation",
            Error::UnsupportedFeature { .. } => "unsupported_feature",
            Error::SyntaxError { .. } => "syntax",
            _ => "internal",
        };
        OperationError::new(code, error.to_string())
    }
}

/// A tracked clone between two environments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOperation {
    pub id: String,
    pub source_environment: String,
    pub target_environment: String,
    pub status: OperationStatus,
    /// Percent complete, 0 to 100
    pub progress: u8,
    pub logs: Vec<OperationLogEntry>,
    pub statistics: OperationStatistics,
    pub error: Option<OperationError>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CloneOperation {
    /// Progress and statistics are frozen once a terminal status is reached
    fn ensure_active(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::invalid_operation(
                &self.id,
                format!("operation is already {}", self.status),
            ));
        }
        Ok(())
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        let now = Utc::now();
        self.logs.push(OperationLogEntry {
            timestamp: now,
            level,
            message,
        });
        self.updated_at = now;
    }
}

/// Registry of clone operations
pub struct OperationMonitor {
    operations: RwLock<HashMap<String, Arc<Mutex<CloneOperation>>>>,
    ids: Box<dyn IdGenerator>,
}

impl Default for OperationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationMonitor {
    pub fn new() -> Self {
        Self::with_id_generator(UuidGenerator)
    }

    pub fn with_id_generator(ids: impl IdGenerator + 'static) -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            ids: Box::new(ids),
        }
    }

    /// Register a new pending operation and return its id
    pub async fn start_operation(&self, source_environment: &str, target_environment: &str) -> String {
        let id = self.ids.next_id();
        let now = Utc::now();
        let operation = CloneOperation {
            id: id.clone(),
            source_environment: source_environment.to_string(),
            target_environment: target_environment.to_string(),
            status: OperationStatus::Pending,
            progress: 0,
            logs: Vec::new(),
            statistics: OperationStatistics::default(),
            error: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.operations
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(operation)));

        tracing::info!(
            operation_id = id.as_str(),
            source = source_environment,
            target = target_environment,
            "Clone operation started"
        );
        id
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<CloneOperation>>> {
        self.operations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::OperationNotFound(id.to_string()))
    }

    /// Move an operation to a new status, recording an error if given
    pub async fn update_operation_status(
        &self,
        id: &str,
        status: OperationStatus,
        error: Option<OperationError>,
    ) -> Result<()> {
        let entry = self.entry(id).await?;
        let mut operation = entry.lock().await;

        if !operation.status.can_move_to(status) {
            return Err(Error::InvalidStatusTransition {
                id: id.to_string(),
                from: operation.status.to_string(),
                to: status.to_string(),
            });
        }

        let previous = operation.status;
        operation.status = status;
        if let Some(error) = error {
            operation.error = Some(error);
        }
        if status == OperationStatus::Completed {
            operation.progress = 100;
        }
        if status.is_terminal() {
            operation.completed_at = Some(Utc::now());
        }

        if previous != status {
            let level = if status == OperationStatus::Failed {
                LogLevel::Error
            } else {
                LogLevel::Info
            };
            operation.push_log(level, format!("Status changed from {} to {}", previous, status));
        } else {
            operation.updated_at = Utc::now();
        }

        tracing::info!(
            operation_id = id,
            from = %previous,
            to = %status,
            "Clone operation status updated"
        );
        Ok(())
    }

    /// Set progress; values above 100 are clamped and regressions are ignored
    pub async fn update_progress(&self, id: &str, progress: u32) -> Result<()> {
        let entry = self.entry(id).await?;
        let mut operation = entry.lock().await;
        operation.ensure_active()?;

        let progress = progress.min(100) as u8;
        if progress < operation.progress {
            tracing::warn!(
                operation_id = id,
                current = operation.progress,
                requested = progress,
                "Ignoring progress regression"
            );
            return Ok(());
        }

        operation.progress = progress;
        operation.updated_at = Utc::now();
        tracing::debug!(operation_id = id, progress, "Clone operation progress");
        Ok(())
    }

    /// Append a message to the operation's log
    pub async fn log_operation(&self, id: &str, level: LogLevel, message: &str) -> Result<()> {
        let entry = self.entry(id).await?;
        entry.lock().await.push_log(level, message.to_string());

        match level {
            LogLevel::Debug => tracing::debug!(operation_id = id, "{}", message),
            LogLevel::Info => tracing::info!(operation_id = id, "{}", message),
            LogLevel::Warn => tracing::warn!(operation_id = id, "{}", message),
            LogLevel::Error => tracing::error!(operation_id = id, "{}", message),
        }
        Ok(())
    }

    /// Add counters to the operation's statistics
    pub async fn update_statistics(&self, id: &str, delta: &OperationStatistics) -> Result<()> {
        let entry = self.entry(id).await?;
        let mut operation = entry.lock().await;
        operation.ensure_active()?;
        operation.statistics.absorb(delta);
        operation.updated_at = Utc::now();
        Ok(())
    }

    /// Snapshot of one operation
    pub async fn get_operation(&self, id: &str) -> Result<CloneOperation> {
        let entry = self.entry(id).await?;
        let operation = entry.lock().await.clone();
        Ok(operation)
    }

    /// Snapshots of every operation, oldest first
    pub async fn list_operations(&self) -> Vec<CloneOperation> {
        let entries: Vec<_> = self.operations.read().await.values().cloned().collect();

        let mut operations = Vec::with_capacity(entries.len());
        for entry in entries {
            operations.push(entry.lock().await.clone());
        }
        operations.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        operations
    }

    /// Operations that have not reached a terminal status
    pub async fn active_operations(&self) -> Vec<CloneOperation> {
        self.list_operations()
            .await
            .into_iter()
            .filter(|op| !op.status.is_terminal())
            .collect()
    }

    pub async fn fail_operation(&self, id: &str, error: OperationError) -> Result<()> {
        self.update_operation_status(id, OperationStatus::Failed, Some(error))
            .await
    }

    pub async fn cancel_operation(&self, id: &str) -> Result<()> {
        self.update_operation_status(id, OperationStatus::Cancelled, None)
            .await
    }
}
