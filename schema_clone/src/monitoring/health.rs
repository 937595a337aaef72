//! Health rollup over operations and incidents

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::MonitoringConfig;
use crate::monitoring::incidents::{IncidentSeverity, SecurityIncidentManager};
use crate::monitoring::operation::{OperationMonitor, OperationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus, message: String) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

/// Overall status is the worst of the individual checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub checked_at: DateTime<Utc>,
}

pub struct HealthMonitor {
    operations: Arc<OperationMonitor>,
    incidents: Arc<SecurityIncidentManager>,
    thresholds: MonitoringConfig,
}

impl HealthMonitor {
    pub fn new(
        operations: Arc<OperationMonitor>,
        incidents: Arc<SecurityIncidentManager>,
        thresholds: MonitoringConfig,
    ) -> Self {
        Self {
            operations,
            incidents,
            thresholds,
        }
    }

    pub async fn check(&self) -> HealthReport {
        let now = Utc::now();
        let operations = self.operations.list_operations().await;

        let finished = operations.iter().filter(|op| op.status.is_terminal()).count();
        let failed = operations
            .iter()
            .filter(|op| op.status == OperationStatus::Failed)
            .count();
        let failures = if finished == 0 {
            HealthCheck::new("failures", HealthStatus::Healthy, "no finished operations".to_string())
        } else {
            let ratio = failed as f64 / finished as f64;
            let status = if failed > 0 && ratio >= 1.0 {
                HealthStatus::Unhealthy
            } else if ratio > self.thresholds.max_failure_ratio {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            };
            HealthCheck::new(
                "failures",
                status,
                format!("{} of {} finished operations failed", failed, finished),
            )
        };

        let stall_limit = Duration::seconds(self.thresholds.stall_after_secs);
        let stalled: Vec<&str> = operations
            .iter()
            .filter(|op| op.status == OperationStatus::InProgress && now - op.updated_at > stall_limit)
            .map(|op| op.id.as_str())
            .collect();
        let stalls = if stalled.is_empty() {
            HealthCheck::new("stalled_operations", HealthStatus::Healthy, "none".to_string())
        } else {
            HealthCheck::new(
                "stalled_operations",
                HealthStatus::Degraded,
                format!("no progress on {}", stalled.join(", ")),
            )
        };

        let open = self.incidents.open_incidents().await;
        let worst = open.iter().map(|i| i.severity).max();
        let incident_status = match worst {
            Some(IncidentSeverity::Critical) => HealthStatus::Unhealthy,
            Some(IncidentSeverity::High) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        };
        let incidents = HealthCheck::new(
            "security_incidents",
            incident_status,
            format!("{} open incidents", open.len()),
        );

        let checks = vec![failures, stalls, incidents];
        let status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        if status != HealthStatus::Healthy {
            tracing::warn!(status = %status, "Clone pipeline health check");
        } else {
            tracing::debug!(status = %status, "Clone pipeline health check");
        }

        HealthReport {
            status,
            checks,
            checked_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::incidents::IncidentKind;
    use crate::monitoring::operation::OperationError;

    fn setup() -> (Arc<OperationMonitor>, Arc<SecurityIncidentManager>, HealthMonitor) {
        let operations = Arc::new(OperationMonitor::new());
        let incidents = Arc::new(SecurityIncidentManager::new());
        let health = HealthMonitor::new(operations.clone(), incidents.clone(), MonitoringConfig::default());
        (operations, incidents, health)
    }

    #[tokio::test]
    async fn empty_pipeline_is_healthy() {
        let (_, _, health) = setup();
        let report = health.check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.checks.len(), 3);
    }

    #[tokio::test]
    async fn all_failures_is_unhealthy() {
        let (operations, _, health) = setup();
        let id = operations.start_operation("production", "staging").await;
        operations
            .fail_operation(&id, OperationError::new("boom", "failed"))
            .await
            .unwrap();

        assert_eq!(health.check().await.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn some_failures_degrade() {
        let (operations, _, health) = setup();
        for _ in 0..2 {
            let id = operations.start_operation("production", "staging").await;
            operations.cancel_operation(&id).await.unwrap();
        }
        let id = operations.start_operation("production", "staging").await;
        operations
            .fail_operation(&id, OperationError::new("boom", "failed"))
            .await
            .unwrap();

        let report = health.check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks[0].message, "1 of 3 finished operations failed");
    }

    #[tokio::test]
    async fn open_critical_incident_is_unhealthy() {
        let (_, incidents, health) = setup();
        let id = incidents
            .report_incident(
                IncidentKind::ProductionCredentialExposure,
                IncidentSeverity::Critical,
                "service key copied",
                None,
            )
            .await;
        assert_eq!(health.check().await.status, HealthStatus::Unhealthy);

        incidents.resolve_incident(&id, "key rotated").await.unwrap();
        assert_eq!(health.check().await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn stalled_operation_degrades() {
        let operations = Arc::new(OperationMonitor::new());
        let incidents = Arc::new(SecurityIncidentManager::new());
        let thresholds = MonitoringConfig {
            stall_after_secs: -1,
            ..Default::default()
        };
        let health = HealthMonitor::new(operations.clone(), incidents, thresholds);

        let id = operations.start_operation("production", "staging").await;
        operations
            .update_operation_status(&id, OperationStatus::InProgress, None)
            .await
            .unwrap();

        let report = health.check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks[1].status, HealthStatus::Degraded);
    }
}
