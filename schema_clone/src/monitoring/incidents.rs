//! Security incidents raised during cloning

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::ids::{IdGenerator, UuidGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    UnmaskedPersonalData,
    ProductionCredentialExposure,
    UnauthorizedAccess,
    PolicyViolation,
    Other,
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncidentKind::UnmaskedPersonalData => "unmasked_personal_data",
            IncidentKind::ProductionCredentialExposure => "production_credential_exposure",
            IncidentKind::UnauthorizedAccess => "unauthorized_access",
            IncidentKind::PolicyViolation => "policy_violation",
            IncidentKind::Other => "other",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for IncidentSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IncidentSeverity::Low => "low",
            IncidentSeverity::Medium => "medium",
            IncidentSeverity::High => "high",
            IncidentSeverity::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityIncident {
    pub id: String,
    pub kind: IncidentKind,
    pub severity: IncidentSeverity,
    pub description: String,
    pub operation_id: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

impl SecurityIncident {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Keeps incidents in the order they were reported
pub struct SecurityIncidentManager {
    incidents: RwLock<IndexMap<String, SecurityIncident>>,
    ids: Box<dyn IdGenerator>,
}

impl Default for SecurityIncidentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityIncidentManager {
    pub fn new() -> Self {
        Self::with_id_generator(UuidGenerator)
    }

    pub fn with_id_generator(ids: impl IdGenerator + 'static) -> Self {
        Self {
            incidents: RwLock::new(IndexMap::new()),
            ids: Box::new(ids),
        }
    }

    /// Record a new incident and return its id
    pub async fn report_incident(
        &self,
        kind: IncidentKind,
        severity: IncidentSeverity,
        description: &str,
        operation_id: Option<&str>,
    ) -> String {
        let incident = SecurityIncident {
            id: self.ids.next_id(),
            kind,
            severity,
            description: description.to_string(),
            operation_id: operation_id.map(str::to_string),
            reported_at: Utc::now(),
            resolved_at: None,
            resolution: None,
        };

        if severity >= IncidentSeverity::High {
            tracing::error!(
                incident_id = incident.id.as_str(),
                kind = %kind,
                severity = %severity,
                operation_id = ?operation_id,
                "Security incident: {}",
                description
            );
        } else {
            tracing::warn!(
                incident_id = incident.id.as_str(),
                kind = %kind,
                severity = %severity,
                operation_id = ?operation_id,
                "Security incident: {}",
                description
            );
        }

        let id = incident.id.clone();
        self.incidents.write().await.insert(id.clone(), incident);
        id
    }

    /// Close an incident with a resolution note
    pub async fn resolve_incident(&self, id: &str, resolution: &str) -> Result<()> {
        let mut incidents = self.incidents.write().await;
        let incident = incidents
            .get_mut(id)
            .ok_or_else(|| Error::IncidentNotFound(id.to_string()))?;

        if !incident.is_open() {
            return Err(Error::IncidentAlreadyResolved(id.to_string()));
        }

        incident.resolved_at = Some(Utc::now());
        incident.resolution = Some(resolution.to_string());
        tracing::info!(incident_id = id, "Security incident resolved");
        Ok(())
    }

    pub async fn get_incident(&self, id: &str) -> Result<SecurityIncident> {
        self.incidents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::IncidentNotFound(id.to_string()))
    }

    /// Unresolved incidents, oldest first
    pub async fn open_incidents(&self) -> Vec<SecurityIncident> {
        self.incidents
            .read()
            .await
            .values()
            .filter(|i| i.is_open())
            .cloned()
            .collect()
    }

    pub async fn incidents_for_operation(&self, operation_id: &str) -> Vec<SecurityIncident> {
        self.incidents
            .read()
            .await
            .values()
            .filter(|i| i.operation_id.as_deref() == Some(operation_id))
            .cloned()
            .collect()
    }
}
