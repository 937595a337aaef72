//! Observability for clone operations
//!
//! Tracks long-running clone operations, records security incidents raised while
//! cloning, and rolls both up into a health report.

pub mod health;
pub mod incidents;
pub mod operation;

pub use health::{HealthCheck, HealthMonitor, HealthReport, HealthStatus};
pub use incidents::{IncidentKind, IncidentSeverity, SecurityIncident, SecurityIncidentManager};
pub use operation::{
    CloneOperation, LogLevel, OperationError, OperationLogEntry, OperationMonitor,
    OperationStatistics, OperationStatus,
};
