//! Projection module
//!
//! Rebuilds mask state from events and keeps the materialized records
//! (the read model) in sync with it.

mod projector;
mod reprojector;
mod service;

pub use projector::{project, project_stored};
pub use reprojector::{Reprojector, RetryReport, ScheduleOutcome};
pub use service::{ProjectionError, ProjectionService};
