//! Event Store module
//!
//! Persistence layer for Event Sourcing.
//! Append-only mask events and initial snapshots, in PostgreSQL or memory.

mod error;
mod memory;
mod repository;
mod snapshot;

pub use error::EventStoreError;
pub use memory::{InMemoryEventStore, InMemorySnapshotStore};
pub use repository::{EventStore, NewMaskEvent, PgEventStore, StoredEvent};
pub use snapshot::{PgSnapshotStore, Snapshot, SnapshotStore};
