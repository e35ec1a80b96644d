//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.

pub mod mask;

pub use mask::MaskProjection;

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized {
    /// The type of events this aggregate handles
    type Event;

    /// Get the current version (number of events applied)
    fn version(&self) -> i64;

    /// Apply an event to update the aggregate state
    fn apply(self, event: Self::Event) -> Self;
}
