//! Domain module
//!
//! Core domain types: the event vocabulary and its validation errors.

pub mod error;
pub mod events;

pub use error::DomainError;
pub use events::{fields, Attributes, DimensionsPatch, EventType, MaskEvent, SetAction, SetUpdate};
