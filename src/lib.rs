//! mask_catalog Library
//!
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod jobs;
pub mod matching;
pub mod projection;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorResponse};
pub use domain::{Attributes, DomainError, EventType, MaskEvent};
