//! Command Handlers module
//!
//! Handlers that orchestrate writes: validation, the event store and the
//! hand-off to reprojection.

mod append_event_handler;
mod commands;
mod create_mask_handler;

#[cfg(test)]
mod tests;

pub use append_event_handler::AppendEventHandler;
pub use commands::*;
pub use create_mask_handler::CreateMaskHandler;
