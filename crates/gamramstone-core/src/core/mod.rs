//! Gamramstone Client Core
//!
//! Caption apply orchestration and channel list synchronization.
//! Handles work-status rules, the response envelope, the upload lock,
//! remote adapters and the optimistic list cache.

pub mod api;
pub mod apply;
pub mod cache;
pub mod channel;
pub mod envelope;
pub mod logging;
pub mod models;
pub mod notify;
pub mod platform;
pub mod session;
pub mod settings;
pub mod status;
pub mod upload;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
