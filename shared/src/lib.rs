//! Shared types for the ordering platform
//!
//! Common types used by the order server and its clients: the unified error
//! system, order models, checkout request/response types and realtime
//! message payloads.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;
