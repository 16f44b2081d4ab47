//! Data models
//!
//! All IDs are `i64` snowflakes (see [`crate::util::snowflake_id`]).

pub mod order;

// Re-exports
pub use order::*;
