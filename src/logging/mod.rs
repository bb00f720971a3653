//! Structured logging with inventory context.
//!
//! Provides the log context that prefixes every message with the inventory
//! name and the entity code, plus the `env_logger` setup.

pub mod structured;

pub use structured::*;
