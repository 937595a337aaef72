//! Utilities for schema_clone
//!
//! This module provides utility functions used across the library.

pub mod ids;
pub mod logging;
pub mod sql;

pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use logging::init_logging;
