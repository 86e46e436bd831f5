//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Janitor: removes expired entries and enforces the soft memory limit

mod janitor;

pub use janitor::{Janitor, JanitorConfig, JanitorHandle, SweepReport};
