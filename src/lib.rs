//! syspal - resource enumeration for a system-monitoring agent.
//!
//! This library provides the core functionality used by `syspald`:
//! - `entity` - generic enumeration engine over resource instances
//! - `collector` - concrete resource kinds read from `/proc`, `/sys` and `/etc`

pub mod collector;
pub mod config;
pub mod entity;
pub mod error;
pub mod logging;
