//! Generic resource-instance framework.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Enumeration<S>                      │
//! │  ┌───────────────────────────┐   ┌────────────────┐  │
//! │  │ IndexMap<InstanceId, I>   │   │ Option<I>      │  │
//! │  │ (discovery order)         │   │ (Total)        │  │
//! │  └───────────────────────────┘   └────────────────┘  │
//! │                      │                               │
//! │               ┌──────▼──────┐                        │
//! │               │  Source     │ (trait, one per kind)  │
//! │               └──────┬──────┘                        │
//! └──────────────────────┼───────────────────────────────┘
//!                        │
//!                 ┌──────▼──────┐
//!                 │ FileSystem  │ (dependency provider)
//!                 └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use syspal::collector::{MemorySource, MockFs};
//! use syspal::entity::Enumeration;
//!
//! let fs = MockFs::typical_system();
//! let mut memory = Enumeration::new(MemorySource::new(fs, "/proc"));
//! memory.init();
//! memory.update(true).unwrap();
//!
//! assert_eq!(memory.size(), 0);
//! let total = memory.get_total_instance().unwrap();
//! assert!(total.info().total_kb > 0);
//! ```

mod enumeration;
mod id;
mod instance;

pub use enumeration::{
    Enumeration, EnumerationState, Reconciliation, RefreshStats, RemovalPolicy, Source,
    UpdateReport,
};
pub use id::InstanceId;
pub use instance::{Instance, InstanceCore};
