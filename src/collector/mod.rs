//! Resource kinds of a Linux host.
//!
//! Each kind pairs a [`Source`](crate::entity::Source) with its instance
//! type and reads everything through the [`FileSystem`] trait, so it can run
//! against a mocked tree on any platform.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Inventory                           │
//! │  ┌────────────────────────┐   ┌──────────────────────────┐  │
//! │  │  Total-only kinds      │   │  Indexed kinds           │  │
//! │  │  - memory              │   │  - cpu      (/proc/stat) │  │
//! │  │  - os                  │   │  - disk     (mounts)     │  │
//! │  │  - bios                │   │  - network  (sysfs)      │  │
//! │  └──────────┬─────────────┘   │  - software (dpkg)       │  │
//! │             │                 └────────────┬─────────────┘  │
//! │             └──────────────┬───────────────┘                │
//! │                     ┌──────▼──────┐                         │
//! │                     │  FileSystem │ (trait)                 │
//! │                     └──────┬──────┘                         │
//! └────────────────────────────┼────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              │               │               │
//!       ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!       │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!       │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Linux)
//!
//! ```ignore
//! use syspal::collector::{Inventory, RealFs};
//! use syspal::config::Config;
//!
//! let mut inventory = Inventory::new(RealFs::new(), &Config::default());
//! inventory.init();
//! let snapshot = inventory.snapshot();
//! ```
//!
//! ## Testing
//!
//! ```
//! use syspal::collector::{Inventory, MockFs};
//! use syspal::config::Config;
//!
//! let mut inventory = Inventory::new(MockFs::typical_system(), &Config::default());
//! inventory.init();
//! assert_eq!(inventory.disk().size(), 2);
//! ```

pub mod bios;
pub mod cpu;
pub mod disk;
pub mod inventory;
pub mod memory;
pub mod mock;
pub mod network;
pub mod os;
pub mod parser;
pub mod software;
pub mod traits;

pub use bios::BiosSource;
pub use cpu::CpuSource;
pub use disk::DiskSource;
pub use inventory::{Inventory, InventorySnapshot, InventoryTiming};
pub use memory::MemorySource;
pub use mock::MockFs;
pub use network::NetworkSource;
pub use os::OsSource;
pub use software::SoftwareSource;
pub use traits::{FileSystem, FsSpace, RealFs};
