//! Weft - an instrumentable software model of a bit-serial system bus
//!
//! This library models a small on-chip interconnect: multiple masters,
//! multiple memory-mapped slaves, priority arbitration, address-based
//! routing and split-transaction support, all advancing in globally
//! synchronous ticks.

pub mod arbiter;
pub mod bridge;
pub mod config;
pub mod decoder;
pub mod fabric;
pub mod inspect;
pub mod master;
pub mod memory;
pub mod signals;
pub mod slave;
pub mod wire;

pub use config::{BusConfig, ConfigError, DeviceMapEntry};
pub use fabric::BusFabric;
pub use inspect::Inspectable;
pub use master::{Completion, Transaction, TransactionError, TransactionResult};
pub use signals::{BusMode, BusSnapshot, MasterId};
