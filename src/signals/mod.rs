//! Shared bus signals.
//!
//! `BusSnapshot` is the value of every shared line for the current tick. It
//! is rebuilt from scratch at the start of each `step()` (the evaluate
//! phase) and passed by shared reference into every state machine, so no
//! component ever reads another component's mid-update state. Only the
//! fabric writes it; the grant decides whose master-side lines are visible.

use serde::{Deserialize, Serialize};

/// Index of a master port. Master 0 has the highest arbitration priority.
pub type MasterId = usize;

/// Transaction direction, driven by the granted master for the whole
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusMode {
    #[default]
    Read,
    Write,
}

/// Every shared line of the bus, sampled for one tick.
///
/// Master-side lines (`mode`, `wdata`, `mvalid`, `dvalid`) carry the
/// granted master's outputs; they idle low when no grant is held.
/// Slave-side lines (`rdata`, `ssplit`) carry the selected slave's outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusSnapshot {
    /// This tick's grant decision. At most one master, by construction.
    pub grant: Option<MasterId>,

    /// Transaction direction from the granted master.
    pub mode: BusMode,
    /// Serial data bit, master to slave (address and write-data phases).
    pub wdata: bool,
    /// Transaction valid: high from the first address bit until the
    /// granted master returns to idle.
    pub mvalid: bool,
    /// Address-phase qualifier: high only while `wdata` carries device
    /// address or memory-offset bits. A retried split transaction never
    /// raises it.
    pub avalid: bool,
    /// Capture-start strobe: the rising edge of `avalid`, computed by the
    /// fabric. The decoder and the slaves begin shifting only here, so a
    /// rejected address cannot cause a re-capture from mid-stream bits.
    pub astart: bool,
    /// Data-phase bit qualifier: high on each tick a payload bit is
    /// transferred in either direction.
    pub dvalid: bool,

    /// Serial data bit, slave to master (read data phase).
    pub rdata: bool,
    /// Decoder acknowledge toward the granted master.
    pub ack: bool,
    /// Split condition from the selected slave (single-tick pulse).
    pub ssplit: bool,

    /// Which master, if any, owns a pending split transaction. Registered
    /// in the arbiter; persists across idle ticks.
    pub split_pending: Option<MasterId>,
    /// Single-tick pulse: the split owner has been regranted and the
    /// retried transaction may proceed.
    pub split_grant: bool,

    /// Per-slave readiness, sampled this tick.
    pub sready: Vec<bool>,
}

impl BusSnapshot {
    pub fn new(slaves: usize) -> Self {
        Self {
            sready: vec![false; slaves],
            ..Self::default()
        }
    }
}
