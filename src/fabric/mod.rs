//! The bus fabric: one arbiter, one address decoder, N masters, M slaves,
//! and the selection logic that puts exactly one master's lines — and one
//! slave's response lines — on the shared bus each tick.
//!
//! ## Tick discipline
//!
//! The hardware this models is a set of clocked state machines advancing
//! in lockstep. `step()` reproduces that without threads or locks:
//!
//! 1. **Evaluate**: build a fresh [`BusSnapshot`] purely from committed
//!    state — slave readiness, master lines, the arbiter's combinational
//!    grant, the decoder's acknowledge. Nothing is mutated that another
//!    component might read this tick.
//! 2. **Commit**: hand the finished snapshot to every state machine so
//!    each computes its next state from the same view of the bus.
//!
//! A component therefore never observes another component's already
//! updated state within a tick, which is exactly the previous-clock-edge
//! semantics of the hardware.

use log::trace;

use crate::arbiter::{Arbiter, RequestLine};
use crate::config::BusConfig;
use crate::decoder::AddressDecoder;
use crate::master::{MasterLines, MasterPort, Transaction, TransactionResult};
use crate::signals::{BusSnapshot, MasterId};
use crate::slave::SlavePort;

#[derive(Debug)]
pub struct BusFabric {
    cfg: BusConfig,
    arbiter: Arbiter,
    decoder: AddressDecoder,
    masters: Vec<MasterPort>,
    slaves: Vec<SlavePort>,
    /// The last completed tick's shared-line values, kept for inspection.
    snapshot: BusSnapshot,
    /// Address-phase qualifier of the previous tick, for the rising-edge
    /// capture-start strobe.
    prev_avalid: bool,
    ticks: u64,
}

impl BusFabric {
    pub fn new(cfg: BusConfig) -> Self {
        let masters = (0..cfg.masters()).map(MasterPort::new).collect();
        // Slave i serves whichever device id the map routes to it; the
        // config guarantees the routing is one-to-one.
        let slaves = (0..cfg.slaves())
            .filter_map(|s| {
                let id = cfg.devices().iter().position(|d| d.slave == s)?;
                SlavePort::new(id as u16, &cfg)
            })
            .collect();
        let snapshot = BusSnapshot::new(cfg.slaves());
        Self {
            cfg,
            arbiter: Arbiter::new(),
            decoder: AddressDecoder::new(),
            masters,
            slaves,
            snapshot,
            prev_avalid: false,
            ticks: 0,
        }
    }

    /// The reference two-master/three-slave topology.
    pub fn with_default_topology() -> Self {
        Self::new(BusConfig::default_topology())
    }

    /// Advance the whole fabric by one tick.
    pub fn step(&mut self) {
        // ---- evaluate ----
        let mut snap = BusSnapshot::new(self.cfg.slaves());
        for (i, slave) in self.slaves.iter().enumerate() {
            snap.sready[i] = slave.ready();
        }
        // Response lines come from whichever slave the decoder routed the
        // transaction to.
        if let Some(sel) = self.decoder.selected() {
            snap.ssplit = self.slaves[sel].split_asserted();
            snap.rdata = self.slaves[sel].rdata();
        }

        let lines: Vec<MasterLines> = self.masters.iter().map(MasterPort::lines).collect();
        let requests: Vec<RequestLine> = lines
            .iter()
            .map(|l| RequestLine {
                active: l.bus_request,
                target: l.target,
            })
            .collect();

        snap.split_pending = self.arbiter.split_owner();
        snap.split_grant = self.arbiter.split_grant();
        snap.grant = self
            .arbiter
            .decide(&self.cfg, &requests, &snap.sready, snap.ssplit);

        // Selection: only the granted master's lines reach the shared bus.
        if let Some(g) = snap.grant {
            let owner = &lines[g];
            snap.mode = owner.mode;
            snap.wdata = owner.wdata;
            snap.mvalid = owner.mvalid;
            snap.avalid = owner.avalid;
            snap.dvalid = owner.dvalid;
        }
        snap.astart = snap.avalid && !self.prev_avalid;

        snap.ack = self.decoder.eval(&self.cfg, &snap);

        // ---- commit ----
        for master in &mut self.masters {
            master.tick(&self.cfg, &snap);
        }
        for slave in &mut self.slaves {
            slave.tick(&snap);
        }
        self.arbiter.commit();
        self.decoder.commit();

        debug_assert!(
            self.masters.iter().filter(|m| m.is_on_bus()).count() <= 1,
            "bus mutual exclusion violated"
        );

        self.prev_avalid = snap.avalid;
        self.snapshot = snap;
        self.ticks += 1;
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Step until every master is idle, up to `max_ticks`. Returns whether
    /// the bus actually drained.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> bool {
        for _ in 0..max_ticks {
            if self.masters.iter().all(MasterPort::is_idle) {
                return true;
            }
            self.step();
        }
        self.masters.iter().all(MasterPort::is_idle)
    }

    /// Queue a transaction on a master. Returns `false` if that master is
    /// already driving one.
    pub fn submit(&mut self, master: MasterId, txn: Transaction) -> bool {
        self.masters[master].begin(txn)
    }

    /// Completion or failure of a master's last transaction, once.
    pub fn poll(&mut self, master: MasterId) -> Option<TransactionResult> {
        self.masters[master].take_result()
    }

    /// Convenience driver: submit on one master and step until it reports,
    /// up to `max_ticks`. `None` means the transaction did not finish in
    /// the budget (e.g. an endless split wait).
    pub fn run_transaction(
        &mut self,
        master: MasterId,
        txn: Transaction,
        max_ticks: u64,
    ) -> Option<TransactionResult> {
        if !self.submit(master, txn) {
            return None;
        }
        for _ in 0..max_ticks {
            self.step();
            if let Some(result) = self.poll(master) {
                return Some(result);
            }
        }
        None
    }

    /// Global reset: every state machine back to idle, in-flight
    /// transactions discarded with no completion signal. Slave memory
    /// contents survive.
    pub fn reset(&mut self) {
        trace!("fabric: global reset at tick {}", self.ticks);
        self.arbiter.reset();
        self.decoder.reset();
        for master in &mut self.masters {
            master.reset();
        }
        for slave in &mut self.slaves {
            slave.reset();
        }
        self.prev_avalid = false;
        self.snapshot = BusSnapshot::new(self.cfg.slaves());
    }

    pub fn cfg(&self) -> &BusConfig {
        &self.cfg
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Shared-line values of the last completed tick.
    pub fn snapshot(&self) -> &BusSnapshot {
        &self.snapshot
    }

    pub fn master(&self, id: MasterId) -> &MasterPort {
        &self.masters[id]
    }

    pub fn masters(&self) -> &[MasterPort] {
        &self.masters
    }

    /// Slave by slave index.
    pub fn slave(&self, index: usize) -> &SlavePort {
        &self.slaves[index]
    }

    pub fn slave_mut(&mut self, index: usize) -> &mut SlavePort {
        &mut self.slaves[index]
    }

    /// Slave by the device id it serves.
    pub fn slave_for_device(&self, device: u16) -> Option<&SlavePort> {
        let index = self.cfg.device(device)?.slave;
        Some(&self.slaves[index])
    }

    pub fn slave_for_device_mut(&mut self, device: u16) -> Option<&mut SlavePort> {
        let index = self.cfg.device(device)?.slave;
        Some(&mut self.slaves[index])
    }

    pub(crate) fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub(crate) fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }
}


#[cfg(test)]
mod tests_property;
