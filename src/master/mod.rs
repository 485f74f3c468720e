//! Master-side transaction state machine.
//!
//! A master turns one logical transaction — read or write of one byte at
//! one device/offset — into the full serial protocol: request the bus,
//! serialize the device address (MSB first) and the memory offset (LSB
//! first), wait for the decoder's acknowledge, then run the 8-bit data
//! phase (LSB first).
//!
//! Two ways out of the happy path:
//! - the target slave defers the transaction (split): the master parks in
//!   `SplitWait`, releases the bus, and retries once the slave reports
//!   ready — without resending either address field;
//! - a bounded wait for grant or acknowledge expires: the transaction is
//!   surfaced to the client as a typed failure instead of hanging the bus.
//!   The bound applies to fresh requests only; a split retry waits as long
//!   as it takes.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BusConfig;
use crate::signals::{BusMode, BusSnapshot, MasterId};
use crate::wire::{BitOrder, ShiftIn, ShiftOut, DATA_BITS};

/// One logical bus transaction, as issued by a master's owning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Target device id.
    pub device: u16,
    /// Byte offset within the device's memory.
    pub offset: u16,
    /// Payload for writes; ignored for reads.
    pub data: u8,
    pub mode: BusMode,
}

impl Transaction {
    pub fn read(device: u16, offset: u16) -> Self {
        Self {
            device,
            offset,
            data: 0,
            mode: BusMode::Read,
        }
    }

    pub fn write(device: u16, offset: u16, data: u8) -> Self {
        Self {
            device,
            offset,
            data,
            mode: BusMode::Write,
        }
    }
}

/// Successful completion of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// The byte read back; `None` for writes.
    pub data: Option<u8>,
}

/// The only client-visible failure: a bounded wait expired. Split
/// deferrals are not failures and never surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransactionError {
    #[error("bus grant not received within {0} ticks")]
    GrantTimeout(u32),
    #[error("no acknowledge from target device within {0} ticks")]
    AckTimeout(u32),
}

pub type TransactionResult = Result<Completion, TransactionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum MasterState {
    Idle,
    RequestBus,
    BusGranted,
    SendDeviceAddress,
    SendMemoryAddress,
    WaitAck,
    DataPhase,
    SplitWait,
}

/// The master-side lines this port would drive, sampled each tick. The
/// fabric multiplexes the granted master's lines onto the shared bus; a
/// master that does not hold the grant is never visible there.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterLines {
    pub bus_request: bool,
    pub target: Option<u16>,
    pub mode: BusMode,
    pub mvalid: bool,
    pub avalid: bool,
    pub dvalid: bool,
    pub wdata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterPort {
    id: MasterId,
    state: MasterState,
    txn: Option<Transaction>,
    dev_out: Option<ShiftOut>,
    addr_out: Option<ShiftOut>,
    data_out: Option<ShiftOut>,
    data_in: Option<ShiftIn>,
    wait_ticks: u32,
    retrying: bool,
    result: Option<TransactionResult>,
}

impl MasterPort {
    pub fn new(id: MasterId) -> Self {
        Self {
            id,
            state: MasterState::Idle,
            txn: None,
            dev_out: None,
            addr_out: None,
            data_out: None,
            data_in: None,
            wait_ticks: 0,
            retrying: false,
            result: None,
        }
    }

    pub fn id(&self) -> MasterId {
        self.id
    }

    pub fn is_idle(&self) -> bool {
        self.state == MasterState::Idle
    }

    /// Whether this master currently occupies the bus (any state past the
    /// grant). Used by harnesses to check mutual exclusion.
    pub fn is_on_bus(&self) -> bool {
        matches!(
            self.state,
            MasterState::BusGranted
                | MasterState::SendDeviceAddress
                | MasterState::SendMemoryAddress
                | MasterState::WaitAck
                | MasterState::DataPhase
        )
    }

    /// Hand the port a transaction to drive. Returns `false` (and drops
    /// the transaction) if one is already in flight.
    pub fn begin(&mut self, txn: Transaction) -> bool {
        if self.state != MasterState::Idle {
            warn!("master {}: transaction rejected, port busy", self.id);
            return false;
        }
        trace!(
            "master {}: {:?} device {} offset {:#05x}",
            self.id,
            txn.mode,
            txn.device,
            txn.offset
        );
        self.txn = Some(txn);
        self.result = None;
        self.retrying = false;
        self.wait_ticks = 0;
        self.state = MasterState::RequestBus;
        true
    }

    /// Completion or failure of the last transaction, once. In-flight
    /// transactions report nothing.
    pub fn take_result(&mut self) -> Option<TransactionResult> {
        self.result.take()
    }

    // ========== Lines sampled into the snapshot ==========

    pub fn lines(&self) -> MasterLines {
        let txn = self.txn.as_ref();
        let mut lines = MasterLines {
            bus_request: self.state != MasterState::Idle,
            target: txn.map(|t| t.device),
            mode: txn.map(|t| t.mode).unwrap_or_default(),
            ..MasterLines::default()
        };
        match self.state {
            MasterState::SendDeviceAddress => {
                lines.mvalid = true;
                lines.avalid = true;
                lines.wdata = self.dev_out.as_ref().is_some_and(|s| !s.done() && s.bit());
            }
            MasterState::SendMemoryAddress => {
                lines.mvalid = true;
                lines.avalid = true;
                lines.wdata = self.addr_out.as_ref().is_some_and(|s| !s.done() && s.bit());
            }
            MasterState::WaitAck => {
                lines.mvalid = true;
            }
            MasterState::DataPhase => {
                lines.mvalid = true;
                lines.dvalid = true;
                if lines.mode == BusMode::Write {
                    lines.wdata =
                        self.data_out.as_ref().is_some_and(|s| !s.done() && s.bit());
                }
            }
            _ => {}
        }
        lines
    }

    // ========== Per-tick state update ==========

    pub fn tick(&mut self, cfg: &BusConfig, snap: &BusSnapshot) {
        match self.state {
            MasterState::Idle => {}
            MasterState::RequestBus => {
                if snap.grant == Some(self.id) {
                    self.state = MasterState::BusGranted;
                } else if !self.retrying {
                    // A retry's re-request is part of the split path and is
                    // not bounded; abandoning it would strand the arbiter's
                    // ownership record.
                    self.bump_wait(cfg, TransactionError::GrantTimeout(cfg.request_timeout()));
                }
            }
            MasterState::BusGranted => {
                if self.retrying {
                    // Retried split transaction: the decoder and slave kept
                    // the routing and the offset, so skip both address
                    // phases.
                    self.wait_ticks = 0;
                    self.state = MasterState::WaitAck;
                } else if let Some(txn) = self.txn {
                    self.dev_out = Some(ShiftOut::new(
                        txn.device,
                        cfg.device_addr_width(),
                        BitOrder::MsbFirst,
                    ));
                    self.state = MasterState::SendDeviceAddress;
                }
            }
            MasterState::SendDeviceAddress => {
                if self.dev_out.as_mut().is_some_and(ShiftOut::advance) {
                    if let Some(txn) = self.txn {
                        // An invalid device id has no mapped offset width;
                        // serialize at the widest one. Nobody decodes it —
                        // the transaction dies in the decoder anyway.
                        let width = cfg
                            .device(txn.device)
                            .map_or_else(|| cfg.max_offset_width(), |d| d.offset_width);
                        self.addr_out =
                            Some(ShiftOut::new(txn.offset, width, BitOrder::LsbFirst));
                    }
                    self.state = MasterState::SendMemoryAddress;
                }
            }
            MasterState::SendMemoryAddress => {
                if self.addr_out.as_mut().is_some_and(ShiftOut::advance) {
                    self.wait_ticks = 0;
                    self.state = MasterState::WaitAck;
                }
            }
            MasterState::WaitAck => {
                if snap.ssplit {
                    debug!("master {}: transaction deferred, waiting out the split", self.id);
                    self.retrying = true;
                    self.state = MasterState::SplitWait;
                } else if snap.ack {
                    self.begin_data_phase();
                } else {
                    self.bump_wait(cfg, TransactionError::AckTimeout(cfg.request_timeout()));
                }
            }
            MasterState::DataPhase => {
                let mode = self.txn.map(|t| t.mode).unwrap_or_default();
                match mode {
                    BusMode::Write => {
                        if self.data_out.as_mut().is_some_and(ShiftOut::advance) {
                            self.complete(None);
                        }
                    }
                    BusMode::Read => {
                        if self
                            .data_in
                            .as_mut()
                            .is_some_and(|s| s.push(snap.rdata))
                        {
                            let byte = self.data_in.as_ref().map_or(0, ShiftIn::value) as u8;
                            self.complete(Some(byte));
                        }
                    }
                }
            }
            MasterState::SplitWait => {
                // Not a bounded wait: a split is an expected deferral, and
                // the retry fires as soon as the target reports ready.
                let ready = self
                    .txn
                    .and_then(|t| cfg.device(t.device))
                    .is_some_and(|d| snap.sready[d.slave]);
                if ready {
                    self.wait_ticks = 0;
                    self.state = MasterState::RequestBus;
                }
            }
        }
    }

    pub fn reset(&mut self) {
        // Discards any in-flight transaction with no completion signal.
        *self = Self::new(self.id);
    }

    fn begin_data_phase(&mut self) {
        if let Some(txn) = self.txn {
            if txn.mode == BusMode::Write {
                self.data_out = Some(ShiftOut::new(
                    u16::from(txn.data),
                    DATA_BITS,
                    BitOrder::LsbFirst,
                ));
            }
        }
        self.data_in = Some(ShiftIn::new(DATA_BITS, BitOrder::LsbFirst));
        self.state = MasterState::DataPhase;
    }

    fn complete(&mut self, data: Option<u8>) {
        trace!("master {}: transaction complete ({data:02X?})", self.id);
        self.result = Some(Ok(Completion { data }));
        self.finish();
    }

    fn bump_wait(&mut self, cfg: &BusConfig, err: TransactionError) {
        self.wait_ticks += 1;
        if self.wait_ticks >= cfg.request_timeout() {
            debug!("master {}: {err}", self.id);
            self.result = Some(Err(err));
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.txn = None;
        self.dev_out = None;
        self.addr_out = None;
        self.data_out = None;
        self.data_in = None;
        self.retrying = false;
        self.wait_ticks = 0;
        self.state = MasterState::Idle;
    }
}

#[cfg(test)]
mod tests;
