//! Slave-side transaction state machine.
//!
//! A slave follows the serial stream whenever a granted master starts a
//! transaction: it shifts in the device-address prefix, bails out if the
//! id is not its own, then captures the memory offset and runs the data
//! phase against its backing memory.
//!
//! A split-capable slave with a pending service delay defers instead of
//! completing the data phase: it pulses its split line, goes busy while
//! the backing access completes on its own, then reports ready again and
//! services the retried data phase from the offset it captured the first
//! time around.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::BusConfig;
use crate::memory::Memory;
use crate::signals::{BusMode, BusSnapshot};
use crate::wire::{BitOrder, ShiftIn, ShiftOut, DATA_BITS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SlaveState {
    Idle,
    CaptureDeviceAddress,
    CaptureMemoryAddress,
    DataPhase,
    /// Split entry: the split line is pulsed for exactly this one tick.
    SplitInit,
    /// Backing access in flight; readiness deasserted.
    SplitBusy,
    /// Backing access done; waiting for the retried data phase.
    SplitReady,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlavePort {
    device_id: u16,
    dev_addr_width: u8,
    offset_width: u8,
    split_capable: bool,
    mem: Memory,

    state: SlaveState,
    id_shift: Option<ShiftIn>,
    addr_shift: Option<ShiftIn>,
    data_in: Option<ShiftIn>,
    data_out: Option<ShiftOut>,
    offset: u16,
    mode: BusMode,

    /// Ticks the next backing access will take before it can be serviced.
    /// Consumed by the split entry; zero means accesses complete in the
    /// normal protocol window.
    service_delay: u32,
    busy_left: u32,
}

impl SlavePort {
    /// Build the slave serving `device_id` in `cfg`'s address map.
    ///
    /// Returns `None` when the id is not in the map.
    pub fn new(device_id: u16, cfg: &BusConfig) -> Option<Self> {
        let dev = cfg.device(device_id)?;
        Some(Self {
            device_id,
            dev_addr_width: cfg.device_addr_width(),
            offset_width: dev.offset_width,
            split_capable: dev.split_capable,
            mem: Memory::new(dev.mem_size()),
            state: SlaveState::Idle,
            id_shift: None,
            addr_shift: None,
            data_in: None,
            data_out: None,
            offset: 0,
            mode: BusMode::Read,
            service_delay: 0,
            busy_left: 0,
        })
    }

    pub fn device_id(&self) -> u16 {
        self.device_id
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// Model the next backing access taking `ticks` ticks. A non-zero
    /// delay makes a split-capable slave defer its next transaction; a
    /// plain slave ignores it.
    pub fn set_service_delay(&mut self, ticks: u32) {
        self.service_delay = ticks;
    }

    // ========== Lines sampled into the snapshot ==========

    /// Readiness as seen by the arbiter and decoder. Deasserted only
    /// while deferred split work is in flight.
    pub fn ready(&self) -> bool {
        !matches!(self.state, SlaveState::SplitInit | SlaveState::SplitBusy)
    }

    /// Split condition pulse (high for the single `SplitInit` tick).
    pub fn split_asserted(&self) -> bool {
        self.state == SlaveState::SplitInit
    }

    /// Read-data bit currently presented to the bus.
    pub fn rdata(&self) -> bool {
        match self.state {
            SlaveState::DataPhase | SlaveState::SplitReady => {
                self.mode == BusMode::Read
                    && self.data_out.as_ref().is_some_and(|s| !s.done() && s.bit())
            }
            _ => false,
        }
    }

    // ========== Per-tick state update ==========

    pub fn tick(&mut self, snap: &BusSnapshot) {
        match self.state {
            SlaveState::Idle => {
                if snap.grant.is_some() && snap.astart {
                    self.mode = snap.mode;
                    let mut shifter = ShiftIn::new(self.dev_addr_width, BitOrder::MsbFirst);
                    let full = shifter.push(snap.wdata);
                    self.id_shift = Some(shifter);
                    if full {
                        self.resolve_device_match();
                    } else {
                        self.state = SlaveState::CaptureDeviceAddress;
                    }
                }
            }
            SlaveState::CaptureDeviceAddress => {
                if !snap.avalid {
                    self.state = SlaveState::Idle;
                } else if self
                    .id_shift
                    .as_mut()
                    .is_some_and(|s| s.push(snap.wdata))
                {
                    self.resolve_device_match();
                }
            }
            SlaveState::CaptureMemoryAddress => {
                if !snap.avalid {
                    self.state = SlaveState::Idle;
                } else if self
                    .addr_shift
                    .as_mut()
                    .is_some_and(|s| s.push(snap.wdata))
                {
                    self.offset = self.addr_shift.as_ref().map_or(0, ShiftIn::value);
                    if self.split_capable && self.service_delay > 0 {
                        debug!(
                            "slave {}: deferring {:?} at {:#05x} ({} tick access)",
                            self.device_id, self.mode, self.offset, self.service_delay
                        );
                        self.state = SlaveState::SplitInit;
                    } else {
                        self.enter_data_phase();
                    }
                }
            }
            SlaveState::DataPhase => {
                if snap.dvalid {
                    self.transfer_data_bit(snap);
                } else if !snap.mvalid {
                    // Master abandoned the transaction (timeout or reset).
                    self.state = SlaveState::Idle;
                }
            }
            SlaveState::SplitInit => {
                self.busy_left = self.service_delay;
                self.service_delay = 0;
                self.state = SlaveState::SplitBusy;
            }
            SlaveState::SplitBusy => {
                self.busy_left -= 1;
                if self.busy_left == 0 {
                    // The backing access has completed on its own; arm the
                    // data phase for the retried transaction.
                    match self.mode {
                        BusMode::Read => {
                            self.data_out = Some(ShiftOut::new(
                                u16::from(self.mem.read(self.offset)),
                                DATA_BITS,
                                BitOrder::LsbFirst,
                            ));
                        }
                        BusMode::Write => {
                            self.data_in = Some(ShiftIn::new(DATA_BITS, BitOrder::LsbFirst));
                        }
                    }
                    debug!("slave {}: backing access done, ready again", self.device_id);
                    self.state = SlaveState::SplitReady;
                }
            }
            SlaveState::SplitReady => {
                if snap.dvalid {
                    self.transfer_data_bit(snap);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        // Memory contents survive a bus reset; only protocol state clears.
        self.state = SlaveState::Idle;
        self.id_shift = None;
        self.addr_shift = None;
        self.data_in = None;
        self.data_out = None;
        self.service_delay = 0;
        self.busy_left = 0;
    }

    fn resolve_device_match(&mut self) {
        let id = self.id_shift.as_ref().map_or(0, ShiftIn::value);
        if id == self.device_id {
            self.addr_shift = Some(ShiftIn::new(self.offset_width, BitOrder::LsbFirst));
            self.state = SlaveState::CaptureMemoryAddress;
        } else {
            self.state = SlaveState::Idle;
        }
    }

    fn enter_data_phase(&mut self) {
        match self.mode {
            BusMode::Read => {
                self.data_out = Some(ShiftOut::new(
                    u16::from(self.mem.read(self.offset)),
                    DATA_BITS,
                    BitOrder::LsbFirst,
                ));
            }
            BusMode::Write => {
                self.data_in = Some(ShiftIn::new(DATA_BITS, BitOrder::LsbFirst));
            }
        }
        self.state = SlaveState::DataPhase;
    }

    /// One data-phase bit in either direction. Completes the transaction
    /// on the last bit.
    fn transfer_data_bit(&mut self, snap: &BusSnapshot) {
        let done = match self.mode {
            BusMode::Read => self.data_out.as_mut().is_some_and(ShiftOut::advance),
            BusMode::Write => self
                .data_in
                .as_mut()
                .is_some_and(|s| s.push(snap.wdata)),
        };
        if done {
            if self.mode == BusMode::Write {
                if let Some(data) = self.data_in.as_ref() {
                    let value = data.value() as u8;
                    trace!(
                        "slave {}: wrote {value:#04x} at {:#05x}",
                        self.device_id,
                        self.offset
                    );
                    self.mem.write(self.offset, value);
                }
            }
            self.state = SlaveState::Idle;
        }
    }
}
