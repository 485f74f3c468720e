//! Device-address capture, validation and routing.
//!
//! The decoder watches the shared bus: from the address-phase start
//! strobe it shifts in the device-address prefix (MSB first), then
//! validates the captured id against the address map and the target
//! slave's readiness. A good address raises acknowledge and registers the
//! slave selection; a bad one is dropped on the floor — no acknowledge, no
//! side effects, and no slave ever sees the transaction.
//!
//! The selection is also saved across a split: the arbiter's split-grant
//! pulse re-enters `Wait` directly with the saved selection, so a retried
//! transaction never resends its device address.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::BusConfig;
use crate::signals::BusSnapshot;
use crate::wire::{BitOrder, ShiftIn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum DecoderState {
    Idle,
    CaptureAddress,
    Validate,
    Wait,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressDecoder {
    state: DecoderState,
    shifter: Option<ShiftIn>,
    /// Slave selection registered while in `Wait`.
    selected: Option<usize>,
    /// Selection latched when the transaction split, for re-entry on the
    /// retry. Unrelated traffic validated in between must not disturb it.
    saved: Option<usize>,

    next_state: DecoderState,
    next_selected: Option<usize>,
    next_saved: Option<usize>,
}

impl AddressDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            shifter: None,
            selected: None,
            saved: None,
            next_state: DecoderState::Idle,
            next_selected: None,
            next_saved: None,
        }
    }

    /// The slave the current transaction routes to, as registered at the
    /// end of the previous tick. The fabric uses this to put the selected
    /// slave's response lines on the bus.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Combinational outputs for this tick; returns the acknowledge line.
    pub fn eval(&mut self, cfg: &BusConfig, snap: &BusSnapshot) -> bool {
        self.next_state = self.state;
        self.next_selected = self.selected;
        self.next_saved = self.saved;

        let mut ack = false;
        match self.state {
            DecoderState::Idle => {
                if snap.split_grant {
                    // Retried split transaction: restore the saved routing
                    // without re-capturing the address.
                    trace!("decoder: split grant, re-entering wait on slave {:?}", self.saved);
                    self.next_selected = self.saved;
                    self.next_saved = None;
                    self.next_state = DecoderState::Wait;
                } else if snap.grant.is_some() && snap.astart {
                    // Capture begins only on the address-phase start
                    // strobe: after a rejection the rest of the stream is
                    // ignored rather than misparsed as a new address.
                    let mut shifter =
                        ShiftIn::new(cfg.device_addr_width(), BitOrder::MsbFirst);
                    let full = shifter.push(snap.wdata);
                    self.shifter = Some(shifter);
                    self.next_state = if full {
                        DecoderState::Validate
                    } else {
                        DecoderState::CaptureAddress
                    };
                }
            }
            DecoderState::CaptureAddress => {
                if !snap.avalid {
                    self.next_state = DecoderState::Idle;
                } else if let Some(shifter) = self.shifter.as_mut() {
                    if shifter.push(snap.wdata) {
                        self.next_state = DecoderState::Validate;
                    }
                }
            }
            DecoderState::Validate => {
                let id = self.shifter.as_ref().map_or(0, ShiftIn::value);
                match cfg.device(id) {
                    Some(dev) if snap.sready[dev.slave] => {
                        trace!("decoder: device {id} -> slave {}", dev.slave);
                        ack = true;
                        self.next_selected = Some(dev.slave);
                        self.next_state = DecoderState::Wait;
                    }
                    Some(dev) => {
                        debug!(
                            "decoder: device {id} valid but slave {} not ready, rejecting",
                            dev.slave
                        );
                        self.next_state = DecoderState::Idle;
                    }
                    None => {
                        debug!("decoder: device {id} out of range, rejecting");
                        self.next_state = DecoderState::Idle;
                    }
                }
            }
            DecoderState::Wait => {
                ack = true;
                if snap.ssplit {
                    // The slave deferred: keep the routing for the retry.
                    self.next_saved = self.selected;
                }
                if !snap.mvalid {
                    self.next_selected = None;
                    self.next_state = DecoderState::Idle;
                }
            }
        }
        ack
    }

    pub fn commit(&mut self) {
        self.state = self.next_state;
        self.selected = self.next_selected;
        self.saved = self.next_saved;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for AddressDecoder {
    fn default() -> Self {
        Self::new()
    }
}
