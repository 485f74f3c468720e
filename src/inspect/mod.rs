//! Mid-flight state inspection.
//!
//! Every stateful component can dump itself as JSON, so a harness (or a
//! debugger hanging off one) can look at the whole fabric between ticks
//! without knowing component internals.

use serde_json::{json, Value};

use crate::arbiter::Arbiter;
use crate::decoder::AddressDecoder;
use crate::fabric::BusFabric;
use crate::master::MasterPort;
use crate::signals::BusSnapshot;
use crate::slave::SlavePort;

/// A component whose state can be read out as a JSON value.
pub trait Inspectable {
    fn read_state(&self) -> Value;
}

fn to_state<T: serde::Serialize>(component: &T) -> Value {
    serde_json::to_value(component).unwrap_or(Value::Null)
}

impl Inspectable for Arbiter {
    fn read_state(&self) -> Value {
        to_state(self)
    }
}

impl Inspectable for AddressDecoder {
    fn read_state(&self) -> Value {
        to_state(self)
    }
}

impl Inspectable for MasterPort {
    fn read_state(&self) -> Value {
        to_state(self)
    }
}

impl Inspectable for SlavePort {
    fn read_state(&self) -> Value {
        to_state(self)
    }
}

impl Inspectable for BusSnapshot {
    fn read_state(&self) -> Value {
        to_state(self)
    }
}

impl Inspectable for BusFabric {
    fn read_state(&self) -> Value {
        let masters: Vec<Value> = self.masters().iter().map(Inspectable::read_state).collect();
        let slaves: Vec<Value> = (0..self.cfg().slaves())
            .map(|i| self.slave(i).read_state())
            .collect();
        json!({
            "ticks": self.ticks(),
            "bus": self.snapshot().read_state(),
            "arbiter": self.arbiter().read_state(),
            "decoder": self.decoder().read_state(),
            "masters": masters,
            "slaves": slaves,
        })
    }
}
