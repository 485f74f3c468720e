//! Serial field encoding helpers.
//!
//! Every field of a transaction crosses the bus one bit per tick, and the
//! bit order is not uniform across fields:
//!
//! | Field          | Width          | Bit order |
//! |:---------------|:---------------|:----------|
//! | Device address | configured     | MSB first |
//! | Memory offset  | per-slave      | LSB first |
//! | Data payload   | 8 bits         | LSB first |
//!
//! `ShiftOut` and `ShiftIn` are the only two primitives the state machines
//! use to touch the wire; they hold the field value, its width and its bit
//! order so the protocol code never does index arithmetic inline.

use serde::{Deserialize, Serialize};

/// Width of the data payload field, in bits.
pub const DATA_BITS: u8 = 8;

/// Bit order of a serialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Serializer side of a field: hands out one bit per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftOut {
    value: u16,
    width: u8,
    order: BitOrder,
    pos: u8,
}

impl ShiftOut {
    /// Create a serializer for `value` at `width` bits. Bits of `value`
    /// above `width` are masked off.
    pub fn new(value: u16, width: u8, order: BitOrder) -> Self {
        let mask = if width >= 16 { 0xFFFF } else { (1u16 << width) - 1 };
        Self {
            value: value & mask,
            width,
            order,
            pos: 0,
        }
    }

    /// The bit currently presented on the wire.
    pub fn bit(&self) -> bool {
        let idx = match self.order {
            BitOrder::MsbFirst => self.width - 1 - self.pos,
            BitOrder::LsbFirst => self.pos,
        };
        (self.value >> idx) & 1 != 0
    }

    /// Advance to the next bit. Returns `true` when the field just
    /// finished (the bit consumed was the last one).
    pub fn advance(&mut self) -> bool {
        self.pos += 1;
        self.pos == self.width
    }

    pub fn done(&self) -> bool {
        self.pos == self.width
    }
}

/// Deserializer side of a field: accumulates one bit per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftIn {
    value: u16,
    width: u8,
    order: BitOrder,
    pos: u8,
}

impl ShiftIn {
    pub fn new(width: u8, order: BitOrder) -> Self {
        Self {
            value: 0,
            width,
            order,
            pos: 0,
        }
    }

    /// Shift in one bit. Returns `true` when the field is complete.
    pub fn push(&mut self, bit: bool) -> bool {
        match self.order {
            BitOrder::MsbFirst => {
                self.value = (self.value << 1) | u16::from(bit);
            }
            BitOrder::LsbFirst => {
                self.value |= u16::from(bit) << self.pos;
            }
        }
        self.pos += 1;
        self.pos == self.width
    }

    pub fn done(&self) -> bool {
        self.pos == self.width
    }

    /// The accumulated value. Only meaningful once `done()`.
    pub fn value(&self) -> u16 {
        self.value
    }
}


#[cfg(test)]
mod tests_property;
