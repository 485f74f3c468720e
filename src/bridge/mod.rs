//! Frame encoding for the point-to-point bridge.
//!
//! Transactions can be forwarded to a remote system over a serial link.
//! The link's byte framing and bit-rate generation are someone else's
//! problem; what is fixed here is the logical frame layout the fabric's
//! transactions translate to and from:
//!
//! | Frame    | Fields, in serialization order            | Width |
//! |:---------|:------------------------------------------|:------|
//! | Command  | mode (1), data (8), address (16)          | 25    |
//! | Response | data (8)                                  | 8     |
//!
//! Every field is serialized LSB first. The 16-bit address packs the
//! device id in its top four bits above a 12-bit offset.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::master::{Completion, Transaction};
use crate::signals::BusMode;
use crate::wire::{BitOrder, ShiftIn, ShiftOut, DATA_BITS};

/// Bits in a command frame: mode + data + address.
pub const COMMAND_FRAME_BITS: usize = 1 + DATA_BITS as usize + ADDRESS_BITS as usize;
/// Bits in a response frame: data only.
pub const RESPONSE_FRAME_BITS: usize = DATA_BITS as usize;

const ADDRESS_BITS: u8 = 16;
const OFFSET_BITS: u8 = 12;

/// The transport the bridge hands frames to. Framing below the bit level
/// (start/stop bits, pacing) lives behind this seam.
pub trait BridgeTransport {
    fn send_frame(&mut self, bits: &[bool]);
    fn recv_frame(&mut self) -> Option<Vec<bool>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FrameError {
    #[error("frame is {got} bits, expected {expected}")]
    WrongLength { expected: usize, got: usize },
}

fn push_field(bits: &mut Vec<bool>, value: u16, width: u8) {
    let mut out = ShiftOut::new(value, width, BitOrder::LsbFirst);
    for _ in 0..width {
        bits.push(out.bit());
        out.advance();
    }
}

fn pull_field(bits: &[bool], pos: &mut usize, width: u8) -> u16 {
    let mut inp = ShiftIn::new(width, BitOrder::LsbFirst);
    for _ in 0..width {
        inp.push(bits[*pos]);
        *pos += 1;
    }
    inp.value()
}

/// Serialize a transaction into a command frame.
pub fn encode_command(txn: &Transaction) -> Vec<bool> {
    let mut bits = Vec::with_capacity(COMMAND_FRAME_BITS);
    push_field(&mut bits, u16::from(txn.mode == BusMode::Write), 1);
    push_field(&mut bits, u16::from(txn.data), DATA_BITS);
    let address = (txn.device << OFFSET_BITS) | (txn.offset & 0x0FFF);
    push_field(&mut bits, address, ADDRESS_BITS);
    bits
}

/// Recover a transaction from a command frame.
pub fn decode_command(bits: &[bool]) -> Result<Transaction, FrameError> {
    if bits.len() != COMMAND_FRAME_BITS {
        return Err(FrameError::WrongLength {
            expected: COMMAND_FRAME_BITS,
            got: bits.len(),
        });
    }
    let mut pos = 0;
    let mode = if pull_field(bits, &mut pos, 1) != 0 {
        BusMode::Write
    } else {
        BusMode::Read
    };
    let data = pull_field(bits, &mut pos, DATA_BITS) as u8;
    let address = pull_field(bits, &mut pos, ADDRESS_BITS);
    Ok(Transaction {
        device: address >> OFFSET_BITS,
        offset: address & 0x0FFF,
        data,
        mode,
    })
}

/// Serialize a completion's read data into a response frame. Writes
/// respond with zero data.
pub fn encode_response(completion: &Completion) -> Vec<bool> {
    let mut bits = Vec::with_capacity(RESPONSE_FRAME_BITS);
    push_field(&mut bits, u16::from(completion.data.unwrap_or(0)), DATA_BITS);
    bits
}

pub fn decode_response(bits: &[bool]) -> Result<u8, FrameError> {
    if bits.len() != RESPONSE_FRAME_BITS {
        return Err(FrameError::WrongLength {
            expected: RESPONSE_FRAME_BITS,
            got: bits.len(),
        });
    }
    let mut pos = 0;
    Ok(pull_field(bits, &mut pos, DATA_BITS) as u8)
}
