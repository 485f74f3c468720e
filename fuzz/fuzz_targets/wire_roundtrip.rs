#![no_main]
use libfuzzer_sys::fuzz_target;
use weft::wire::{BitOrder, ShiftIn, ShiftOut};

fuzz_target!(|input: (u16, u8, bool)| {
    let (raw, width, msb) = input;
    let width = width % 16 + 1;
    let order = if msb {
        BitOrder::MsbFirst
    } else {
        BitOrder::LsbFirst
    };
    let mask = if width == 16 { 0xFFFF } else { (1u16 << width) - 1 };
    let value = raw & mask;

    let mut out = ShiftOut::new(value, width, order);
    let mut inp = ShiftIn::new(width, order);
    loop {
        let done = inp.push(out.bit());
        out.advance();
        if done {
            break;
        }
    }
    assert_eq!(inp.value(), value);
});
