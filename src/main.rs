//! Demo driver: randomized traffic on the reference topology.
//!
//! Run with `RUST_LOG=trace` to watch grants, decodes and splits per tick.

use rand::prelude::*;

use weft::{BusFabric, BusMode, Transaction};

const TRANSACTIONS: usize = 200;
const TICK_BUDGET: u64 = 1_000;

fn main() {
    env_logger::init();

    let mut fabric = BusFabric::with_default_topology();
    let mut rng = rand::thread_rng();

    // Host-side mirror of every committed write, to check reads against.
    let mut mirror = std::collections::HashMap::new();

    let mut completed = 0u32;
    let mut mismatches = 0u32;
    for i in 0..TRANSACTIONS {
        let master = i % 2;
        let device = rng.gen_range(0u16..3);
        let offset = rng.gen_range(0u16..0x7FF);
        let write = rng.gen_bool(0.6);

        // Exercise the split path now and then.
        if device == 2 && rng.gen_bool(0.3) {
            if let Some(slave) = fabric.slave_for_device_mut(2) {
                slave.set_service_delay(rng.gen_range(5..40));
            }
        }

        let txn = if write {
            Transaction::write(device, offset, rng.gen())
        } else {
            Transaction::read(device, offset)
        };
        let Some(result) = fabric.run_transaction(master, txn, TICK_BUDGET) else {
            println!("transaction {i} did not finish in {TICK_BUDGET} ticks");
            continue;
        };
        match result {
            Ok(completion) => {
                completed += 1;
                match txn.mode {
                    BusMode::Write => {
                        mirror.insert((device, offset), txn.data);
                    }
                    BusMode::Read => {
                        let expected = mirror.get(&(device, offset)).copied().unwrap_or(0);
                        if completion.data != Some(expected) {
                            mismatches += 1;
                            println!(
                                "mismatch at device {device} offset {offset:#05x}: \
                                 got {:02X?}, expected {expected:#04x}",
                                completion.data
                            );
                        }
                    }
                }
            }
            Err(e) => println!("transaction {i} failed: {e}"),
        }
    }

    println!(
        "{completed}/{TRANSACTIONS} transactions completed in {} ticks, {mismatches} mismatches",
        fabric.ticks()
    );
}
