//! Flat byte-array backing store behind each slave port.
//!
//! Pure storage: no protocol logic lives here. Offsets are produced by a
//! fixed-width shifter, so they are always inside the array the config
//! sized for that width.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    #[serde(skip)]
    data: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read(&self, offset: u16) -> u8 {
        self.data[usize::from(offset)]
    }

    pub fn write(&mut self, offset: u16, value: u8) {
        self.data[usize::from(offset)] = value;
    }

    /// Bulk load, for harnesses that want a known memory image.
    pub fn load(&mut self, image: &[u8]) {
        let n = image.len().min(self.data.len());
        self.data[..n].copy_from_slice(&image[..n]);
    }
}
