//! Bus topology configuration.
//!
//! Everything the hardware derived from generics — device-address width,
//! per-slave offset widths, master count — is resolved here once, at
//! construction, into an immutable `BusConfig` that the state machines
//! borrow each tick.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the address map: a device id resolved to a slave.
///
/// Device ids index the map directly; the entry names the slave the id
/// routes to and how wide that slave's memory-offset field is on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeviceMapEntry {
    /// Index of the slave port this device id routes to.
    pub slave: usize,
    /// Width of the serialized memory-offset field, in bits. The slave's
    /// backing memory spans `[0, 2^offset_width)`.
    pub offset_width: u8,
    /// Whether the slave may defer a transaction instead of completing it
    /// in its normal protocol window.
    pub split_capable: bool,
}

impl DeviceMapEntry {
    /// Size in bytes of the memory behind this device.
    pub fn mem_size(&self) -> usize {
        1 << self.offset_width
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no masters configured")]
    NoMasters,
    #[error("no devices configured")]
    NoDevices,
    #[error("device address width {width} bits cannot encode {devices} device ids")]
    AddressWidthTooNarrow { width: u8, devices: usize },
    #[error("device address width {0} bits is out of range (1..=16)")]
    AddressWidthOutOfRange(u8),
    #[error("device {device}: offset width {width} is out of range")]
    OffsetWidthOutOfRange { device: usize, width: u8 },
    #[error("device {device} routes to slave {slave}, but only {slaves} slaves exist")]
    SlaveOutOfRange {
        device: usize,
        slave: usize,
        slaves: usize,
    },
    #[error("devices {first} and {second} both route to slave {slave}")]
    DuplicateSlave {
        first: usize,
        second: usize,
        slave: usize,
    },
}

/// Immutable bus topology, validated at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    masters: usize,
    device_addr_width: u8,
    devices: Vec<DeviceMapEntry>,
    request_timeout: u32,
}

impl BusConfig {
    /// Tick budget a master spends waiting for a grant or an acknowledge
    /// before the transaction fails.
    pub const DEFAULT_REQUEST_TIMEOUT: u32 = 64;

    pub fn new(
        masters: usize,
        device_addr_width: u8,
        devices: Vec<DeviceMapEntry>,
        request_timeout: u32,
    ) -> Result<Self, ConfigError> {
        if masters == 0 {
            return Err(ConfigError::NoMasters);
        }
        if devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if device_addr_width == 0 || device_addr_width > 16 {
            return Err(ConfigError::AddressWidthOutOfRange(device_addr_width));
        }
        if devices.len() > (1usize << device_addr_width) {
            return Err(ConfigError::AddressWidthTooNarrow {
                width: device_addr_width,
                devices: devices.len(),
            });
        }
        let slaves = devices.len();
        let mut owner = vec![None; slaves];
        for (id, dev) in devices.iter().enumerate() {
            if dev.offset_width == 0 || dev.offset_width > 16 {
                return Err(ConfigError::OffsetWidthOutOfRange {
                    device: id,
                    width: dev.offset_width,
                });
            }
            if dev.slave >= slaves {
                return Err(ConfigError::SlaveOutOfRange {
                    device: id,
                    slave: dev.slave,
                    slaves,
                });
            }
            if let Some(first) = owner[dev.slave] {
                return Err(ConfigError::DuplicateSlave {
                    first,
                    second: id,
                    slave: dev.slave,
                });
            }
            owner[dev.slave] = Some(id);
        }
        Ok(Self {
            masters,
            device_addr_width,
            devices,
            request_timeout,
        })
    }

    /// The reference topology: two masters, three slaves.
    ///
    /// | Device id | Slave | Memory  | Split capable |
    /// |:----------|:------|:--------|:--------------|
    /// | 0         | 0     | 2 KiB   | no            |
    /// | 1         | 1     | 4 KiB   | no            |
    /// | 2         | 2     | 4 KiB   | yes           |
    pub fn default_topology() -> Self {
        Self::new(
            2,
            4,
            vec![
                DeviceMapEntry {
                    slave: 0,
                    offset_width: 11,
                    split_capable: false,
                },
                DeviceMapEntry {
                    slave: 1,
                    offset_width: 12,
                    split_capable: false,
                },
                DeviceMapEntry {
                    slave: 2,
                    offset_width: 12,
                    split_capable: true,
                },
            ],
            Self::DEFAULT_REQUEST_TIMEOUT,
        )
        .expect("reference topology is valid")
    }

    pub fn masters(&self) -> usize {
        self.masters
    }

    pub fn slaves(&self) -> usize {
        self.devices.len()
    }

    pub fn device_addr_width(&self) -> u8 {
        self.device_addr_width
    }

    pub fn request_timeout(&self) -> u32 {
        self.request_timeout
    }

    /// Resolve a device id. Ids at or beyond the configured device count
    /// are invalid and resolve to `None`.
    pub fn device(&self, id: u16) -> Option<&DeviceMapEntry> {
        self.devices.get(usize::from(id))
    }

    pub fn devices(&self) -> &[DeviceMapEntry] {
        &self.devices
    }

    /// Widest configured offset field. Used by a master that was handed an
    /// invalid device id and still has to serialize something for the
    /// offset phase nobody will decode.
    pub fn max_offset_width(&self) -> u8 {
        self.devices
            .iter()
            .map(|d| d.offset_width)
            .max()
            .unwrap_or(0)
    }
}
