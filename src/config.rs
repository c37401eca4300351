//! Driver configuration: serial parameters and protocol identity.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::RS485_ADDRESS_FIRST;
use crate::error::{Result, Smart3Error};

/// Physical layer the register is wired over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalLayer {
    Rs232,
    Rs485,
}

/// Baud rates supported by the Smart3 register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Smart3BaudRate {
    Baud9600 = 9600,
    Baud19200 = 19200,
    Baud38400 = 38400,
}

impl Smart3BaudRate {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

impl From<u32> for Smart3BaudRate {
    fn from(value: u32) -> Self {
        match value {
            19200 => Smart3BaudRate::Baud19200,
            38400 => Smart3BaudRate::Baud38400,
            _ => Smart3BaudRate::Baud9600,
        }
    }
}

/// Configuration for a Smart3 serial connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smart3Config {
    /// Serial port name (`/dev/ttyUSB0`, `COM3`, ...).
    pub port_name: String,
    /// RS-232 or RS-485.
    pub physical_layer: PhysicalLayer,
    pub baud_rate: Smart3BaudRate,
    /// Cash register number this host pairs with (0..=99).
    pub crn: u8,
    /// RS-485 unit number (1..=16); ignored on RS-232.
    pub unit: u8,
    /// Receive timeout in milliseconds.
    pub receive_timeout_ms: u64,
    /// Write timeout in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for Smart3Config {
    fn default() -> Self {
        Smart3Config {
            port_name: String::new(),
            physical_layer: PhysicalLayer::Rs232,
            baud_rate: Smart3BaudRate::Baud9600,
            crn: 0,
            unit: 1,
            receive_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Smart3Config {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Wire address of the paired register unit on RS-485.
    pub fn unit_address(&self) -> Result<u8> {
        if !(1..=16).contains(&self.unit) {
            return Err(Smart3Error::InvalidArgument(format!(
                "RS-485 unit number {} out of range 1..=16",
                self.unit
            )));
        }
        Ok(RS485_ADDRESS_FIRST + self.unit - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Smart3Config::default();
        assert_eq!(config.physical_layer, PhysicalLayer::Rs232);
        assert_eq!(config.receive_timeout(), Duration::from_millis(5000));
        assert_eq!(config.baud_rate.as_u32(), 9600);
    }

    #[test]
    fn unit_addresses_map_onto_wire_range() {
        let mut config = Smart3Config::default();
        config.unit = 1;
        assert_eq!(config.unit_address().unwrap(), 0xA0);
        config.unit = 16;
        assert_eq!(config.unit_address().unwrap(), 0xAF);
        config.unit = 17;
        assert!(config.unit_address().is_err());
    }

    #[test]
    fn baud_rate_from_u32_falls_back_to_9600() {
        assert_eq!(Smart3BaudRate::from(38400).as_u32(), 38400);
        assert_eq!(Smart3BaudRate::from(1200).as_u32(), 9600);
    }
}
