//! Price look-up entries and the money representation.
//!
//! Monetary values are integer cents wrapped in [`Price`]; fractional input
//! rounds away from zero so the amount encoded into B81 replies and
//! broadcast records is bit-exact with what the caller was shown.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::PLU_BROADCAST_RECORD_LEN;
use crate::error::{Result, Smart3Error};

/// A monetary amount in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Smallest valid PLU price, 0.01.
    pub const MIN_PLU: Price = Price(1);
    /// Largest valid PLU price, 999999.99.
    pub const MAX_PLU: Price = Price(99_999_999);

    pub const fn from_cents(cents: i64) -> Self {
        Price(cents)
    }

    /// Builds a price from a fractional amount, rounding half away from
    /// zero to whole cents.
    pub fn from_major(amount: f64) -> Self {
        Price((amount * 100.0).round() as i64)
    }

    /// Parses a wire field carrying whole cents without a separator.
    pub fn parse_cents(raw: &str) -> Result<Self> {
        raw.trim()
            .parse::<i64>()
            .map(Price)
            .map_err(|_| Smart3Error::Protocol(format!("price field is not a number: {raw:?}")))
    }

    /// Parses a decimal string such as `"12.34"` or `"5"`.
    pub fn parse_decimal(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (units, cents) = match raw.split_once('.') {
            None => (raw, "00"),
            Some((u, c)) if c.len() <= 2 => (u, c),
            Some(_) => {
                return Err(Smart3Error::InvalidArgument(format!(
                    "too many decimal places in price {raw:?}"
                )))
            }
        };
        let negative = units.starts_with('-');
        let units: i64 = units.parse().map_err(|_| {
            Smart3Error::InvalidArgument(format!("malformed price {raw:?}"))
        })?;
        let cents: i64 = format!("{cents:0<2}").parse().map_err(|_| {
            Smart3Error::InvalidArgument(format!("malformed price {raw:?}"))
        })?;
        let magnitude = units.abs() * 100 + cents;
        Ok(Price(if negative { -magnitude } else { magnitude }))
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn add_cents(&mut self, cents: i64) {
        self.0 += cents;
    }
}

impl fmt::Display for Price {
    /// Renders the amount with two decimal places, as the register expects
    /// it in keyboard-simulation totals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

/// A price look-up entry of the register.
///
/// Identity is the id; equality and ordering compare ids byte-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluInfo {
    id: String,
    name: String,
    price: Price,
    department: u8,
    tax: u8,
    macro_code: u8,
    quantity: u32,
}

impl PluInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Price,
        department: u8,
        tax: u8,
        macro_code: u8,
        quantity: u32,
    ) -> Result<Self> {
        let id = id.into();
        let name = name.into();
        if id.is_empty() || id.len() > 13 || !id.chars().all(is_valid_id_char) {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU id {id:?} must be 1-13 characters from the restricted alphabet"
            )));
        }
        if name.is_empty() || name.len() > 21 || !name.chars().all(is_valid_name_char) {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU name {name:?} must be 1-21 characters from the restricted alphabet"
            )));
        }
        if price < Price::MIN_PLU || price > Price::MAX_PLU {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU price {price} out of range 0.01..=999999.99"
            )));
        }
        if !(1..=250).contains(&department) {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU department {department} out of range 1..=250"
            )));
        }
        if !(1..=9).contains(&tax) {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU tax {tax} out of range 1..=9"
            )));
        }
        if macro_code > 250 {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU macro {macro_code} out of range 0..=250"
            )));
        }
        if !(1..=99_999).contains(&quantity) {
            return Err(Smart3Error::InvalidArgument(format!(
                "PLU quantity {quantity} out of range 1..=99999"
            )));
        }
        Ok(PluInfo {
            id,
            name,
            price,
            department,
            tax,
            macro_code,
            quantity,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn department(&self) -> u8 {
        self.department
    }

    pub fn tax(&self) -> u8 {
        self.tax
    }

    pub fn macro_code(&self) -> u8 {
        self.macro_code
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns a copy with the quantity replaced.
    pub fn with_quantity(&self, quantity: u32) -> Result<Self> {
        PluInfo::new(
            self.id.clone(),
            self.name.clone(),
            self.price,
            self.department,
            self.tax,
            self.macro_code,
            quantity,
        )
    }

    /// Encodes the entry into the fixed 61-byte broadcast record.
    pub fn encode_broadcast_record(&self) -> [u8; PLU_BROADCAST_RECORD_LEN] {
        let mut record = [0u8; PLU_BROADCAST_RECORD_LEN];
        record[..self.id.len()].copy_from_slice(self.id.as_bytes());
        let cents = self.price.cents() as i32;
        record[13..17].copy_from_slice(&cents.to_le_bytes());
        record[17] = self.department;
        record[18..18 + self.name.len()].copy_from_slice(self.name.as_bytes());
        record[55] = self.tax - 1;
        record[56] = self.macro_code;
        record
    }
}

impl PartialEq for PluInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PluInfo {}

impl PartialOrd for PluInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_graphic() && c != ':' && c != ';'
}

fn is_valid_name_char(c: char) -> bool {
    c == ' ' || is_valid_id_char(c)
}
