//! Financial report accumulation.
//!
//! The financial report arrives as a series of `C22` records. Field 3
//! identifies the record: `"0"` carries the ticket and item counters,
//! `"4*"`/`"6*"`/`"7*"`/`"8*"`/`"9*"` carry monetary totals, and `"*"`
//! terminates the series. Monetary records list their amounts in fields 5,
//! 7, 9, ... followed by the operator and document fields, which do not
//! contribute.

use serde::Serialize;

use crate::error::{Result, Smart3Error};
use crate::payload::message::MessageData;
use crate::payload::plu::Price;

/// Totals of the financial report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinancialReport {
    pub tickets_issued: u64,
    pub items_sold: u64,
    pub payment_amount: Price,
    pub inflow_amount: Price,
    pub outflow_amount: Price,
    pub drawer_amount: Price,
    pub payments_in_period: Price,
}

impl FinancialReport {
    /// Applies one C22 record. Returns true when the terminator record has
    /// been seen. Unknown record ids are ignored.
    pub fn apply_record(&mut self, msg: &MessageData) -> Result<bool> {
        let id = msg
            .field(3)
            .ok_or_else(|| Smart3Error::Protocol("C22 record is missing its id field".into()))?;
        match id {
            "*" => return Ok(true),
            "0" => {
                self.tickets_issued = parse_count(msg, 5)?;
                self.items_sold = parse_count(msg, 7)?;
            }
            "4*" => self.payment_amount.add_cents(sum_amounts(msg)?),
            "6*" => self.inflow_amount.add_cents(sum_amounts(msg)?),
            "7*" => self.outflow_amount.add_cents(sum_amounts(msg)?),
            "8*" => self.drawer_amount.add_cents(sum_amounts(msg)?),
            "9*" => self.payments_in_period.add_cents(sum_amounts(msg)?),
            other => log::debug!("ignoring C22 record with unknown id {other:?}"),
        }
        Ok(false)
    }
}

fn parse_count(msg: &MessageData, index: usize) -> Result<u64> {
    let value = msg.int_field(index)?;
    u64::try_from(value).map_err(|_| {
        Smart3Error::Protocol(format!("C22 field {index} out of range: {value}"))
    })
}

/// Sums the amount fields 5, 7, 9, ... excluding the trailing operator and
/// document fields. Wire amounts are hundredths.
fn sum_amounts(msg: &MessageData) -> Result<i64> {
    let count = msg.field_count();
    if count < 7 {
        return Err(Smart3Error::Protocol(format!(
            "C22 amount record has only {count} fields"
        )));
    }
    let mut total = 0i64;
    let mut index = 5;
    while index < count - 2 {
        total += msg.int_field(index)?;
        index += 2;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(report: &mut FinancialReport, payload: &str) -> bool {
        report
            .apply_record(&MessageData::new(payload).unwrap())
            .unwrap()
    }

    #[test]
    fn accumulates_record_series() {
        let mut report = FinancialReport::default();
        assert!(!apply(&mut report, "C22:001:000:0:T:42:I:137:1:0017"));
        assert!(!apply(&mut report, "C22:002:000:4*:C:1000:K:250:1:0017"));
        assert!(!apply(&mut report, "C22:003:000:8*:D:731:1:0017"));
        assert!(!apply(&mut report, "C22:004:000:5*:X:999:1:0017"));
        assert!(apply(&mut report, "C22:005:000:*"));

        assert_eq!(report.tickets_issued, 42);
        assert_eq!(report.items_sold, 137);
        assert_eq!(report.payment_amount, Price::from_cents(1250));
        assert_eq!(report.drawer_amount, Price::from_cents(731));
        assert_eq!(report.inflow_amount, Price::from_cents(0));
        assert_eq!(report.payments_in_period, Price::from_cents(0));
    }

    #[test]
    fn amount_sum_skips_operator_and_document() {
        let mut report = FinancialReport::default();
        // Amounts 100 and 200; 77 and 17 are operator and document.
        assert!(!apply(&mut report, "C22:001:000:6*:A:100:B:200:77:17"));
        assert_eq!(report.inflow_amount, Price::from_cents(300));
    }

    #[test]
    fn short_amount_record_is_a_protocol_error() {
        let mut report = FinancialReport::default();
        let msg = MessageData::new("C22:001:000:4*:A:1").unwrap();
        assert!(matches!(
            report.apply_record(&msg),
            Err(Smart3Error::Protocol(_))
        ));
    }
}
