use crate::domain::money::format_amount;
use crate::domain::schedule::{PaymentScheduleEntry, SettlementStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ScheduleRow {
    sequence: u32,
    due_date: String,
    principal: String,
    interest: String,
    total: String,
    remaining_balance: String,
    status: SettlementStatus,
}

impl From<&PaymentScheduleEntry> for ScheduleRow {
    fn from(entry: &PaymentScheduleEntry) -> Self {
        Self {
            sequence: entry.sequence,
            due_date: entry.due_date.format("%Y-%m-%d").to_string(),
            principal: format_amount(entry.principal),
            interest: format_amount(entry.interest),
            total: format_amount(entry.total),
            remaining_balance: format_amount(entry.remaining_balance),
            status: entry.status,
        }
    }
}

/// Writes an amortization schedule as CSV, one row per period.
pub struct ScheduleWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ScheduleWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_schedule(&mut self, schedule: &[PaymentScheduleEntry]) -> Result<()> {
        for entry in schedule {
            self.writer.serialize(ScheduleRow::from(entry))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amortization;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_rows() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let schedule = amortization::schedule(dec!(1000), dec!(0.01), 12, start, 30).unwrap();

        let mut out = Vec::new();
        ScheduleWriter::new(&mut out).write_schedule(&schedule).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "sequence,due_date,principal,interest,total,remaining_balance,status"
        );
        assert_eq!(lines[1], "1,2024-01-31,78.85,10.00,88.85,921.15,pending");
        assert_eq!(lines.len(), 13);
        assert!(lines[12].ends_with(",0.00,pending"));
    }
}
