//! Human-readable document numbers (GRNs, visitor badges).

use chrono::NaiveDate;

/// `PREFIX-YYYYMMDD-NNNN`, with the sequence restarting every day.
pub fn daily_code(prefix: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), sequence)
}

/// Prefix shared by every code issued on `date`, for counting existing ones.
pub fn daily_prefix(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}-", prefix, date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_sequence_to_four_digits() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(daily_code("GRN", date, 1), "GRN-20260307-0001");
        assert_eq!(daily_code("V", date, 12345), "V-20260307-12345");
        assert!(daily_code("GRN", date, 42).starts_with(&daily_prefix("GRN", date)));
    }
}
