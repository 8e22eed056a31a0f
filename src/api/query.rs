//! Shared query-string helpers

use crate::error::{ApiError, ApiResult};

/// Reject ranges whose lower bound lies after the upper bound.
pub fn ensure_range<T: PartialOrd>(from: Option<&T>, to: Option<&T>) -> ApiResult<()> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => {
            Err(ApiError::bad_request("'from' must not be after 'to'"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn open_and_ordered_ranges_pass() {
        let a = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert!(ensure_range(Some(&a), Some(&b)).is_ok());
        assert!(ensure_range(Some(&a), Some(&a)).is_ok());
        assert!(ensure_range(None, Some(&b)).is_ok());
        assert!(ensure_range::<NaiveDate>(None, None).is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let a = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(matches!(
            ensure_range(Some(&a), Some(&b)),
            Err(ApiError::BadRequest(_))
        ));
    }
}
