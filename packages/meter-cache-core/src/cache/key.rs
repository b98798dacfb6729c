//! Bucket key layout: `"{owner_id}:{YYYY-MM-DD}"`.

use chrono::{DateTime, NaiveDate};

use crate::error::{CacheError, Result};

/// Builds the store key of an owner's bucket for one date.
pub fn bucket_key(owner_id: &str, date: NaiveDate) -> String {
    format!("{}:{}", owner_id, date.format("%Y-%m-%d"))
}

/// Splits a store key into owner id and date.
///
/// The date follows the last `:`, so owner ids may themselves contain colons.
pub fn parse_bucket_key(key: &str) -> Result<(String, NaiveDate)> {
    let (owner, date) = key
        .rsplit_once(':')
        .ok_or_else(|| CacheError::InvalidArgument(format!("'{}' is not a bucket key", key)))?;
    if owner.is_empty() {
        return Err(CacheError::InvalidArgument(format!(
            "bucket key '{}' has no owner",
            key
        )));
    }
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        CacheError::InvalidArgument(format!("bucket key '{}' has a bad date: {}", key, e))
    })?;
    Ok((owner.to_string(), date))
}

/// UTC calendar date of a millisecond timestamp.
pub fn day_of(timestamp_millis: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp_millis(timestamp_millis)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| {
            CacheError::InvalidArgument(format!(
                "timestamp {} is outside the representable range",
                timestamp_millis
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_layout() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        assert_eq!(bucket_key("MTR-001", date), "MTR-001:2026-02-18");
        assert_eq!(
            parse_bucket_key("MTR-001:2026-02-18").unwrap(),
            ("MTR-001".to_string(), date)
        );
        assert_eq!(
            parse_bucket_key("site:7:2026-02-18").unwrap().0,
            "site:7"
        );
    }

    #[test]
    fn test_parse_bucket_key_rejects_garbage() {
        assert!(parse_bucket_key("no-colon").is_err());
        assert!(parse_bucket_key(":2026-02-18").is_err());
        assert!(parse_bucket_key("MTR-001:2026-13-01").is_err());
    }

    #[test]
    fn test_day_of() {
        // 2026-02-18T23:59:59.999Z and the next millisecond
        let last = 1_771_459_199_999;
        assert_eq!(day_of(last).unwrap().to_string(), "2026-02-18");
        assert_eq!(day_of(last + 1).unwrap().to_string(), "2026-02-19");
        assert_eq!(day_of(-1).unwrap().to_string(), "1969-12-31");
        assert!(day_of(i64::MAX).is_err());
    }
}
