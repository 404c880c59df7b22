use chrono::{DateTime, TimeZone, Utc};

const MILLIS_THRESHOLD: i64 = 10_000_000_000;

fn utc_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now)
}

/// Registry rows store epoch seconds; clients occasionally hand us epoch
/// millis. Coerce rather than reject.
pub fn utc_from_epoch_seconds_lossy(ts: i64) -> DateTime<Utc> {
    if ts.abs() >= MILLIS_THRESHOLD
        && let Some(dt) = Utc.timestamp_opt(ts / 1000, 0).single()
    {
        log::warn!("Coerced milliseconds timestamp to seconds (ts={ts})");
        return dt;
    }

    if let Some(dt) = Utc.timestamp_opt(ts, 0).single() {
        return dt;
    }

    log::warn!("Invalid epoch seconds timestamp (ts={ts}); falling back to epoch");
    utc_epoch()
}

pub fn utc_from_epoch_seconds_lossy_opt(ts: Option<i64>) -> Option<DateTime<Utc>> {
    let ts = ts?;

    if ts.abs() >= MILLIS_THRESHOLD
        && let Some(dt) = Utc.timestamp_opt(ts / 1000, 0).single()
    {
        log::warn!("Coerced milliseconds timestamp to seconds (ts={ts})");
        return Some(dt);
    }

    if let Some(dt) = Utc.timestamp_opt(ts, 0).single() {
        return Some(dt);
    }

    log::warn!("Invalid epoch seconds timestamp (ts={ts}); treating as missing");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_pass_through() {
        let dt = utc_from_epoch_seconds_lossy(1_700_000_000);
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn millis_are_coerced() {
        let dt = utc_from_epoch_seconds_lossy(1_700_000_000_000);
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_optional_stays_missing() {
        assert!(utc_from_epoch_seconds_lossy_opt(None).is_none());
        assert_eq!(
            utc_from_epoch_seconds_lossy_opt(Some(1_700_000_000)).map(|dt| dt.timestamp()),
            Some(1_700_000_000)
        );
    }
}
