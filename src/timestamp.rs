use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// How far in the future a signed timestamp may be before it is rejected. Clients
/// with a clock slightly ahead of the server's would otherwise fail to verify.
pub const CLOCK_SKEW_TOLERANCE: Duration = Duration::from_secs(10);

/// Reasons a timestamp may be rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TimestampError {
    /// The timestamp is further in the future than the clock skew tolerance.
    #[error("Timestamp out of range")]
    OutOfRange,
    /// The timestamp is older than the configured expiry.
    #[error("Signature expired")]
    Expired,
}

/// Validate a signed timestamp against the current time.
///
/// An `expiry` of `None` or zero disables expiration, so a timestamp
/// arbitrarily far in the past is accepted.
pub fn validate_timestamp(
    timestamp: DateTime<Utc>,
    expiry: Option<Duration>,
) -> Result<(), TimestampError> {
    validate_timestamp_at(timestamp, Utc::now(), expiry)
}

/// Validate a signed timestamp against the time `now`.
pub fn validate_timestamp_at(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    expiry: Option<Duration>,
) -> Result<(), TimestampError> {
    let age = now.signed_duration_since(timestamp);

    match age.to_std() {
        // Negative age: the timestamp is in the future.
        Err(_) => {
            if (-age).to_std().map_or(true, |ahead| ahead > CLOCK_SKEW_TOLERANCE) {
                return Err(TimestampError::OutOfRange);
            }
        }
        Ok(age) => {
            if let Some(expiry) = expiry.filter(|expiry| *expiry > Duration::from_secs(0)) {
                if age > expiry {
                    return Err(TimestampError::Expired);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn seconds_from_now(seconds: i64) -> DateTime<Utc> {
        now() + ChronoDuration::seconds(seconds)
    }

    fn seconds_ago(seconds: i64) -> DateTime<Utc> {
        now() - ChronoDuration::seconds(seconds)
    }

    const EXPIRY: Option<Duration> = Some(Duration::from_secs(100));

    #[test]
    fn future_beyond_tolerance() {
        for expiry in &[None, EXPIRY] {
            assert_eq!(
                validate_timestamp_at(seconds_from_now(60), now(), *expiry),
                Err(TimestampError::OutOfRange)
            );
            assert_eq!(
                validate_timestamp_at(
                    seconds_from_now(10) + ChronoDuration::milliseconds(1),
                    now(),
                    *expiry
                ),
                Err(TimestampError::OutOfRange)
            );
        }
    }

    #[test]
    fn future_within_tolerance() {
        for expiry in &[None, EXPIRY] {
            assert_eq!(validate_timestamp_at(seconds_from_now(5), now(), *expiry), Ok(()));
            assert_eq!(validate_timestamp_at(seconds_from_now(10), now(), *expiry), Ok(()));
        }
    }

    #[test]
    fn exactly_now() {
        assert_eq!(validate_timestamp_at(now(), now(), None), Ok(()));
        assert_eq!(validate_timestamp_at(now(), now(), EXPIRY), Ok(()));
    }

    #[test]
    fn past_without_expiry() {
        assert_eq!(validate_timestamp_at(seconds_ago(300), now(), None), Ok(()));
        assert_eq!(
            validate_timestamp_at(seconds_ago(10 * 365 * 24 * 3600), now(), None),
            Ok(())
        );
    }

    #[test]
    fn zero_expiry_means_no_expiry() {
        assert_eq!(
            validate_timestamp_at(seconds_ago(300), now(), Some(Duration::from_secs(0))),
            Ok(())
        );
    }

    #[test]
    fn expired() {
        assert_eq!(
            validate_timestamp_at(seconds_ago(300), now(), EXPIRY),
            Err(TimestampError::Expired)
        );
        assert_eq!(
            validate_timestamp_at(
                seconds_ago(100) - ChronoDuration::milliseconds(1),
                now(),
                EXPIRY
            ),
            Err(TimestampError::Expired)
        );
    }

    #[test]
    fn past_not_expired() {
        assert_eq!(validate_timestamp_at(seconds_ago(30), now(), EXPIRY), Ok(()));
        assert_eq!(validate_timestamp_at(seconds_ago(100), now(), EXPIRY), Ok(()));
    }

    #[test]
    fn against_system_clock() {
        assert_eq!(validate_timestamp(Utc::now(), EXPIRY), Ok(()));
        assert_eq!(
            validate_timestamp(Utc::now() + ChronoDuration::seconds(60), None),
            Err(TimestampError::OutOfRange)
        );
    }
}
