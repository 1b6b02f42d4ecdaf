use crate::{AuthzError, AuthzResult};

/// `end_time` value for policies that never expire.
pub const NEVER_EXPIRES: i64 = -1;

/// A policy is expired once its end time (microseconds) lies strictly before `now`.
pub fn is_expired(end_time: i64, now_micros: i64) -> bool {
    end_time != NEVER_EXPIRES && end_time < now_micros
}

/// Authoring check: end time must be `-1` or in the future.
pub fn validate_end_time(end_time: i64, now_micros: i64) -> AuthzResult<()> {
    if end_time == NEVER_EXPIRES {
        return Ok(());
    }
    if end_time < 0 {
        return Err(AuthzError::InvalidEndTime {
            end_time,
            reason: "negative end time other than -1",
        });
    }
    if end_time <= now_micros {
        return Err(AuthzError::InvalidEndTime {
            end_time,
            reason: "end time already passed",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_expires() {
        assert!(!is_expired(NEVER_EXPIRES, i64::MAX));
    }

    #[test]
    fn expiry_is_monotonic_around_end_time() {
        let t = 1_700_000_000_000_000;
        assert!(!is_expired(t, t - 1));
        assert!(!is_expired(t, t));
        assert!(is_expired(t, t + 1));
    }

    #[test]
    fn end_time_validation() {
        let now = 1_000;
        assert!(validate_end_time(NEVER_EXPIRES, now).is_ok());
        assert!(validate_end_time(now + 1, now).is_ok());
        assert!(validate_end_time(now, now).is_err());
        assert!(validate_end_time(-7, now).is_err());
    }
}
