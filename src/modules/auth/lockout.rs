//! Account lockout decisions.
//!
//! The counter itself lives in the `users` row and is incremented with a
//! single `UPDATE`; these functions only interpret its state.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lock recorded.
    Open,
    /// Locked; login is refused without checking the password.
    Locked { remaining_minutes: i64 },
    /// A lock was recorded but has run out. The counter restarts.
    Expired,
}

pub fn lock_state(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> LockState {
    match locked_until {
        None => LockState::Open,
        Some(until) if until > now => LockState::Locked {
            remaining_minutes: remaining_minutes(until, now),
        },
        Some(_) => LockState::Expired,
    }
}

/// Whole minutes left, rounded up, never less than one.
pub fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}

/// The `locked_until` to store when the counter reaches the threshold.
pub fn lock_deadline(now: DateTime<Utc>, lockout_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(lockout_minutes)
}

pub fn locked_message(remaining_minutes: i64) -> String {
    let unit = if remaining_minutes == 1 { "minute" } else { "minutes" };
    format!(
        "Account is locked due to too many failed login attempts. Try again in {} {}",
        remaining_minutes, unit
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_lock_is_open() {
        assert_eq!(lock_state(None, Utc::now()), LockState::Open);
    }

    #[test]
    fn test_future_lock_reports_remaining_minutes() {
        let now = Utc::now();
        let until = now + Duration::seconds(14 * 60 + 5);
        assert_eq!(
            lock_state(Some(until), now),
            LockState::Locked {
                remaining_minutes: 15
            }
        );
    }

    #[test]
    fn test_past_lock_is_expired() {
        let now = Utc::now();
        assert_eq!(
            lock_state(Some(now - Duration::seconds(1)), now),
            LockState::Expired
        );
    }

    #[test]
    fn test_remaining_minutes_floor_is_one() {
        let now = Utc::now();
        assert_eq!(remaining_minutes(now + Duration::seconds(3), now), 1);
        assert_eq!(remaining_minutes(now + Duration::seconds(60), now), 1);
        assert_eq!(remaining_minutes(now + Duration::seconds(61), now), 2);
    }

    #[test]
    fn test_deadline() {
        let now = Utc::now();
        assert_eq!(lock_deadline(now, 15) - now, Duration::minutes(15));
    }

    #[test]
    fn test_locked_message() {
        assert!(locked_message(1).ends_with("1 minute"));
        assert!(locked_message(7).ends_with("7 minutes"));
    }
}
