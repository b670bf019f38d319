//! Time-based tariff.

use chrono::TimeDelta;
use parkgate_types::{Money, Timestamp};

const SECONDS_PER_HOUR: u64 = 3600;

/// Grace window followed by whole-hour billing.
///
/// Stays at or under the grace window are free. Anything longer is billed per
/// started hour, so 16 minutes and 60 minutes both cost one hourly rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeePolicy {
    hourly_rate: Money,
    grace: TimeDelta,
}

impl FeePolicy {
    pub fn new(hourly_rate: Money, grace_minutes: u32) -> Self {
        Self {
            hourly_rate,
            grace: TimeDelta::minutes(grace_minutes as i64),
        }
    }

    pub fn hourly_rate(&self) -> Money {
        self.hourly_rate
    }

    pub fn grace(&self) -> TimeDelta {
        self.grace
    }

    /// Fee for a stay from `entered_at` to `exited_at`. A negative span bills as zero.
    pub fn fee(&self, entered_at: Timestamp, exited_at: Timestamp) -> Money {
        let elapsed = (exited_at - entered_at).max(TimeDelta::zero());
        if elapsed <= self.grace {
            return Money::ZERO;
        }
        let hours = (elapsed.num_seconds() as u64).div_ceil(SECONDS_PER_HOUR);
        self.hourly_rate.saturating_mul(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn policy() -> FeePolicy {
        FeePolicy::new(Money::from_cents(2000), 15)
    }

    fn fee_after(span: TimeDelta) -> Money {
        let entered = Local.with_ymd_and_hms(2025, 11, 27, 10, 6, 0).unwrap();
        policy().fee(entered, entered + span)
    }

    #[test]
    fn grace_window_is_free() {
        assert_eq!(fee_after(TimeDelta::zero()), Money::ZERO);
        assert_eq!(fee_after(TimeDelta::minutes(15)), Money::ZERO);
    }

    #[test]
    fn first_minute_past_grace_bills_an_hour() {
        assert_eq!(fee_after(TimeDelta::minutes(16)), Money::from_cents(2000));
        assert_eq!(
            fee_after(TimeDelta::minutes(15) + TimeDelta::seconds(1)),
            Money::from_cents(2000)
        );
    }

    #[test]
    fn partial_hours_round_up() {
        assert_eq!(fee_after(TimeDelta::minutes(60)), Money::from_cents(2000));
        assert_eq!(fee_after(TimeDelta::minutes(61)), Money::from_cents(4000));
        assert_eq!(fee_after(TimeDelta::minutes(125)), Money::from_cents(6000));
    }

    #[test]
    fn multi_day_stays_use_the_same_rule() {
        assert_eq!(
            fee_after(TimeDelta::days(2) + TimeDelta::minutes(1)),
            Money::from_cents(2000 * 49)
        );
    }

    #[test]
    fn negative_span_is_free() {
        assert_eq!(fee_after(TimeDelta::minutes(-90)), Money::ZERO);
    }
}
