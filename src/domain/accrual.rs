//! Daily earnings accrual.
//!
//! Earnings are credited in whole periods (24h by default) measured from the
//! user's last-update timestamp. The timestamp only ever advances by whole
//! periods, so re-running a check without time passing credits nothing.

use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};

use super::user::Plan;

pub const DAILY: Duration = Duration::DAY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accrual {
    pub credit: Decimal,
    pub periods: i64,
    pub last_update: OffsetDateTime,
}

impl Accrual {
    pub fn is_due(&self) -> bool {
        self.periods > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccrualEngine {
    threshold: Duration,
}

impl Default for AccrualEngine {
    fn default() -> Self {
        Self::new(DAILY)
    }
}

impl AccrualEngine {
    /// Thresholds shorter than one second are raised to one second.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold: threshold.max(Duration::SECOND),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Credits `rate` once for every whole period elapsed since `last`.
    pub fn accrue(
        &self,
        last: Option<OffsetDateTime>,
        now: OffsetDateTime,
        rate: Decimal,
    ) -> Accrual {
        self.accrue_with(last, now, |periods, _| rate * Decimal::from(periods))
    }

    /// Credits each plan's daily rate for every elapsed period boundary that
    /// falls inside the plan's lifetime (`started_at < t <= expires_at`).
    pub fn accrue_plans(
        &self,
        last: Option<OffsetDateTime>,
        now: OffsetDateTime,
        plans: &[Plan],
    ) -> Accrual {
        self.accrue_with(last, now, |periods, last| {
            plans
                .iter()
                .map(|plan| plan.daily_rate * Decimal::from(self.periods_within(plan, last, periods)))
                .sum()
        })
    }

    fn accrue_with<F>(&self, last: Option<OffsetDateTime>, now: OffsetDateTime, credit: F) -> Accrual
    where
        F: FnOnce(i64, OffsetDateTime) -> Decimal,
    {
        let Some(last) = last else {
            return Accrual {
                credit: Decimal::ZERO,
                periods: 0,
                last_update: now,
            };
        };

        let periods = self.elapsed_periods(last, now);
        if periods == 0 {
            return Accrual {
                credit: Decimal::ZERO,
                periods,
                last_update: last,
            };
        }

        Accrual {
            credit: credit(periods, last),
            periods,
            last_update: last + Duration::seconds(self.threshold_secs() * periods),
        }
    }

    fn elapsed_periods(&self, last: OffsetDateTime, now: OffsetDateTime) -> i64 {
        let elapsed = (now - last).whole_seconds();
        if elapsed <= 0 {
            return 0;
        }
        elapsed / self.threshold_secs()
    }

    fn periods_within(&self, plan: &Plan, last: OffsetDateTime, periods: i64) -> i64 {
        let period = self.threshold_secs();
        let since_start = (plan.started_at - last).whole_seconds();
        let until_expiry = (plan.expires_at - last).whole_seconds();

        let first_k = (since_start.div_euclid(period) + 1).max(1);
        let last_k = until_expiry.div_euclid(period).min(periods);
        (last_k - first_k + 1).max(0)
    }

    fn threshold_secs(&self) -> i64 {
        self.threshold.whole_seconds().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn plan(rate: i64, started_at: OffsetDateTime, days: i64) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            offer_id: None,
            name: "Starter".into(),
            principal: Decimal::from(20),
            daily_rate: Decimal::from(rate),
            started_at,
            expires_at: started_at + Duration::days(days),
        }
    }

    #[test]
    fn first_call_initializes_without_credit() {
        let now = datetime!(2024-03-01 12:00 UTC);
        let accrual = AccrualEngine::default().accrue(None, now, Decimal::from(5));
        assert_eq!(accrual.credit, Decimal::ZERO);
        assert_eq!(accrual.last_update, now);
        assert!(!accrual.is_due());
    }

    #[test]
    fn credits_whole_periods_only() {
        let last = datetime!(2024-03-01 12:00 UTC);
        let now = last + Duration::hours(60);
        let accrual = AccrualEngine::default().accrue(Some(last), now, Decimal::new(15, 1));

        assert_eq!(accrual.periods, 2);
        assert_eq!(accrual.credit, Decimal::from(3));
        assert_eq!(accrual.last_update, last + Duration::days(2));
    }

    #[test]
    fn second_call_at_same_instant_credits_nothing() {
        let engine = AccrualEngine::default();
        let last = datetime!(2024-03-01 00:00 UTC);
        let now = last + Duration::hours(49);

        let first = engine.accrue(Some(last), now, Decimal::from(2));
        let second = engine.accrue(Some(first.last_update), now, Decimal::from(2));

        assert_eq!(first.credit, Decimal::from(4));
        assert_eq!(second.credit, Decimal::ZERO);
        assert_eq!(second.last_update, first.last_update);
    }

    #[test]
    fn below_threshold_keeps_timestamp() {
        let last = datetime!(2024-03-01 00:00 UTC);
        let accrual =
            AccrualEngine::default().accrue(Some(last), last + Duration::hours(23), Decimal::ONE);
        assert_eq!(accrual.credit, Decimal::ZERO);
        assert_eq!(accrual.last_update, last);
    }

    #[test]
    fn clock_skew_credits_nothing() {
        let last = datetime!(2024-03-02 00:00 UTC);
        let accrual =
            AccrualEngine::default().accrue(Some(last), last - Duration::days(3), Decimal::ONE);
        assert_eq!(accrual.credit, Decimal::ZERO);
        assert_eq!(accrual.last_update, last);
    }

    #[test]
    fn credit_is_monotonic_in_elapsed_time() {
        let engine = AccrualEngine::default();
        let last = datetime!(2024-01-01 00:00 UTC);
        let mut previous = Decimal::ZERO;
        for hours in (0..24 * 10).step_by(7) {
            let accrual = engine.accrue(Some(last), last + Duration::hours(hours), Decimal::from(3));
            assert_eq!(accrual.credit, Decimal::from(3 * (hours / 24)));
            assert!(accrual.credit >= previous);
            previous = accrual.credit;
        }
    }

    #[test]
    fn custom_threshold_is_respected() {
        let engine = AccrualEngine::new(Duration::hours(1));
        let last = datetime!(2024-01-01 00:00 UTC);
        let accrual = engine.accrue(Some(last), last + Duration::minutes(150), Decimal::from(10));
        assert_eq!(accrual.periods, 2);
        assert_eq!(accrual.credit, Decimal::from(20));
    }

    #[test]
    fn expired_plans_stop_earning() {
        let engine = AccrualEngine::default();
        let last = datetime!(2024-01-01 00:00 UTC);
        let plans = [plan(2, last - Duration::days(1), 3)];

        // plan runs until day 2; ten days pass
        let accrual = engine.accrue_plans(Some(last), last + Duration::days(10), &plans);
        assert_eq!(accrual.periods, 10);
        assert_eq!(accrual.credit, Decimal::from(4));
    }

    #[test]
    fn plan_bought_mid_period_earns_from_next_boundary() {
        let engine = AccrualEngine::default();
        let last = datetime!(2024-01-01 00:00 UTC);
        let plans = [
            plan(1, last - Duration::days(5), 30),
            plan(5, last + Duration::hours(30), 30),
        ];

        let accrual = engine.accrue_plans(Some(last), last + Duration::days(3), &plans);
        // newer plan only sees the 48h and 72h boundaries
        assert_eq!(accrual.credit, Decimal::from(3 + 10));
    }

    #[test]
    fn no_plans_still_advances_timestamp() {
        let engine = AccrualEngine::default();
        let last = datetime!(2024-01-01 00:00 UTC);
        let accrual = engine.accrue_plans(Some(last), last + Duration::days(2), &[]);
        assert_eq!(accrual.credit, Decimal::ZERO);
        assert_eq!(accrual.last_update, last + Duration::days(2));
    }
}
