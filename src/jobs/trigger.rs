//! # Job triggers: when a job fires.
//!
//! - [`Trigger::Interval`]: fixed period, first fire one period after registration
//! - [`Trigger::Cron`]: cron expression (seconds field first, 6 or 7 fields)
//! - [`Trigger::Date`]: one-shot at a wall-clock instant (fires immediately if already past)
//!
//! Fire times are computed with [`Trigger::next_fire`] from the current time and the
//! previous fire time; the engine sleeps until that instant.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;

use crate::error::TriggerError;

/// Schedule specification for a job.
#[derive(Clone, Debug)]
pub enum Trigger {
    /// Fires every `every`.
    Interval {
        /// Period between fires (non-zero).
        every: Duration,
    },
    /// Fires on each upcoming time of a cron schedule (UTC).
    Cron {
        /// Expression as given.
        expr: String,
        /// Parsed schedule.
        schedule: Box<Schedule>,
    },
    /// Fires once.
    Date {
        /// Fire instant.
        at: DateTime<Utc>,
    },
}

impl Trigger {
    /// Fixed-interval trigger.
    pub fn interval(every: Duration) -> Result<Self, TriggerError> {
        if every.is_zero() {
            return Err(TriggerError::ZeroInterval);
        }
        Ok(Trigger::Interval { every })
    }

    /// Cron trigger, e.g. `"0 */5 * * * *"` (every five minutes).
    pub fn cron(expr: &str) -> Result<Self, TriggerError> {
        let schedule = Schedule::from_str(expr).map_err(|e| TriggerError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Trigger::Cron {
            expr: expr.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// One-shot trigger.
    pub fn at(at: DateTime<Utc>) -> Self {
        Trigger::Date { at }
    }

    /// Returns the next fire time after `now`, given the previous fire `last`.
    ///
    /// `None` means the trigger is exhausted.
    pub fn next_fire(
        &self,
        now: DateTime<Utc>,
        last: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval { every } => {
                let step = TimeDelta::from_std(*every).ok()?;
                let next = last.unwrap_or(now).checked_add_signed(step)?;
                // Late fires are coalesced into one immediate fire.
                Some(next.max(now))
            }
            Trigger::Cron { schedule, .. } => {
                let from = last.map_or(now, |l| l.max(now));
                schedule.after(&from).next()
            }
            Trigger::Date { at } => match last {
                None => Some((*at).max(now)),
                Some(_) => None,
            },
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval { every } => write!(f, "interval[{every:?}]"),
            Trigger::Cron { expr, .. } => write!(f, "cron[{expr}]"),
            Trigger::Date { at } => write!(f, "date[{}]", at.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = Trigger::interval(Duration::ZERO).unwrap_err();
        assert_eq!(err, TriggerError::ZeroInterval);
        assert_eq!(err.as_label(), "trigger_zero_interval");
    }

    #[test]
    fn test_interval_steps_from_last_fire() {
        let trigger = Trigger::interval(Duration::from_secs(30)).unwrap();

        let first = trigger.next_fire(t0(), None).unwrap();
        assert_eq!(first, t0() + TimeDelta::seconds(30));

        let second = trigger.next_fire(first, Some(first)).unwrap();
        assert_eq!(second, t0() + TimeDelta::seconds(60));
    }

    #[test]
    fn test_interval_coalesces_missed_fires() {
        let trigger = Trigger::interval(Duration::from_secs(10)).unwrap();
        let now = t0() + TimeDelta::seconds(95);

        assert_eq!(trigger.next_fire(now, Some(t0())), Some(now));
    }

    #[test]
    fn test_cron_next_fire() {
        let trigger = Trigger::cron("0 */15 * * * *").unwrap();
        let next = trigger.next_fire(t0(), None).unwrap();

        assert_eq!(next, t0() + TimeDelta::minutes(15));
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn test_invalid_cron_reports_expression() {
        let err = Trigger::cron("not a cron").unwrap_err();
        assert!(matches!(err, TriggerError::InvalidCron { ref expr, .. } if expr == "not a cron"));
        assert_eq!(err.as_label(), "trigger_invalid_cron");
    }

    #[test]
    fn test_date_fires_once() {
        let at = t0() + TimeDelta::minutes(1);
        let trigger = Trigger::at(at);

        assert_eq!(trigger.next_fire(t0(), None), Some(at));
        assert_eq!(trigger.next_fire(at, Some(at)), None);
    }

    #[test]
    fn test_past_date_fires_immediately() {
        let trigger = Trigger::at(t0() - TimeDelta::hours(1));
        assert_eq!(trigger.next_fire(t0(), None), Some(t0()));
    }

    #[test]
    fn test_display() {
        let trigger = Trigger::interval(Duration::from_secs(5)).unwrap();
        assert_eq!(trigger.to_string(), "interval[5s]");
        assert_eq!(
            Trigger::cron("0 0 * * * *").unwrap().to_string(),
            "cron[0 0 * * * *]"
        );
    }
}
