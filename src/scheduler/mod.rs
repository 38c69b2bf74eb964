use crate::errors::{invalid_input, CoreResult};
use chrono::DateTime;
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

pub mod builder;

/// A validated 6-field cron schedule (second, minute, hour, day-of-month,
/// month, day-of-week) interpreted in a fixed timezone.
///
/// Validation happens once, at construction: an invalid expression is
/// rejected here rather than discovered by the evaluator at fire time.
#[derive(Clone)]
pub struct Schedule {
    expr: String,
    tz: Tz,
    inner: cron::Schedule,
}

impl Schedule {
    pub fn parse(expr: &str, tz: Tz) -> CoreResult<Self> {
        let inner = cron::Schedule::from_str(expr.trim())
            .map_err(|e| invalid_input(format!("invalid cron expression `{expr}`: {e}")))?;
        Ok(Self {
            expr: expr.trim().to_string(),
            tz,
            inner,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The next fire time strictly after `after`, in the schedule's timezone.
    pub fn next_after(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.inner.after(&after).next()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("expr", &self.expr)
            .field("tz", &self.tz)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_valid_expression() {
        let s = Schedule::parse("0 */5 * * * *", Tz::UTC).unwrap();
        assert_eq!(s.expression(), "0 */5 * * * *");
    }

    #[test]
    fn rejects_invalid_expression() {
        let err = Schedule::parse("not a cron expr", Tz::UTC).unwrap_err();
        assert!(err.to_string().contains("invalid cron expression"));
    }

    #[test]
    fn rejects_too_few_fields() {
        assert!(Schedule::parse("* * *", Tz::UTC).is_err());
    }

    #[test]
    fn next_after_advances_by_one_second() {
        let s = Schedule::parse("* * * * * *", Tz::UTC).unwrap();
        let now = Tz::UTC.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = s.next_after(now).unwrap();
        assert_eq!(next, now + chrono::Duration::seconds(1));
    }

    #[test]
    fn every_day_at_midnight_skips_to_next_day() {
        let s = Schedule::parse("0 0 0 * * *", Tz::UTC).unwrap();
        let now = Tz::UTC.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let next = s.next_after(now).unwrap();
        assert_eq!(next, Tz::UTC.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap());
    }
}
