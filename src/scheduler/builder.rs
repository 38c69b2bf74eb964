//! A small fluent builder for the common recurring schedules, so callers
//! don't have to hand-write cron expressions for the frequent cases.

/// Entry point: `every(5).minutes()` reads naturally and produces the same
/// 6-field expression string that [`super::Schedule::parse`] accepts.
pub fn every(n: u32) -> Every {
    Every(n)
}

pub struct Every(u32);

impl Every {
    pub fn seconds(self) -> String {
        format!("*/{} * * * * *", self.0.max(1))
    }

    pub fn minutes(self) -> String {
        format!("0 */{} * * * *", self.0.max(1))
    }

    pub fn hours(self) -> String {
        format!("0 0 */{} * * *", self.0.max(1))
    }

    /// Once a day at the given hour/minute/second (the receiver's count is
    /// ignored; `every(1).day_at(...)` reads best).
    pub fn day_at(self, hour: u32, minute: u32, second: u32) -> String {
        format!("{second} {minute} {hour} * * *")
    }

    /// Once a week, on `weekday` (0 = Sunday .. 6 = Saturday), at the given
    /// time of day.
    pub fn weekday_at(self, weekday: u32, hour: u32, minute: u32, second: u32) -> String {
        format!("{second} {minute} {hour} * * {weekday}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Schedule;
    use chrono_tz::Tz;

    #[test]
    fn builder_output_parses() {
        for expr in [
            every(1).seconds(),
            every(5).minutes(),
            every(2).hours(),
            every(1).day_at(3, 30, 0),
            every(1).weekday_at(1, 9, 0, 0),
        ] {
            Schedule::parse(&expr, Tz::UTC).unwrap();
        }
    }

    #[test]
    fn zero_count_clamps_to_one() {
        assert_eq!(every(0).seconds(), "*/1 * * * * *");
    }
}
