use chrono::TimeZone;
use chrono_tz::Tz;
use pebble_core::scheduler::builder::every;
use pebble_core::scheduler::Schedule;

#[test]
fn every_seconds_builder_round_trips_through_parse() {
    let expr = every(1).seconds();
    let schedule = Schedule::parse(&expr, Tz::UTC).unwrap();
    assert_eq!(schedule.expression(), "*/1 * * * * *");

    let now = Tz::UTC.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let next = schedule.next_after(now).unwrap();
    assert_eq!(next, now + chrono::Duration::seconds(1));
}

#[test]
fn weekday_at_builder_fires_on_the_requested_day() {
    let expr = every(1).weekday_at(1, 9, 0, 0); // Monday at 09:00:00
    let schedule = Schedule::parse(&expr, Tz::UTC).unwrap();

    // 2026-07-27 is a Monday.
    let sunday = Tz::UTC.with_ymd_and_hms(2026, 7, 26, 12, 0, 0).unwrap();
    let next = schedule.next_after(sunday).unwrap();
    assert_eq!(next, Tz::UTC.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap());
}

#[test]
fn invalid_expression_is_rejected_at_construction() {
    assert!(Schedule::parse("nonsense", Tz::UTC).is_err());
}
