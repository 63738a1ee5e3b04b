use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{Booking, BookingStatus};

pub const GRID_CELLS: usize = 42;
const MAX_DOTS: usize = 3;

/// Bucket key for a booking's day. Derived from the stored naive datetime;
/// duration never spills a booking into the next day's bucket.
pub fn day_key(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d").to_string()
}

pub fn bucket_by_day(bookings: &[Booking]) -> BTreeMap<String, Vec<&Booking>> {
    let mut map: BTreeMap<String, Vec<&Booking>> = BTreeMap::new();
    for booking in bookings {
        map.entry(day_key(&booking.scheduled_at))
            .or_default()
            .push(booking);
    }
    map
}

#[derive(Debug, Clone, Serialize)]
pub struct GridDay {
    pub date: NaiveDate,
    pub in_month: bool,
}

/// Six fixed weeks, Monday-first. Leading cells come from the previous
/// month, trailing cells from the next.
pub fn month_grid(year: i32, month: u32) -> Vec<GridDay> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    let lead = first.weekday().num_days_from_monday() as i64;
    let start = first - Duration::days(lead);

    (0..GRID_CELLS as i64)
        .map(|offset| {
            let date = start + Duration::days(offset);
            GridDay {
                date,
                in_month: date.month() == month && date.year() == year,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct DayIndicators {
    pub dots: Vec<&'static str>,
    pub overflow: usize,
}

/// At most three status dots per day; anything beyond shows as `+N`.
pub fn day_indicators(statuses: &[BookingStatus]) -> DayIndicators {
    let dots: Vec<&'static str> = statuses
        .iter()
        .take(MAX_DOTS)
        .map(|s| s.as_str())
        .collect();
    let overflow = statuses.len().saturating_sub(MAX_DOTS);
    DayIndicators { dots, overflow }
}

/// Pending bookings awaiting provider action, soonest first.
pub fn awaiting_action(bookings: &[Booking]) -> Vec<&Booking> {
    let mut pending: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Pending)
        .collect();
    pending.sort_by_key(|b| b.scheduled_at);
    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn make_booking(id: &str, scheduled: &str, status: BookingStatus) -> Booking {
        let now = dt("2025-01-01 00:00");
        Booking {
            id: id.to_string(),
            post_id: "p1".to_string(),
            provider_id: "prov".to_string(),
            client_id: "cli".to_string(),
            scheduled_at: dt(scheduled),
            duration_minutes: 60,
            status,
            client_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_day_key_ignores_duration() {
        let mut b = make_booking("b1", "2024-03-15 10:00", BookingStatus::Pending);
        b.duration_minutes = 6000;
        assert_eq!(day_key(&b.scheduled_at), "2024-03-15");
    }

    #[test]
    fn test_bucket_by_day() {
        let bookings = vec![
            make_booking("b1", "2024-03-15 10:00", BookingStatus::Pending),
            make_booking("b2", "2024-03-15 14:00", BookingStatus::Confirmed),
            make_booking("b3", "2024-03-16 09:00", BookingStatus::Pending),
        ];
        let buckets = bucket_by_day(&bookings);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets["2024-03-15"].len(), 2);
        assert_eq!(buckets["2024-03-16"].len(), 1);
    }

    #[test]
    fn test_grid_always_42_cells() {
        for (year, month) in [
            (2024, 2), // leap February
            (2025, 2), // non-leap February starting Saturday
            (2025, 6), // June 2025 starts on a Sunday (max lead)
            (2025, 9), // September 2025 starts on a Monday (zero lead)
            (2025, 12),
            (2024, 1),
        ] {
            let grid = month_grid(year, month);
            assert_eq!(grid.len(), GRID_CELLS, "{year}-{month}");
        }
    }

    #[test]
    fn test_grid_starts_monday() {
        for (year, month) in [(2024, 2), (2025, 6), (2025, 9)] {
            let grid = month_grid(year, month);
            assert_eq!(
                grid[0].date.weekday(),
                chrono::Weekday::Mon,
                "{year}-{month}"
            );
        }
    }

    #[test]
    fn test_grid_zero_lead_month() {
        // September 2025 begins on a Monday: the grid opens with the 1st.
        let grid = month_grid(2025, 9);
        assert_eq!(grid[0].date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert!(grid[0].in_month);
        // 30-day month fills the tail with October days.
        assert!(!grid[41].in_month);
        assert_eq!(grid[41].date.month(), 10);
    }

    #[test]
    fn test_grid_leading_days_from_previous_month() {
        // June 2025 starts Sunday, so six leading May days.
        let grid = month_grid(2025, 6);
        for cell in &grid[..6] {
            assert!(!cell.in_month);
            assert_eq!(cell.date.month(), 5);
        }
        assert_eq!(grid[6].date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn test_day_indicators_caps_at_three() {
        let statuses = vec![
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Pending,
            BookingStatus::Pending,
        ];
        let indicators = day_indicators(&statuses);
        assert_eq!(indicators.dots, vec!["pending", "confirmed", "completed"]);
        assert_eq!(indicators.overflow, 2);

        let indicators = day_indicators(&statuses[..2]);
        assert_eq!(indicators.dots.len(), 2);
        assert_eq!(indicators.overflow, 0);
    }

    #[test]
    fn test_awaiting_action_sorted_ascending() {
        let bookings = vec![
            make_booking("late", "2024-03-20 10:00", BookingStatus::Pending),
            make_booking("done", "2024-03-10 10:00", BookingStatus::Completed),
            make_booking("early", "2024-03-12 10:00", BookingStatus::Pending),
        ];
        let awaiting = awaiting_action(&bookings);
        let ids: Vec<&str> = awaiting.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }
}
