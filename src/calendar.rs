use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

pub const GRID_WEEKS: usize = 6;
pub const DAYS_PER_WEEK: usize = 7;

// Picker window. chrono reaches much further; the clamp keeps the grid
// arithmetic far away from its edges.
pub const MIN_YEAR: i32 = 1600;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDay {
    pub date: String,
    pub day: u32,
    /// 0 = Sunday .. 6 = Saturday, same convention as schedule rows.
    pub day_of_week: i64,
    /// False for the leading/trailing fill days from adjacent months.
    pub in_month: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    /// Weekday of the 1st, 0 = Sunday.
    pub first_day_of_week: i64,
    /// Always 6 rows of 7 cells.
    pub weeks: Vec<Vec<GridDay>>,
}

/// Builds the Sunday-first date-picker grid for one month. Returns `None`
/// when the month is not 1-12 or the year falls outside the picker window.
pub fn month_grid(year: i32, month: u32) -> Option<MonthGrid> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let lead = first.weekday().num_days_from_sunday() as i64;
    let start = first - Duration::days(lead);

    let mut weeks = Vec::with_capacity(GRID_WEEKS);
    let mut cursor = start;
    for _ in 0..GRID_WEEKS {
        let mut week = Vec::with_capacity(DAYS_PER_WEEK);
        for _ in 0..DAYS_PER_WEEK {
            week.push(GridDay {
                date: cursor.format("%Y-%m-%d").to_string(),
                day: cursor.day(),
                day_of_week: cursor.weekday().num_days_from_sunday() as i64,
                in_month: cursor.year() == year && cursor.month() == month,
            });
            cursor = cursor + Duration::days(1);
        }
        weeks.push(week);
    }

    Some(MonthGrid {
        year,
        month,
        days_in_month: days_in_month(year, month),
        first_day_of_week: lead,
        weeks,
    })
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    // Day before the 1st of the following month.
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(30)
}

/// Prev/next navigation for the picker header. `delta` is a signed number
/// of months; the year carries in either direction. Returns `None` for a
/// month outside 1-12 or a result outside the picker window.
pub fn shift_month(year: i32, month: u32, delta: i64) -> Option<(i32, u32)> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let base = (year as i64) * 12 + (month as i64 - 1);
    let total = base.checked_add(delta)?;
    let shifted_year = total.div_euclid(12);
    let shifted_month = (total.rem_euclid(12) + 1) as u32;
    if !((MIN_YEAR as i64)..=(MAX_YEAR as i64)).contains(&shifted_year) {
        return None;
    }
    Some((shifted_year as i32, shifted_month))
}
