use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

// Default intraday window (UTC), roughly the US cash session.
const SESSION_OPEN_UTC: (u32, u32) = (13, 30);
const SESSION_CLOSE_UTC: (u32, u32) = (21, 30);

/// The weekday before `today`. Holidays are not considered.
pub fn previous_trading_date(today: NaiveDate) -> NaiveDate {
    let mut date = today - Duration::days(1);
    while is_weekend(date) {
        date = date - Duration::days(1);
    }
    date
}

/// Open and close of the default intraday window on `date`.
pub fn session_window(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let at = |(h, m): (u32, u32)| date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN));
    (at(SESSION_OPEN_UTC), at(SESSION_CLOSE_UTC))
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}
