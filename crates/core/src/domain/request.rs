use crate::error::{RefDataError, Result};
use crate::wire::Request;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REFERENCE_DATA_REQUEST: &str = "ReferenceDataRequest";
pub const HISTORICAL_DATA_REQUEST: &str = "HistoricalDataRequest";
pub const INTRADAY_BAR_REQUEST: &str = "IntradayBarRequest";

const WIRE_DATE_FORMAT: &str = "%Y%m%d";
const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(RefDataError::invalid(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }
}

/// Securities and fields for one request, plus the date range in time-series mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    securities: Vec<String>,
    fields: Vec<String>,
    range: Option<DateRange>,
}

impl RequestSpec {
    pub fn new<S, F>(securities: &[S], fields: &[F]) -> Result<Self>
    where
        S: AsRef<str>,
        F: AsRef<str>,
    {
        Ok(Self {
            securities: non_blank_list("securities", securities)?,
            fields: non_blank_list("fields", fields)?,
            range: None,
        })
    }

    pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        self.range = Some(DateRange::new(start, end)?);
        Ok(self)
    }

    pub fn snapshot_request(&self) -> Request {
        let mut req = Request::new(REFERENCE_DATA_REQUEST);
        self.append_lists(&mut req);
        req
    }

    pub fn time_series_request(&self) -> Result<Request> {
        let range = self
            .range
            .ok_or_else(|| RefDataError::invalid("time-series request needs a date range"))?;

        let mut req = Request::new(HISTORICAL_DATA_REQUEST);
        self.append_lists(&mut req);
        req.set("startDate", range.start.format(WIRE_DATE_FORMAT).to_string());
        req.set("endDate", range.end.format(WIRE_DATE_FORMAT).to_string());
        Ok(req)
    }

    fn append_lists(&self, req: &mut Request) {
        for security in &self.securities {
            req.append("securities", security.as_str());
        }
        for field in &self.fields {
            req.append("fields", field.as_str());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarEventType {
    #[default]
    Trade,
    Bid,
    Ask,
    BestBid,
    BestAsk,
}

impl BarEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRADE" => Some(Self::Trade),
            "BID" => Some(Self::Bid),
            "ASK" => Some(Self::Ask),
            "BEST_BID" => Some(Self::BestBid),
            "BEST_ASK" => Some(Self::BestAsk),
            _ => None,
        }
    }
}

impl fmt::Display for BarEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trade => "TRADE",
            Self::Bid => "BID",
            Self::Ask => "ASK",
            Self::BestBid => "BEST_BID",
            Self::BestAsk => "BEST_ASK",
        })
    }
}

/// One security's intraday bars between two instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradayBarSpec {
    security: String,
    event_type: BarEventType,
    interval_minutes: u32,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl IntradayBarSpec {
    pub fn new(
        security: &str,
        event_type: BarEventType,
        interval_minutes: u32,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self> {
        let security = security.trim();
        if security.is_empty() {
            return Err(RefDataError::invalid("security must be non-empty"));
        }
        if !(1..=1440).contains(&interval_minutes) {
            return Err(RefDataError::invalid(format!(
                "bar interval must be 1..=1440 minutes (got {interval_minutes})"
            )));
        }
        if start >= end {
            return Err(RefDataError::invalid(format!(
                "bar window start {start} must be before end {end}"
            )));
        }
        Ok(Self {
            security: security.to_string(),
            event_type,
            interval_minutes,
            start,
            end,
        })
    }

    pub fn security(&self) -> &str {
        &self.security
    }

    pub fn request(&self) -> Request {
        let mut req = Request::new(INTRADAY_BAR_REQUEST);
        req.set("security", self.security.as_str());
        req.set("eventType", self.event_type.to_string());
        req.set("interval", self.interval_minutes.to_string());
        req.set(
            "startDateTime",
            self.start.format(WIRE_DATETIME_FORMAT).to_string(),
        );
        req.set(
            "endDateTime",
            self.end.format(WIRE_DATETIME_FORMAT).to_string(),
        );
        req
    }
}

fn non_blank_list<S: AsRef<str>>(what: &str, items: &[S]) -> Result<Vec<String>> {
    if items.is_empty() {
        return Err(RefDataError::invalid(format!("{what} must be non-empty")));
    }
    items
        .iter()
        .map(|s| {
            let s = s.as_ref().trim();
            if s.is_empty() {
                Err(RefDataError::invalid(format!("{what} must not contain blank entries")))
            } else {
                Ok(s.to_string())
            }
        })
        .collect()
}
