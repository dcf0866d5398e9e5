use crate::domain::field::EntityFields;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-security field values from one reference-data response.
///
/// A requested security that returned no data is simply absent from
/// `securities`. When the server said why, the reason is in `security_errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotResult {
    pub securities: BTreeMap<String, EntityFields>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_errors: BTreeMap<String, String>,
}

impl SnapshotResult {
    pub fn get(&self, security: &str) -> Option<&EntityFields> {
        self.securities.get(security)
    }

    pub fn len(&self) -> usize {
        self.securities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    /// Requested securities that came back without data.
    pub fn missing<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        missing_keys(&self.securities, requested)
    }
}

/// Per-security, per-date field values from one historical-data response.
///
/// Dates for a security iterate in the order the server delivered them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeriesResult {
    pub securities: BTreeMap<String, IndexMap<NaiveDate, EntityFields>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_errors: BTreeMap<String, String>,
}

impl TimeSeriesResult {
    pub fn get(&self, security: &str) -> Option<&IndexMap<NaiveDate, EntityFields>> {
        self.securities.get(security)
    }

    pub fn on(&self, security: &str, date: NaiveDate) -> Option<&EntityFields> {
        self.securities.get(security)?.get(&date)
    }

    pub fn len(&self) -> usize {
        self.securities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    pub fn missing<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        missing_keys(&self.securities, requested)
    }
}

/// Bars for one security keyed by bar open time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntradayBarResult {
    pub security: String,
    pub bars: BTreeMap<NaiveDateTime, EntityFields>,
}

fn missing_keys<'a, V>(present: &BTreeMap<String, V>, requested: &'a [String]) -> Vec<&'a str> {
    requested
        .iter()
        .map(String::as_str)
        .filter(|s| !present.contains_key(*s))
        .collect()
}
