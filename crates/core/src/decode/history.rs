use super::coerce::{decode_fields, element_date};
use super::ResponseAccumulator;
use crate::domain::{TimeCoercion, TimeSeriesResult};
use crate::error::{RefDataError, Result};
use crate::wire::Message;

/// Folds `HistoricalDataResponse` messages into a [`TimeSeriesResult`].
///
/// Each message carries a single security; its `fieldData` is one row per date.
/// The `date` element keys the row and is not repeated among its fields.
#[derive(Debug, Default)]
pub struct TimeSeriesAccumulator {
    time: TimeCoercion,
    result: TimeSeriesResult,
}

impl TimeSeriesAccumulator {
    pub fn new(time: TimeCoercion) -> Self {
        Self {
            time,
            result: TimeSeriesResult::default(),
        }
    }
}

impl ResponseAccumulator for TimeSeriesAccumulator {
    type Output = TimeSeriesResult;

    fn absorb(&mut self, msg: &Message) -> Result<()> {
        let data = msg.get("securityData").ok_or_else(|| {
            RefDataError::decode(format!("{} without securityData", msg.message_type))
        })?;
        let security = data
            .get("security")
            .and_then(|s| s.as_str())
            .ok_or_else(|| RefDataError::decode("securityData without security"))?;

        if let Some(err) = data.get("securityError") {
            let message = super::security_error_message(err);
            tracing::warn!(security, error = %message, "security returned an error; omitting");
            self.result
                .security_errors
                .insert(security.to_string(), message);
            return Ok(());
        }

        if let Some(exceptions) = data.get("fieldExceptions") {
            super::log_field_exceptions(security, exceptions);
        }

        let Some(field_data) = data.get("fieldData") else {
            tracing::debug!(security, "no fieldData for security");
            return Ok(());
        };

        for row in field_data.values() {
            let date_el = row
                .get("date")
                .ok_or_else(|| RefDataError::decode(format!("{security}: row without date")))?;
            let date = element_date(date_el)?;
            let fields = decode_fields(row.children().iter().filter(|e| e.name != "date"), self.time)
                .map_err(|e| RefDataError::decode(format!("{security} {date}: {e}")))?;

            let series = self
                .result
                .securities
                .entry(security.to_string())
                .or_default();
            if series.insert(date, fields).is_some() {
                tracing::debug!(security, %date, "repeated date; keeping the later row");
            }
        }
        Ok(())
    }

    fn finish(self) -> TimeSeriesResult {
        self.result
    }
}
