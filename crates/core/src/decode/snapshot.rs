use super::coerce::decode_fields;
use super::ResponseAccumulator;
use crate::domain::{SnapshotResult, TimeCoercion};
use crate::error::{RefDataError, Result};
use crate::wire::{ElementValue, Message};

/// Folds `ReferenceDataResponse` messages into a [`SnapshotResult`].
#[derive(Debug, Default)]
pub struct SnapshotAccumulator {
    time: TimeCoercion,
    result: SnapshotResult,
}

impl SnapshotAccumulator {
    pub fn new(time: TimeCoercion) -> Self {
        Self {
            time,
            result: SnapshotResult::default(),
        }
    }
}

impl ResponseAccumulator for SnapshotAccumulator {
    type Output = SnapshotResult;

    fn absorb(&mut self, msg: &Message) -> Result<()> {
        let data = msg.get("securityData").ok_or_else(|| {
            RefDataError::decode(format!("{} without securityData", msg.message_type))
        })?;

        for entry in data.values() {
            absorb_entry(&mut self.result, entry, self.time)?;
        }
        Ok(())
    }

    fn finish(self) -> SnapshotResult {
        self.result
    }
}

fn absorb_entry(result: &mut SnapshotResult, entry: &ElementValue, time: TimeCoercion) -> Result<()> {
    let security = entry
        .get("security")
        .and_then(|s| s.as_str())
        .ok_or_else(|| RefDataError::decode("securityData entry without security"))?;

    if let Some(err) = entry.get("securityError") {
        let message = super::security_error_message(err);
        tracing::warn!(security, error = %message, "security returned an error; omitting");
        result.security_errors.insert(security.to_string(), message);
        return Ok(());
    }

    if let Some(exceptions) = entry.get("fieldExceptions") {
        super::log_field_exceptions(security, exceptions);
    }

    let Some(field_data) = entry.get("fieldData") else {
        tracing::debug!(security, "no fieldData for security");
        return Ok(());
    };

    let decoded = decode_fields(field_data.children(), time)
        .map_err(|e| RefDataError::decode(format!("{security}: {e}")))?;
    if decoded.is_empty() {
        return Ok(());
    }

    result
        .securities
        .entry(security.to_string())
        .or_default()
        .extend(decoded);
    Ok(())
}
