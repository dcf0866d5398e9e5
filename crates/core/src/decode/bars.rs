use super::coerce::{decode_fields, element_datetime};
use super::ResponseAccumulator;
use crate::domain::{IntradayBarResult, TimeCoercion};
use crate::error::{RefDataError, Result};
use crate::wire::Message;

/// Folds `IntradayBarResponse` messages; bars are keyed by their `time` element.
#[derive(Debug)]
pub struct IntradayBarAccumulator {
    time: TimeCoercion,
    result: IntradayBarResult,
}

impl IntradayBarAccumulator {
    pub fn new(security: &str, time: TimeCoercion) -> Self {
        Self {
            time,
            result: IntradayBarResult {
                security: security.to_string(),
                ..Default::default()
            },
        }
    }
}

impl ResponseAccumulator for IntradayBarAccumulator {
    type Output = IntradayBarResult;

    fn absorb(&mut self, msg: &Message) -> Result<()> {
        let bar_data = msg.get("barData").ok_or_else(|| {
            RefDataError::decode(format!("{} without barData", msg.message_type))
        })?;
        let Some(ticks) = bar_data.get("barTickData") else {
            return Ok(());
        };

        for bar in ticks.values() {
            let time_el = bar
                .get("time")
                .ok_or_else(|| RefDataError::decode("bar without time"))?;
            let at = element_datetime(time_el)?;
            let fields = decode_fields(bar.children().iter().filter(|e| e.name != "time"), self.time)?;
            self.result.bars.insert(at, fields);
        }
        Ok(())
    }

    fn finish(self) -> IntradayBarResult {
        self.result
    }
}
