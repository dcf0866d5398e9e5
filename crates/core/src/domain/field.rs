use crate::wire::WireType;
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field name -> decoded value for one security (or one security on one date).
pub type EntityFields = BTreeMap<String, FieldValue>;

/// A decoded field value. Produced only by the decoder; wire types never leak
/// past it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// DATE and DATETIME wire values (and TIME under legacy coercion).
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Bytes(Vec<u8>),
    /// Scalars without a native counterpart (DECIMAL, ENUMERATION), kept as text.
    Other { datatype: WireType, text: String },
    /// Array-valued (bulk) field.
    List(Vec<FieldValue>),
    /// Sequence-valued field, e.g. one row of a bulk field.
    Group(EntityFields),
}

impl FieldValue {
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::DateTime(_) | Self::Time(_))
    }
}

/// How TIME-typed wire values are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeCoercion {
    /// Keep a time-of-day as [`FieldValue::Time`]. DATE and DATETIME still
    /// decode to [`FieldValue::DateTime`]; TIME does not.
    #[default]
    TimeOfDay,
    /// Anchor the time-of-day on 0001-01-01 and yield [`FieldValue::DateTime`].
    /// Matches output produced by older clients of the same service, where
    /// every temporal wire type (TIME included) decodes to a date-time. Use
    /// this mode when callers rely on that.
    LegacyDateTime,
}

impl TimeCoercion {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time_of_day" | "time" => Some(Self::TimeOfDay),
            "legacy_datetime" | "legacy" => Some(Self::LegacyDateTime),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_plain_json_values() {
        let mut fields = EntityFields::new();
        fields.insert("PX_LAST".into(), FieldValue::Float(350.5));
        fields.insert("NAME".into(), FieldValue::String("IBM".into()));
        let v = serde_json::to_value(&fields).unwrap();
        assert_eq!(v, json!({"NAME": "IBM", "PX_LAST": 350.5}));
    }

    #[test]
    fn parses_time_coercion_names() {
        assert_eq!(TimeCoercion::parse("legacy_datetime"), Some(TimeCoercion::LegacyDateTime));
        assert_eq!(TimeCoercion::parse(" Time_Of_Day "), Some(TimeCoercion::TimeOfDay));
        assert_eq!(TimeCoercion::parse("nope"), None);
    }
}
