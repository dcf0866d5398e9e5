use crate::domain::{EntityFields, FieldValue, TimeCoercion};
use crate::error::{RefDataError, Result};
use crate::wire::{Element, ElementValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Decodes one wire value.
///
/// DATE and DATETIME become [`FieldValue::DateTime`]; TIME follows `time`.
/// Every other datatype passes through as its native scalar.
pub fn coerce(value: &ElementValue, time: TimeCoercion) -> Result<FieldValue> {
    Ok(match value {
        ElementValue::Bool(v) => FieldValue::Bool(*v),
        ElementValue::Char(c) => FieldValue::String(c.to_string()),
        ElementValue::Byte(v) => FieldValue::Int(i64::from(*v)),
        ElementValue::Int32(v) => FieldValue::Int(i64::from(*v)),
        ElementValue::Int64(v) => FieldValue::Int(*v),
        ElementValue::Float32(v) => FieldValue::Float(f64::from(*v)),
        ElementValue::Float64(v) => FieldValue::Float(*v),
        ElementValue::String(s) => FieldValue::String(s.clone()),
        ElementValue::ByteArray(b) => FieldValue::Bytes(b.clone()),
        ElementValue::Decimal(text) | ElementValue::Enumeration(text) => FieldValue::Other {
            datatype: value.datatype(),
            text: text.clone(),
        },
        ElementValue::Date(s) => FieldValue::DateTime(parse_date(s)?.and_time(NaiveTime::MIN)),
        ElementValue::Datetime(s) => FieldValue::DateTime(parse_datetime(s)?),
        ElementValue::Time(s) => {
            let t = parse_time(s)?;
            match time {
                TimeCoercion::TimeOfDay => FieldValue::Time(t),
                TimeCoercion::LegacyDateTime => FieldValue::DateTime(legacy_anchor().and_time(t)),
            }
        }
        ElementValue::Sequence(children) => FieldValue::Group(decode_fields(children, time)?),
        ElementValue::Choice(inner) => {
            FieldValue::Group(decode_fields(std::slice::from_ref(inner.as_ref()), time)?)
        }
        ElementValue::Array(values) => FieldValue::List(
            values
                .iter()
                .map(|v| coerce(v, time))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

/// Decodes a block of named elements into a field map. A repeated name keeps
/// the last value.
pub fn decode_fields<'a>(
    elements: impl IntoIterator<Item = &'a Element>,
    time: TimeCoercion,
) -> Result<EntityFields> {
    let mut out = EntityFields::new();
    for el in elements {
        let value = coerce(&el.value, time)
            .map_err(|e| RefDataError::decode(format!("field {}: {e}", el.name)))?;
        out.insert(el.name.clone(), value);
    }
    Ok(out)
}

/// Calendar date of a DATE or DATETIME element, used for map keys.
pub fn element_date(el: &Element) -> Result<NaiveDate> {
    match &el.value {
        ElementValue::Date(s) => parse_date(s),
        ElementValue::Datetime(s) => Ok(parse_datetime(s)?.date()),
        other => Err(RefDataError::decode(format!(
            "{} is {}, expected DATE",
            el.name,
            other.datatype()
        ))),
    }
}

/// Instant of a DATE or DATETIME element, used for map keys.
pub fn element_datetime(el: &Element) -> Result<NaiveDateTime> {
    match &el.value {
        ElementValue::Datetime(s) => parse_datetime(s),
        ElementValue::Date(s) => Ok(parse_date(s)?.and_time(NaiveTime::MIN)),
        other => Err(RefDataError::decode(format!(
            "{} is {}, expected DATETIME",
            el.name,
            other.datatype()
        ))),
    }
}

fn legacy_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    let t = s.trim();
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(t, "%Y%m%d"))
        .map_err(|e| RefDataError::decode(format!("bad DATE {t:?}: {e}")))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let t = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    // Offset-qualified values are normalized to UTC.
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(dt.naive_utc());
    }
    // Some DATETIME fields only carry the date part.
    parse_date(t)
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| RefDataError::decode(format!("bad DATETIME {t:?}")))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    let t = s.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .map_err(|e| RefDataError::decode(format!("bad TIME {t:?}: {e}")))
}
