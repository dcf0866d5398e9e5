//! Vendor-side message model.
//!
//! These types mirror the gateway's dynamically typed element tree: every node
//! carries its name and its declared datatype, and the decoder inspects them
//! by name. They are inputs to [`crate::decode`] only; results handed back to
//! callers never contain them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Response,
    PartialResponse,
    SessionStatus,
    ServiceStatus,
    RequestStatus,
    Timeout,
    Admin,
    #[serde(other)]
    Other,
}

impl EventKind {
    pub fn is_response(self) -> bool {
        matches!(self, Self::Response | Self::PartialResponse)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Response
    }
}

/// One unit of server-pushed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub kind: EventKind,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl EventBatch {
    pub fn new(kind: EventKind, messages: Vec<Message>) -> Self {
        Self { kind, messages }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: String,
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default)]
    pub body: Vec<Element>,
}

impl Message {
    pub fn new(message_type: impl Into<String>, body: Vec<Element>) -> Self {
        Self {
            message_type: message_type.into(),
            correlation_id: None,
            body,
        }
    }

    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Element> {
        self.body.iter().find(|e| e.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub value: ElementValue,
}

impl Element {
    pub fn new(name: impl Into<String>, value: ElementValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Child element by name. `None` unless this element is a sequence or choice.
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.value.get(name)
    }

    pub fn children(&self) -> &[Element] {
        self.value.children()
    }

    /// Values of an array element; a non-array element is its own single value.
    pub fn values(&self) -> &[ElementValue] {
        match &self.value {
            ElementValue::Array(values) => values.as_slice(),
            other => std::slice::from_ref(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn datatype(&self) -> WireType {
        self.value.datatype()
    }
}

/// Declared datatype of a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireType {
    Bool,
    Char,
    Byte,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    #[serde(rename = "BYTEARRAY")]
    ByteArray,
    Decimal,
    Date,
    Time,
    Datetime,
    Enumeration,
    Sequence,
    Choice,
    Array,
}

impl WireType {
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Datetime | Self::Time)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bool => "BOOL",
            Self::Char => "CHAR",
            Self::Byte => "BYTE",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
            Self::String => "STRING",
            Self::ByteArray => "BYTEARRAY",
            Self::Decimal => "DECIMAL",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Datetime => "DATETIME",
            Self::Enumeration => "ENUMERATION",
            Self::Sequence => "SEQUENCE",
            Self::Choice => "CHOICE",
            Self::Array => "ARRAY",
        };
        f.write_str(s)
    }
}

/// Wire value tagged with its datatype. Temporal values travel as the
/// gateway's text rendering (`2024-01-31`, `13:30:00`, `2024-01-31T13:30:00`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "datatype", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementValue {
    Bool(bool),
    Char(char),
    Byte(u8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    #[serde(rename = "BYTEARRAY")]
    ByteArray(Vec<u8>),
    Decimal(String),
    Date(String),
    Time(String),
    Datetime(String),
    Enumeration(String),
    Sequence(Vec<Element>),
    Choice(Box<Element>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub fn get(&self, name: &str) -> Option<&Element> {
        match self {
            Self::Sequence(children) => children.iter().find(|e| e.name == name),
            Self::Choice(inner) if inner.name == name => Some(inner.as_ref()),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Element] {
        match self {
            Self::Sequence(children) => children.as_slice(),
            Self::Choice(inner) => std::slice::from_ref(inner.as_ref()),
            _ => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enumeration(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn datatype(&self) -> WireType {
        match self {
            Self::Bool(_) => WireType::Bool,
            Self::Char(_) => WireType::Char,
            Self::Byte(_) => WireType::Byte,
            Self::Int32(_) => WireType::Int32,
            Self::Int64(_) => WireType::Int64,
            Self::Float32(_) => WireType::Float32,
            Self::Float64(_) => WireType::Float64,
            Self::String(_) => WireType::String,
            Self::ByteArray(_) => WireType::ByteArray,
            Self::Decimal(_) => WireType::Decimal,
            Self::Date(_) => WireType::Date,
            Self::Time(_) => WireType::Time,
            Self::Datetime(_) => WireType::Datetime,
            Self::Enumeration(_) => WireType::Enumeration,
            Self::Sequence(_) => WireType::Sequence,
            Self::Choice(_) => WireType::Choice,
            Self::Array(_) => WireType::Array,
        }
    }
}

/// Outbound request as handed to the gateway: named element groups filled by
/// repeated append, plus named scalars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub operation: String,
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub scalars: BTreeMap<String, String>,
}

impl Request {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            groups: BTreeMap::new(),
            scalars: BTreeMap::new(),
        }
    }

    pub fn append(&mut self, group: &str, value: impl Into<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.scalars.insert(name.to_string(), value.into());
    }

    pub fn group(&self, name: &str) -> &[String] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.scalars.get(name).map(String::as_str)
    }
}
