use std::collections::BTreeMap;

use uuid::Uuid;

/// A dynamically typed instance of a compiled model.
///
/// Floats compare by bit pattern, so `NaN` equals itself and `0.0` differs from `-0.0`; this is
/// the equality default elision is decided by.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Uuid(Uuid),
    Void,
    /// `array<uint8>`
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// `map<K, V>` in wire order.
    Map(Vec<(Value, Value)>),
    Message(MessageValue),
    Tag(TagValue),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt8(a), Self::UInt8(b)) => a == b,
            (Self::UInt16(a), Self::UInt16(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Void, Self::Void) => true,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Message(a), Self::Message(b)) => a == b,
            (Self::Tag(a), Self::Tag(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Short name of the variant for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt8(_) => "uint8",
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::String(_) => "string",
            Self::Uuid(_) => "uuid",
            Self::Void => "void",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Message(_) => "message",
            Self::Tag(_) => "tag",
        }
    }

    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&TagValue> {
        match self {
            Self::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

/// Field values keyed by field id. Missing fields encode as their default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageValue {
    pub fields: BTreeMap<u32, Value>,
}

impl MessageValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: u32, value: Value) -> Self {
        self.fields.insert(id, value);
        self
    }

    pub fn get(&self, id: u32) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn set(&mut self, id: u32, value: Value) {
        self.fields.insert(id, value);
    }
}

impl From<MessageValue> for Value {
    fn from(message: MessageValue) -> Self {
        Self::Message(message)
    }
}

/// The selected variant of a tag and its payload, if the variant declares one.
#[derive(Clone, Debug, PartialEq)]
pub struct TagValue {
    pub value: u32,
    pub payload: Option<Box<Value>>,
}

impl TagValue {
    pub fn unit(value: u32) -> Self {
        Self {
            value,
            payload: None,
        }
    }

    pub fn with_payload(value: u32, payload: Value) -> Self {
        Self {
            value,
            payload: Some(Box::new(payload)),
        }
    }
}

impl From<TagValue> for Value {
    fn from(tag: TagValue) -> Self {
        Self::Tag(tag)
    }
}
