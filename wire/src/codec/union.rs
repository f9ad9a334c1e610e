use std::sync::Arc;

use async_trait::async_trait;

use super::{write_length_prefixed, Codec};
use crate::error::{Result, WireError};
use crate::kind::WireKind;
use crate::stream::{Next, SubStream, WireRead, WireWrite};
use crate::value::{TagValue, Value};
use crate::varint::{read_varint, write_varint};

#[derive(Debug)]
pub struct UnionVariant {
    pub value: u32,
    pub name: String,
    pub payload: Option<Arc<dyn Codec>>,
}

/// Codec of a tag: the variant value, then its payload if it declares one, in one
/// length-prefixed region.
#[derive(Debug)]
pub struct UnionCodec {
    name: String,
    default: Arc<Value>,
    variants: Vec<UnionVariant>,
}

impl UnionCodec {
    /// `variants` must be sorted by value.
    pub fn new(name: String, default: Arc<Value>, variants: Vec<UnionVariant>) -> Self {
        debug_assert!(variants.windows(2).all(|pair| pair[0].value < pair[1].value));
        Self {
            name,
            default,
            variants,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[UnionVariant] {
        &self.variants
    }

    fn variant(&self, value: u32) -> Option<&UnionVariant> {
        self.variants
            .binary_search_by_key(&value, |variant| variant.value)
            .ok()
            .map(|index| &self.variants[index])
    }

    fn invalid_value(&self, value: u64) -> WireError {
        WireError::InvalidTagValue {
            tag: self.name.clone(),
            value,
        }
    }
}

#[async_trait]
impl Codec for UnionCodec {
    fn kind(&self) -> WireKind {
        WireKind::LengthPrefixed
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        let tag = match value {
            Value::Tag(tag) => tag,
            other => return Err(WireError::type_mismatch(&self.name, other.type_name())),
        };
        if value == self.default.as_ref() {
            return write_varint(out, 0).await;
        }
        let variant = self
            .variant(tag.value)
            .ok_or_else(|| self.invalid_value(u64::from(tag.value)))?;

        // a missing payload stands for the payload's default
        let payload = match (&variant.payload, &tag.payload) {
            (Some(codec), Some(payload)) => Some((codec, payload.as_ref())),
            (Some(codec), None) => Some((codec, codec.default_value())),
            (None, None) => None,
            (None, Some(payload)) => {
                return Err(WireError::type_mismatch(
                    format!("{}.{} without payload", self.name, variant.name),
                    payload.type_name(),
                ))
            }
        };
        let is_default = tag.value == 0
            && payload.map_or(true, |(codec, payload)| payload == codec.default_value());
        if is_default {
            return write_varint(out, 0).await;
        }

        let mut scratch = Vec::new();
        write_varint(&mut scratch, u64::from(tag.value)).await?;
        if let Some((codec, payload)) = payload {
            codec.encode(payload, &mut scratch).await?;
        }
        write_length_prefixed(out, &scratch).await
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        let mut region = SubStream::read_region(input).await?;
        if region.peek() == Next::EndOfSubStream {
            return Ok(self.default.as_ref().clone());
        }

        let value = read_varint(&mut region).await?;
        let variant = u32::try_from(value)
            .ok()
            .and_then(|value| self.variant(value));
        let Some(variant) = variant else {
            return if value == 0 {
                Ok(self.default.as_ref().clone())
            } else {
                Err(self.invalid_value(value))
            };
        };

        let payload = match &variant.payload {
            Some(codec) if region.peek() == Next::More => {
                Some(Box::new(codec.decode(&mut region).await?))
            }
            Some(codec) => Some(Box::new(codec.default_value().clone())),
            None => None,
        };
        Ok(Value::Tag(TagValue {
            value: variant.value,
            payload,
        }))
    }
}
