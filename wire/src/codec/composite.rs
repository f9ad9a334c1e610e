use std::sync::Arc;

use async_trait::async_trait;

use super::{write_length_prefixed, Codec};
use crate::error::{Result, WireError};
use crate::kind::WireKind;
use crate::stream::{Next, SubStream, WireRead, WireWrite};
use crate::value::Value;

const INITIAL_CAPACITY: usize = 4;
const LINEAR_GROWTH_THRESHOLD: usize = 1024;

/// Capacity of the element buffer once `len` elements fill it.
fn grown_capacity(len: usize) -> usize {
    if len == 0 {
        INITIAL_CAPACITY
    } else if len < LINEAR_GROWTH_THRESHOLD {
        len * 2
    } else {
        len + len / 2
    }
}

fn reserve_for_next<T>(buffer: &mut Vec<T>) {
    if buffer.len() == buffer.capacity() {
        let additional = grown_capacity(buffer.len()) - buffer.len();
        buffer.reserve_exact(additional);
    }
}

/// Fails if decoding an element left a non-empty region where it was.
fn ensure_progress(region: &SubStream, before: usize) -> Result<()> {
    if region.position() == before {
        return Err(WireError::type_mismatch(
            "an element occupying bytes",
            format!("{} unread byte(s)", region.remaining()),
        ));
    }
    Ok(())
}

/// `array<T>` for any `T` other than `uint8`.
#[derive(Debug)]
pub struct ArrayCodec {
    element: Arc<dyn Codec>,
    default: Arc<Value>,
}

impl ArrayCodec {
    pub fn new(element: Arc<dyn Codec>, default: Arc<Value>) -> Self {
        Self { element, default }
    }
}

#[async_trait]
impl Codec for ArrayCodec {
    fn kind(&self) -> WireKind {
        WireKind::LengthPrefixed
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        let elements = match value {
            Value::Array(elements) => elements,
            other => return Err(WireError::type_mismatch("array", other.type_name())),
        };
        let mut scratch = Vec::new();
        for element in elements {
            self.element.encode(element, &mut scratch).await?;
        }
        write_length_prefixed(out, &scratch).await
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        let mut region = SubStream::read_region(input).await?;
        let mut elements = Vec::new();
        while region.peek() == Next::More {
            reserve_for_next(&mut elements);
            let before = region.position();
            let element = self.element.decode(&mut region).await?;
            ensure_progress(&region, before)?;
            elements.push(element);
        }
        Ok(Value::Array(elements))
    }
}

/// `map<K, V>`: key/value pairs back to back in one region.
#[derive(Debug)]
pub struct MapCodec {
    key: Arc<dyn Codec>,
    value: Arc<dyn Codec>,
    default: Arc<Value>,
}

impl MapCodec {
    pub fn new(key: Arc<dyn Codec>, value: Arc<dyn Codec>, default: Arc<Value>) -> Self {
        Self {
            key,
            value,
            default,
        }
    }
}

#[async_trait]
impl Codec for MapCodec {
    fn kind(&self) -> WireKind {
        WireKind::LengthPrefixed
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        let entries = match value {
            Value::Map(entries) => entries,
            other => return Err(WireError::type_mismatch("map", other.type_name())),
        };
        let mut scratch = Vec::new();
        for (key, value) in entries {
            self.key.encode(key, &mut scratch).await?;
            self.value.encode(value, &mut scratch).await?;
        }
        write_length_prefixed(out, &scratch).await
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        let mut region = SubStream::read_region(input).await?;
        let mut entries = Vec::new();
        while region.peek() == Next::More {
            reserve_for_next(&mut entries);
            let before = region.position();
            let key = self.key.decode(&mut region).await?;
            let value = self.value.decode(&mut region).await?;
            ensure_progress(&region, before)?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use ks_schema::BuiltinKind;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::codec::{PrimitiveCodec, StringCodec};

    fn int32() -> Arc<dyn Codec> {
        Arc::new(PrimitiveCodec::new(
            BuiltinKind::Int32,
            Arc::new(Value::Int32(0)),
        ))
    }

    fn string() -> Arc<dyn Codec> {
        Arc::new(StringCodec::new(Arc::new(Value::String(String::new()))))
    }

    async fn decode(codec: &dyn Codec, bytes: Vec<u8>) -> Result<Value> {
        codec
            .decode(&mut SubStream::new(bytes, CancellationToken::new()))
            .await
    }

    #[test]
    fn growth_doubles_then_slows_down() {
        assert_eq!(grown_capacity(0), 4);
        assert_eq!(grown_capacity(4), 8);
        assert_eq!(grown_capacity(512), 1024);
        assert_eq!(grown_capacity(1024), 1536);
    }

    #[tokio::test]
    async fn arrays_prefix_byte_length() {
        let codec = ArrayCodec::new(int32(), Arc::new(Value::Array(Vec::new())));
        let value = Value::Array(vec![Value::Int32(1), Value::Int32(-1), Value::Int32(200)]);
        let mut out = Vec::new();
        codec.encode(&value, &mut out).await.unwrap();
        // 200 zigzags to 400, which needs two bytes
        assert_eq!(out, vec![0x84, 0x82, 0x81, 0x10, 0x83]);
        assert_eq!(decode(&codec, out).await.unwrap(), value);
    }

    #[tokio::test]
    async fn long_arrays_survive_growth() {
        let codec = ArrayCodec::new(int32(), Arc::new(Value::Array(Vec::new())));
        let value = Value::Array((0..3000).map(Value::Int32).collect());
        let mut out = Vec::new();
        codec.encode(&value, &mut out).await.unwrap();
        assert_eq!(decode(&codec, out).await.unwrap(), value);
    }

    #[tokio::test]
    async fn empty_region_is_empty_array() {
        let codec = ArrayCodec::new(string(), Arc::new(Value::Array(Vec::new())));
        assert_eq!(
            decode(&codec, vec![0x80]).await.unwrap(),
            Value::Array(Vec::new())
        );
    }

    #[tokio::test]
    async fn zero_width_elements_cannot_fill_a_region() {
        let void: Arc<dyn Codec> =
            Arc::new(PrimitiveCodec::new(BuiltinKind::Void, Arc::new(Value::Void)));
        let codec = ArrayCodec::new(void, Arc::new(Value::Array(Vec::new())));
        assert!(matches!(
            decode(&codec, vec![0x81, 0x00]).await,
            Err(WireError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn maps_keep_entry_order() {
        let codec = MapCodec::new(string(), int32(), Arc::new(Value::Map(Vec::new())));
        let value = Value::Map(vec![
            (Value::String("b".into()), Value::Int32(2)),
            (Value::String("a".into()), Value::Int32(1)),
        ]);
        let mut out = Vec::new();
        codec.encode(&value, &mut out).await.unwrap();
        assert_eq!(out, vec![0x86, 0x81, b'b', 0x84, 0x81, b'a', 0x82]);
        assert_eq!(decode(&codec, out).await.unwrap(), value);
    }

    #[tokio::test]
    async fn truncated_region_is_stream_closed() {
        let codec = ArrayCodec::new(int32(), Arc::new(Value::Array(Vec::new())));
        assert!(matches!(
            decode(&codec, vec![0x83, 0x81]).await,
            Err(WireError::StreamClosed { .. })
        ));
    }
}
