use std::sync::Arc;

use async_trait::async_trait;
use ks_schema::BuiltinKind;
use uuid::Uuid;

use super::{read_length_prefixed, write_length_prefixed, Codec};
use crate::error::{Result, WireError};
use crate::kind::WireKind;
use crate::stream::{WireRead, WireWrite};
use crate::value::Value;
use crate::varint::{read_varint, write_varint, zigzag_decode, zigzag_encode};

async fn read_array<const N: usize>(input: &mut dyn WireRead) -> Result<[u8; N]> {
    let bytes = input.read_exact(N).await?;
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes);
    Ok(array)
}

fn narrow<T, U>(value: U, target: &'static str) -> Result<T>
where
    T: TryFrom<U>,
{
    T::try_from(value).map_err(|_| WireError::NumberOutOfRange { target })
}

/// Codec for the fixed-shape builtins: `bool`, the integers, the floats, `uuid` and `void`.
#[derive(Debug)]
pub struct PrimitiveCodec {
    kind: BuiltinKind,
    default: Arc<Value>,
}

impl PrimitiveCodec {
    pub fn new(kind: BuiltinKind, default: Arc<Value>) -> Self {
        Self { kind, default }
    }

    fn mismatch(&self, value: &Value) -> WireError {
        WireError::type_mismatch(self.kind.name(), value.type_name())
    }
}

#[async_trait]
impl Codec for PrimitiveCodec {
    fn kind(&self) -> WireKind {
        WireKind::of_builtin(self.kind)
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        match (self.kind, value) {
            (BuiltinKind::Bool, Value::Bool(value)) => write_varint(out, u64::from(*value)).await,
            (BuiltinKind::Int8, Value::Int8(value)) => {
                write_varint(out, zigzag_encode(i64::from(*value))).await
            }
            (BuiltinKind::Int16, Value::Int16(value)) => {
                write_varint(out, zigzag_encode(i64::from(*value))).await
            }
            (BuiltinKind::Int32, Value::Int32(value)) => {
                write_varint(out, zigzag_encode(i64::from(*value))).await
            }
            (BuiltinKind::Int64, Value::Int64(value)) => write_varint(out, zigzag_encode(*value)).await,
            (BuiltinKind::UInt8, Value::UInt8(value)) => write_varint(out, u64::from(*value)).await,
            (BuiltinKind::UInt16, Value::UInt16(value)) => write_varint(out, u64::from(*value)).await,
            (BuiltinKind::UInt32, Value::UInt32(value)) => write_varint(out, u64::from(*value)).await,
            (BuiltinKind::UInt64, Value::UInt64(value)) => write_varint(out, *value).await,
            (BuiltinKind::Float32, Value::Float32(value)) => out.write_all(&value.to_le_bytes()).await,
            (BuiltinKind::Float64, Value::Float64(value)) => out.write_all(&value.to_le_bytes()).await,
            (BuiltinKind::Uuid, Value::Uuid(value)) => out.write_all(value.as_bytes()).await,
            (BuiltinKind::Void, Value::Void) => Ok(()),
            (_, value) => Err(self.mismatch(value)),
        }
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        let value = match self.kind {
            BuiltinKind::Bool => match read_varint(input).await? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(WireError::InvalidBoolValue(other)),
            },
            BuiltinKind::Int8 => Value::Int8(narrow(zigzag_decode(read_varint(input).await?), "int8")?),
            BuiltinKind::Int16 => {
                Value::Int16(narrow(zigzag_decode(read_varint(input).await?), "int16")?)
            }
            BuiltinKind::Int32 => {
                Value::Int32(narrow(zigzag_decode(read_varint(input).await?), "int32")?)
            }
            BuiltinKind::Int64 => Value::Int64(zigzag_decode(read_varint(input).await?)),
            BuiltinKind::UInt8 => Value::UInt8(narrow(read_varint(input).await?, "uint8")?),
            BuiltinKind::UInt16 => Value::UInt16(narrow(read_varint(input).await?, "uint16")?),
            BuiltinKind::UInt32 => Value::UInt32(narrow(read_varint(input).await?, "uint32")?),
            BuiltinKind::UInt64 => Value::UInt64(read_varint(input).await?),
            BuiltinKind::Float32 => Value::Float32(f32::from_le_bytes(read_array(input).await?)),
            BuiltinKind::Float64 => Value::Float64(f64::from_le_bytes(read_array(input).await?)),
            BuiltinKind::Uuid => Value::Uuid(Uuid::from_bytes(read_array(input).await?)),
            BuiltinKind::Void => Value::Void,
            BuiltinKind::String | BuiltinKind::Array | BuiltinKind::Map => {
                return Err(WireError::type_mismatch(
                    "a fixed-shape builtin",
                    self.kind.name(),
                ))
            }
        };
        Ok(value)
    }
}

/// `array<uint8>`: a varint length followed by the raw bytes.
#[derive(Debug)]
pub struct BytesCodec {
    default: Arc<Value>,
}

impl BytesCodec {
    pub fn new(default: Arc<Value>) -> Self {
        Self { default }
    }
}

#[async_trait]
impl Codec for BytesCodec {
    fn kind(&self) -> WireKind {
        WireKind::LengthPrefixed
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        match value {
            Value::Bytes(bytes) => write_length_prefixed(out, bytes).await,
            other => Err(WireError::type_mismatch("bytes", other.type_name())),
        }
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        Ok(Value::Bytes(read_length_prefixed(input).await?))
    }
}

/// UTF-8 text through the byte codec.
#[derive(Debug)]
pub struct StringCodec {
    default: Arc<Value>,
}

impl StringCodec {
    pub fn new(default: Arc<Value>) -> Self {
        Self { default }
    }
}

#[async_trait]
impl Codec for StringCodec {
    fn kind(&self) -> WireKind {
        WireKind::LengthPrefixed
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        match value {
            Value::String(text) => write_length_prefixed(out, text.as_bytes()).await,
            other => Err(WireError::type_mismatch("string", other.type_name())),
        }
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        let bytes = read_length_prefixed(input).await?;
        Ok(Value::String(String::from_utf8(bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::stream::SubStream;

    fn primitive(kind: BuiltinKind, default: Value) -> PrimitiveCodec {
        PrimitiveCodec::new(kind, Arc::new(default))
    }

    async fn encode(codec: &dyn Codec, value: Value) -> Vec<u8> {
        let mut out = Vec::new();
        codec.encode(&value, &mut out).await.unwrap();
        out
    }

    async fn decode(codec: &dyn Codec, bytes: Vec<u8>) -> Result<Value> {
        codec
            .decode(&mut SubStream::new(bytes, CancellationToken::new()))
            .await
    }

    #[tokio::test]
    async fn integers_use_zigzag_only_when_signed() {
        let int32 = primitive(BuiltinKind::Int32, Value::Int32(0));
        assert_eq!(encode(&int32, Value::Int32(0)).await, vec![0x80]);
        assert_eq!(encode(&int32, Value::Int32(-1)).await, vec![0x81]);
        assert_eq!(encode(&int32, Value::Int32(5)).await, vec![0x8a]);

        let uint32 = primitive(BuiltinKind::UInt32, Value::UInt32(0));
        assert_eq!(encode(&uint32, Value::UInt32(5)).await, vec![0x85]);
    }

    #[tokio::test]
    async fn narrow_integers_are_range_checked() {
        let uint8 = primitive(BuiltinKind::UInt8, Value::UInt8(0));
        assert_eq!(decode(&uint8, vec![0xff]).await.unwrap(), Value::UInt8(127));
        assert!(matches!(
            decode(&uint8, vec![0x00, 0x82]).await,
            Err(WireError::NumberOutOfRange { target: "uint8" })
        ));

        let int8 = primitive(BuiltinKind::Int8, Value::Int8(0));
        // zigzag 256 is 128
        assert!(matches!(
            decode(&int8, vec![0x00, 0x82]).await,
            Err(WireError::NumberOutOfRange { target: "int8" })
        ));
    }

    #[tokio::test]
    async fn bools_accept_only_zero_and_one() {
        let bool_ = primitive(BuiltinKind::Bool, Value::Bool(false));
        assert_eq!(encode(&bool_, Value::Bool(true)).await, vec![0x81]);
        assert_eq!(decode(&bool_, vec![0x80]).await.unwrap(), Value::Bool(false));
        assert!(matches!(
            decode(&bool_, vec![0x82]).await,
            Err(WireError::InvalidBoolValue(2))
        ));
    }

    #[tokio::test]
    async fn fixed_width_values_are_raw_little_endian() {
        let float32 = primitive(BuiltinKind::Float32, Value::Float32(0.0));
        assert_eq!(
            encode(&float32, Value::Float32(1.0)).await,
            1.0f32.to_le_bytes().to_vec()
        );

        let uuid = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let codec = primitive(BuiltinKind::Uuid, Value::Uuid(Uuid::nil()));
        let bytes = encode(&codec, Value::Uuid(uuid)).await;
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[15], 0xff);
        assert_eq!(decode(&codec, bytes).await.unwrap(), Value::Uuid(uuid));
    }

    #[tokio::test]
    async fn void_occupies_no_bytes() {
        let void = primitive(BuiltinKind::Void, Value::Void);
        assert!(encode(&void, Value::Void).await.is_empty());
        assert_eq!(decode(&void, Vec::new()).await.unwrap(), Value::Void);
    }

    #[tokio::test]
    async fn rejects_values_of_another_type() {
        let int32 = primitive(BuiltinKind::Int32, Value::Int32(0));
        let error = int32
            .encode(&Value::Int64(1), &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "expected int32, found int64");
    }

    #[tokio::test]
    async fn strings_are_length_prefixed_utf8() {
        let codec = StringCodec::new(Arc::new(Value::String(String::new())));
        assert_eq!(
            encode(&codec, Value::String("hi".into())).await,
            vec![0x82, b'h', b'i']
        );
        assert!(matches!(
            decode(&codec, vec![0x81, 0xff]).await,
            Err(WireError::InvalidUtf8(_))
        ));
    }

    #[tokio::test]
    async fn bytes_round_trip() {
        let codec = BytesCodec::new(Arc::new(Value::Bytes(Vec::new())));
        let bytes = encode(&codec, Value::Bytes(vec![1, 2, 3])).await;
        assert_eq!(bytes, vec![0x83, 1, 2, 3]);
        assert_eq!(
            decode(&codec, bytes).await.unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }
}
