use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{write_length_prefixed, Codec};
use crate::error::{Result, WireError};
use crate::kind::WireKind;
use crate::stream::{Next, SubStream, WireRead, WireWrite};
use crate::value::Value;
use crate::varint::{read_varint, write_varint};

#[derive(Debug)]
pub struct RecordField {
    pub id: u32,
    pub name: String,
    pub codec: Arc<dyn Codec>,
}

/// Codec of a message: tagged fields in one length-prefixed region.
///
/// Fields equal to their default are left out; a value equal to the message default is the empty
/// region, i.e. the single byte `0x80`.
#[derive(Debug)]
pub struct RecordCodec {
    name: String,
    default: Arc<Value>,
    fields: Vec<RecordField>,
}

impl RecordCodec {
    /// `fields` must be sorted by id.
    pub fn new(name: String, default: Arc<Value>, fields: Vec<RecordField>) -> Self {
        debug_assert!(fields.windows(2).all(|pair| pair[0].id < pair[1].id));
        Self {
            name,
            default,
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    fn field(&self, id: u32) -> Option<&RecordField> {
        self.fields
            .binary_search_by_key(&id, |field| field.id)
            .ok()
            .map(|index| &self.fields[index])
    }
}

#[async_trait]
impl Codec for RecordCodec {
    fn kind(&self) -> WireKind {
        WireKind::LengthPrefixed
    }

    fn default_value(&self) -> &Value {
        &self.default
    }

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()> {
        let message = match value {
            Value::Message(message) => message,
            other => return Err(WireError::type_mismatch(&self.name, other.type_name())),
        };
        if let Some(&id) = message.fields.keys().find(|&&id| self.field(id).is_none()) {
            return Err(WireError::type_mismatch(
                format!("a field of {}", self.name),
                format!("field id {id}"),
            ));
        }
        if value == self.default.as_ref() {
            return write_varint(out, 0).await;
        }

        let mut scratch = Vec::new();
        for field in &self.fields {
            let Some(value) = message.get(field.id) else {
                continue;
            };
            if value == field.codec.default_value() {
                continue;
            }
            write_varint(&mut scratch, field.codec.kind().field_tag(field.id)).await?;
            field.codec.encode(value, &mut scratch).await?;
        }
        write_length_prefixed(out, &scratch).await
    }

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value> {
        let mut region = SubStream::read_region(input).await?;
        let mut message = match self.default.as_ref() {
            Value::Message(message) => message.clone(),
            other => return Err(WireError::type_mismatch(&self.name, other.type_name())),
        };

        while region.peek() == Next::More {
            let (id, kind) = WireKind::split_field_tag(read_varint(&mut region).await?)?;
            let field = u32::try_from(id).ok().and_then(|id| self.field(id));
            let Some(field) = field else {
                warn!(model = %self.name, field = id, ?kind, "skipping unknown field");
                kind.skip(&mut region).await?;
                continue;
            };

            let expected = field.codec.kind();
            if kind != expected {
                return Err(WireError::UnexpectedWireKind {
                    model: self.name.clone(),
                    field: field.id,
                    expected,
                    found: kind,
                });
            }
            message.set(field.id, field.codec.decode(&mut region).await?);
        }
        Ok(Value::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use ks_schema::BuiltinKind;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::codec::{PrimitiveCodec, StringCodec};
    use crate::value::MessageValue;

    /// `message Person { int32 age = 1; string name = 2; }`
    fn person() -> RecordCodec {
        let default = MessageValue::new()
            .with(1, Value::Int32(0))
            .with(2, Value::String(String::new()));
        RecordCodec::new(
            "Person".into(),
            Arc::new(default.into()),
            vec![
                RecordField {
                    id: 1,
                    name: "age".into(),
                    codec: Arc::new(PrimitiveCodec::new(
                        BuiltinKind::Int32,
                        Arc::new(Value::Int32(0)),
                    )),
                },
                RecordField {
                    id: 2,
                    name: "name".into(),
                    codec: Arc::new(StringCodec::new(Arc::new(Value::String(String::new())))),
                },
            ],
        )
    }

    async fn encode(codec: &RecordCodec, value: Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        codec.encode(&value, &mut out).await?;
        Ok(out)
    }

    async fn decode(codec: &RecordCodec, bytes: Vec<u8>) -> Result<Value> {
        codec
            .decode(&mut SubStream::new(bytes, CancellationToken::new()))
            .await
    }

    #[tokio::test]
    async fn default_record_is_a_single_byte() {
        let codec = person();
        let bytes = encode(&codec, codec.default_value().clone()).await.unwrap();
        assert_eq!(bytes, vec![0x80]);
        assert_eq!(&decode(&codec, bytes).await.unwrap(), codec.default_value());
    }

    #[tokio::test]
    async fn writes_only_non_default_fields() {
        let codec = person();
        let value = MessageValue::new()
            .with(1, Value::Int32(0))
            .with(2, Value::String("Al".into()));
        let bytes = encode(&codec, value.clone().into()).await.unwrap();
        // tag (2 << 3 | 1) = 17
        assert_eq!(bytes, vec![0x84, 0x91, 0x82, b'A', b'l']);
        assert_eq!(decode(&codec, bytes).await.unwrap(), Value::from(value));
    }

    #[tokio::test]
    async fn missing_fields_decode_as_defaults() {
        let codec = person();
        let partial = MessageValue::new().with(1, Value::Int32(3));
        let bytes = encode(&codec, partial.into()).await.unwrap();
        let decoded = decode(&codec, bytes).await.unwrap();
        let message = decoded.as_message().unwrap();
        assert_eq!(message.get(1), Some(&Value::Int32(3)));
        assert_eq!(message.get(2), Some(&Value::String(String::new())));
    }

    #[tokio::test]
    async fn skips_unknown_fields() {
        let codec = person();
        let bytes = vec![
            0x8b, // 11 bytes follow
            0xa9, 0x82, 0xaa, 0xbb, // field 5, length-prefixed
            0x88, 0x8e, // field 1 = 7
            0xb2, 1, 2, 3, 4, // field 6, fixed 32
        ];
        let decoded = decode(&codec, bytes).await.unwrap();
        let expected = MessageValue::new()
            .with(1, Value::Int32(7))
            .with(2, Value::String(String::new()));
        assert_eq!(decoded, Value::from(expected));
    }

    #[tokio::test]
    async fn rejects_a_known_field_with_another_kind() {
        let codec = person();
        // field 1 announced as length-prefixed
        let bytes = vec![0x83, 0x89, 0x81, 0x00];
        assert!(matches!(
            decode(&codec, bytes).await,
            Err(WireError::UnexpectedWireKind {
                field: 1,
                expected: WireKind::Varint,
                found: WireKind::LengthPrefixed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn rejects_undeclared_field_ids() {
        let codec = person();
        let value = MessageValue::new().with(9, Value::Int32(1));
        assert!(matches!(
            encode(&codec, value.into()).await,
            Err(WireError::TypeMismatch { .. })
        ));
    }
}
