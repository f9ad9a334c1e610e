use ks_schema::{BuiltinKind, ModelDefinition, TemplateDefinition};
use tracing::trace;
use uuid::Uuid;

use crate::registry::CodecRegistry;
use crate::types::ConcreteType;
use crate::value::{MessageValue, TagValue, Value};

fn builtin_default(kind: BuiltinKind) -> Value {
    match kind {
        BuiltinKind::Bool => Value::Bool(false),
        BuiltinKind::Int8 => Value::Int8(0),
        BuiltinKind::Int16 => Value::Int16(0),
        BuiltinKind::Int32 => Value::Int32(0),
        BuiltinKind::Int64 => Value::Int64(0),
        BuiltinKind::UInt8 => Value::UInt8(0),
        BuiltinKind::UInt16 => Value::UInt16(0),
        BuiltinKind::UInt32 => Value::UInt32(0),
        BuiltinKind::UInt64 => Value::UInt64(0),
        BuiltinKind::Float32 => Value::Float32(0.0),
        BuiltinKind::Float64 => Value::Float64(0.0),
        BuiltinKind::String => Value::String(String::new()),
        BuiltinKind::Uuid => Value::Uuid(Uuid::nil()),
        BuiltinKind::Void => Value::Void,
        BuiltinKind::Array => Value::Array(Vec::new()),
        BuiltinKind::Map => Value::Map(Vec::new()),
    }
}

impl CodecRegistry {
    /// Zero for numbers, empty for text and composites, a record of field defaults for messages and
    /// variant `0` for tags.
    pub(crate) fn build_default(&self, ty: &ConcreteType) -> Value {
        trace!(ty = %self.describe(ty), "building default value");
        let args = ty.args();
        match self.project().definition(ty.definition()) {
            ModelDefinition::Builtin(builtin) => match builtin.kind {
                BuiltinKind::Array
                    if self.project().definition(args[0].definition()).builtin_kind()
                        == Some(BuiltinKind::UInt8) =>
                {
                    Value::Bytes(Vec::new())
                }
                kind => builtin_default(kind),
            },
            ModelDefinition::Message(message)
            | ModelDefinition::MessageTemplate(TemplateDefinition {
                definition: message,
                ..
            }) => {
                let mut value = MessageValue::new();
                for field in &message.fields {
                    let field_type = self.instantiate(field.type_, args);
                    value.set(field.id, self.default_value(&field_type).as_ref().clone());
                }
                Value::Message(value)
            }
            ModelDefinition::Tag(tag)
            | ModelDefinition::TagTemplate(TemplateDefinition {
                definition: tag, ..
            }) => {
                let payload = tag
                    .field(0)
                    .and_then(|variant| variant.payload)
                    .map(|payload| {
                        let payload_type = self.instantiate(payload, args);
                        Box::new(self.default_value(&payload_type).as_ref().clone())
                    });
                Value::Tag(TagValue { value: 0, payload })
            }
        }
    }
}
