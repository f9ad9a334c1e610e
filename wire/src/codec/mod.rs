//! Codecs for every shape of model.
//!
//! A codec is built once per [`ConcreteType`](crate::ConcreteType) by the
//! [`CodecRegistry`](crate::CodecRegistry) and shared afterwards; composite codecs hold the codecs
//! of their components.

mod composite;
mod primitive;
mod record;
mod union;

use std::fmt;

use async_trait::async_trait;

pub use composite::{ArrayCodec, MapCodec};
pub use primitive::{BytesCodec, PrimitiveCodec, StringCodec};
pub use record::{RecordCodec, RecordField};
pub use union::{UnionCodec, UnionVariant};

use crate::error::{Result, WireError};
use crate::kind::WireKind;
use crate::stream::{WireRead, WireWrite};
use crate::value::Value;
use crate::varint::{read_varint, write_varint};

#[async_trait]
pub trait Codec: Send + Sync + fmt::Debug {
    /// How a field of this type is laid out inside a record.
    fn kind(&self) -> WireKind;

    fn default_value(&self) -> &Value;

    async fn encode(&self, value: &Value, out: &mut dyn WireWrite) -> Result<()>;

    async fn decode(&self, input: &mut dyn WireRead) -> Result<Value>;
}

pub(crate) async fn write_length_prefixed(out: &mut dyn WireWrite, bytes: &[u8]) -> Result<()> {
    write_varint(out, bytes.len() as u64).await?;
    out.write_all(bytes).await
}

pub(crate) async fn read_length_prefixed(input: &mut dyn WireRead) -> Result<Vec<u8>> {
    let length = read_varint(input).await?;
    let length = usize::try_from(length).map_err(|_| WireError::NumberOutOfRange {
        target: "a region length",
    })?;
    input.read_exact(length).await
}
