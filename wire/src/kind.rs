use ks_schema::BuiltinKind;

use crate::error::{Result, WireError};
use crate::stream::{SubStream, WireRead};
use crate::varint::read_varint;

/// The 3-bit code in a field tag saying how the field's bytes are laid out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireKind {
    Varint = 0,
    LengthPrefixed = 1,
    Fixed32 = 2,
    Fixed64 = 3,
    Fixed128 = 4,
}

const KIND_BITS: u32 = 3;
const KIND_MASK: u64 = (1 << KIND_BITS) - 1;

impl TryFrom<u8> for WireKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Varint),
            1 => Ok(Self::LengthPrefixed),
            2 => Ok(Self::Fixed32),
            3 => Ok(Self::Fixed64),
            4 => Ok(Self::Fixed128),
            other => Err(WireError::InvalidWireKind(other)),
        }
    }
}

impl WireKind {
    pub fn of_builtin(kind: BuiltinKind) -> Self {
        match kind {
            BuiltinKind::Float32 => Self::Fixed32,
            BuiltinKind::Float64 => Self::Fixed64,
            BuiltinKind::Uuid => Self::Fixed128,
            BuiltinKind::String | BuiltinKind::Array | BuiltinKind::Map => Self::LengthPrefixed,
            // bool, integers, and void, which is never written as a field
            _ => Self::Varint,
        }
    }

    /// `(id << 3) | kind`
    pub fn field_tag(self, id: u32) -> u64 {
        (u64::from(id) << KIND_BITS) | self as u64
    }

    /// Splits a field tag into field id and kind. Ids beyond `u32` are kept so that the field can
    /// still be skipped.
    pub fn split_field_tag(tag: u64) -> Result<(u64, Self)> {
        let kind = Self::try_from((tag & KIND_MASK) as u8)?;
        Ok((tag >> KIND_BITS, kind))
    }

    /// Consumes one value of this kind without interpreting it.
    pub async fn skip(self, input: &mut dyn WireRead) -> Result<()> {
        match self {
            Self::Varint => {
                read_varint(input).await?;
            }
            Self::LengthPrefixed => {
                SubStream::read_region(input).await?;
            }
            Self::Fixed32 => {
                input.read_exact(4).await?;
            }
            Self::Fixed64 => {
                input.read_exact(8).await?;
            }
            Self::Fixed128 => {
                input.read_exact(16).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;

    #[test]
    fn field_tags_pack_id_and_kind() {
        assert_eq!(WireKind::Varint.field_tag(1), 8);
        assert_eq!(WireKind::Fixed128.field_tag(1), 12);
        assert_eq!(
            WireKind::split_field_tag(WireKind::LengthPrefixed.field_tag(300)).unwrap(),
            (300, WireKind::LengthPrefixed)
        );
        assert!(matches!(
            WireKind::split_field_tag(0b1111),
            Err(WireError::InvalidWireKind(7))
        ));
    }

    #[tokio::test]
    async fn skips_each_kind() {
        let bytes = vec![
            0x01, 0x82, // varint 257
            0x82, 0xaa, 0xbb, // two length-prefixed bytes
            1, 2, 3, 4, // fixed 32
            9,
        ];
        let mut input = SubStream::new(bytes, CancellationToken::new());
        WireKind::Varint.skip(&mut input).await.unwrap();
        WireKind::LengthPrefixed.skip(&mut input).await.unwrap();
        WireKind::Fixed32.skip(&mut input).await.unwrap();
        assert_eq!(input.read_u8().await.unwrap(), 9);
    }
}
