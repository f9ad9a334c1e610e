//! Binary wire format for models compiled by `ks-schema`.
//!
//! Codecs are built from a [`Project`](ks_schema::Project) at runtime, one per
//! [`ConcreteType`], and operate on async byte streams that honor a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod codec;
pub mod error;
pub mod kind;
pub mod stream;
pub mod types;
pub mod value;
pub mod varint;

mod defaults;
mod registry;

pub use codec::Codec;
pub use error::{Result, WireError};
pub use kind::WireKind;
pub use registry::CodecRegistry;
pub use stream::{Next, StreamReader, StreamWriter, SubStream, WireRead, WireWrite};
pub use types::ConcreteType;
pub use value::{MessageValue, TagValue, Value};
