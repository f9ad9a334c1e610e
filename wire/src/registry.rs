use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ks_schema::builtins::lookup_builtin;
use ks_schema::{
    BuiltinKind, Identifier, ModelDefinition, ModelReference, Project, Ref, ReferenceTarget,
    TemplateDefinition,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::codec::{
    ArrayCodec, BytesCodec, Codec, MapCodec, PrimitiveCodec, RecordCodec, RecordField,
    StringCodec, UnionCodec, UnionVariant,
};
use crate::error::{Result, WireError};
use crate::stream::{StreamReader, StreamWriter, SubStream, WireRead, WireWrite};
use crate::types::ConcreteType;
use crate::value::Value;

type Cache<T> = Mutex<HashMap<ConcreteType, Arc<OnceLock<T>>>>;

/// Returns the cell for `key`, inserting an empty one on first use. The map lock is released
/// before the cell is initialized, so building one entry may look up others.
fn cell<T>(cache: &Cache<T>, key: &ConcreteType) -> Arc<OnceLock<T>> {
    let mut cells = cache.lock().unwrap_or_else(PoisonError::into_inner);
    cells.entry(key.clone()).or_default().clone()
}

/// Builds and caches one codec and one default value per concrete type of a compiled project.
///
/// Safe to share between threads; concurrent first uses of a type build its codec exactly once.
#[derive(Debug)]
pub struct CodecRegistry {
    project: Arc<Project>,
    codecs: Cache<Arc<dyn Codec>>,
    defaults: Cache<Arc<Value>>,
}

impl CodecRegistry {
    pub fn new(project: Arc<Project>) -> Self {
        Self {
            project,
            codecs: Mutex::default(),
            defaults: Mutex::default(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Looks up a type by builtin name, alias or fully-qualified identifier and binds `args` to its
    /// parameters.
    pub fn resolve(&self, name: &str, args: Vec<ConcreteType>) -> Result<ConcreteType> {
        let definition = lookup_builtin(name)
            .map(|kind| self.project.builtin(kind))
            .or_else(|| self.project.model(&Identifier::parse(name)))
            .ok_or_else(|| WireError::UnknownType(name.to_string()))?;

        let expected = self.project.definition(definition).arity();
        if expected != args.len() {
            return Err(WireError::ArityMismatch {
                model: name.to_string(),
                expected,
                found: args.len(),
            });
        }
        self.checked(ConcreteType::new(definition, args))
    }

    /// A builtin taking no type arguments.
    ///
    /// # Panics
    ///
    /// If `kind` is `array` or `map`; use [`Self::array`] and [`Self::map`] for those.
    pub fn builtin(&self, kind: BuiltinKind) -> ConcreteType {
        assert_eq!(kind.arity(), 0, "{} takes type arguments", kind.name());
        ConcreteType::new(self.project.builtin(kind), Vec::new())
    }

    pub fn array(&self, element: ConcreteType) -> Result<ConcreteType> {
        self.checked(ConcreteType::new(
            self.project.builtin(BuiltinKind::Array),
            vec![element],
        ))
    }

    pub fn map(&self, key: ConcreteType, value: ConcreteType) -> Result<ConcreteType> {
        self.checked(ConcreteType::new(
            self.project.builtin(BuiltinKind::Map),
            vec![key, value],
        ))
    }

    fn checked(&self, ty: ConcreteType) -> Result<ConcreteType> {
        self.check_void_elements(&ty)?;
        Ok(ty)
    }

    /// `array` and `map` never hold `void`, including through the fields and payloads of a
    /// template bound to `void`. Arguments were checked when they were built.
    fn check_void_elements(&self, ty: &ConcreteType) -> Result<()> {
        let references: Vec<Ref<ModelReference>> = match self.project.definition(ty.definition()) {
            ModelDefinition::Builtin(builtin) => {
                if matches!(builtin.kind, BuiltinKind::Array | BuiltinKind::Map)
                    && ty.args().iter().any(|arg| self.is_kind(arg, BuiltinKind::Void))
                {
                    return Err(WireError::VoidElement(self.describe(ty)));
                }
                Vec::new()
            }
            ModelDefinition::MessageTemplate(template) => template
                .definition
                .fields
                .iter()
                .map(|field| field.type_)
                .collect(),
            ModelDefinition::TagTemplate(template) => template
                .definition
                .fields
                .iter()
                .filter_map(|field| field.payload)
                .collect(),
            ModelDefinition::Message(_) | ModelDefinition::Tag(_) => Vec::new(),
        };
        for reference in references {
            if matches!(
                self.project.reference(reference).target(),
                ReferenceTarget::Definition { .. }
            ) {
                self.check_void_elements(&self.instantiate(reference, ty.args()))?;
            }
        }
        Ok(())
    }

    /// Binds the template arguments in `reference` to `bindings`, the arguments of the type that
    /// owns the reference.
    pub(crate) fn instantiate(
        &self,
        reference: Ref<ModelReference>,
        bindings: &[ConcreteType],
    ) -> ConcreteType {
        match self.project.reference(reference).target() {
            ReferenceTarget::Parameter { index, .. } => bindings[index].clone(),
            ReferenceTarget::Definition { definition, args } => ConcreteType::new(
                definition,
                args.iter()
                    .map(|&arg| self.instantiate(arg, bindings))
                    .collect(),
            ),
        }
    }

    pub fn describe(&self, ty: &ConcreteType) -> String {
        ty.describe(&self.project)
    }

    pub fn codec(&self, ty: &ConcreteType) -> Arc<dyn Codec> {
        cell(&self.codecs, ty)
            .get_or_init(|| self.build_codec(ty))
            .clone()
    }

    /// The value a field of type `ty` holds when it is absent from the wire.
    pub fn default_value(&self, ty: &ConcreteType) -> Arc<Value> {
        cell(&self.defaults, ty)
            .get_or_init(|| Arc::new(self.build_default(ty)))
            .clone()
    }

    fn is_kind(&self, ty: &ConcreteType, kind: BuiltinKind) -> bool {
        self.project.definition(ty.definition()).builtin_kind() == Some(kind)
    }

    fn build_codec(&self, ty: &ConcreteType) -> Arc<dyn Codec> {
        trace!(ty = %self.describe(ty), "building codec");
        let default = self.default_value(ty);
        let args = ty.args();
        match self.project.definition(ty.definition()) {
            ModelDefinition::Builtin(builtin) => match builtin.kind {
                BuiltinKind::String => Arc::new(StringCodec::new(default)),
                BuiltinKind::Array if self.is_kind(&args[0], BuiltinKind::UInt8) => Arc::new(BytesCodec::new(default)),
                BuiltinKind::Array => Arc::new(ArrayCodec::new(self.codec(&args[0]), default)),
                BuiltinKind::Map => Arc::new(MapCodec::new(
                    self.codec(&args[0]),
                    self.codec(&args[1]),
                    default,
                )),
                kind => Arc::new(PrimitiveCodec::new(kind, default)),
            },
            ModelDefinition::Message(message)
            | ModelDefinition::MessageTemplate(TemplateDefinition {
                definition: message,
                ..
            }) => {
                let fields = message
                    .fields
                    .iter()
                    .map(|field| RecordField {
                        id: field.id,
                        name: field.name.clone(),
                        codec: self.codec(&self.instantiate(field.type_, args)),
                    })
                    .collect();
                Arc::new(RecordCodec::new(self.describe(ty), default, fields))
            }
            ModelDefinition::Tag(tag)
            | ModelDefinition::TagTemplate(TemplateDefinition {
                definition: tag, ..
            }) => {
                let variants = tag
                    .fields
                    .iter()
                    .map(|field| UnionVariant {
                        value: field.value,
                        name: field.name.clone(),
                        payload: field
                            .payload
                            .map(|payload| self.codec(&self.instantiate(payload, args))),
                    })
                    .collect();
                Arc::new(UnionCodec::new(self.describe(ty), default, variants))
            }
        }
    }

    pub async fn encode(
        &self,
        ty: &ConcreteType,
        value: &Value,
        out: &mut dyn WireWrite,
    ) -> Result<()> {
        self.codec(ty).encode(value, out).await
    }

    pub async fn decode(&self, ty: &ConcreteType, input: &mut dyn WireRead) -> Result<Value> {
        self.codec(ty).decode(input).await
    }

    pub async fn encode_to_vec(&self, ty: &ConcreteType, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(ty, value, &mut out).await?;
        Ok(out)
    }

    /// Decodes one value from the front of `bytes`; anything after it is ignored.
    pub async fn decode_from_slice(&self, ty: &ConcreteType, bytes: &[u8]) -> Result<Value> {
        let mut input = SubStream::new(bytes.to_vec(), CancellationToken::new());
        self.decode(ty, &mut input).await
    }

    /// Encodes `value` to `writer` and flushes it.
    pub async fn write_to<W>(
        &self,
        ty: &ConcreteType,
        value: &Value,
        writer: &mut W,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut out = StreamWriter::with_cancellation(writer, cancel.clone());
        self.encode(ty, value, &mut out).await?;
        out.flush().await
    }

    pub async fn read_from<R>(
        &self,
        ty: &ConcreteType,
        reader: &mut R,
        cancel: &CancellationToken,
    ) -> Result<Value>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut input = StreamReader::with_cancellation(reader, cancel.clone());
        self.decode(ty, &mut input).await
    }
}
