use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::components::{ConstructionModelTable, Ref};
use crate::identifier::Identifier;
use crate::model::{BuiltinDefinition, ModelDefinition};

/// Namespace holding the built-in models. User declarations may not live in it.
pub const BUILTIN_NAMESPACE: &str = "ks";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Uuid,
    Void,
    Array,
    Map,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 16] = [
        Self::Bool,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::String,
        Self::Uuid,
        Self::Void,
        Self::Array,
        Self::Map,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Uuid => "uuid",
            Self::Void => "void",
            Self::Array => "array",
            Self::Map => "map",
        }
    }

    /// Number of type arguments the builtin takes.
    pub fn arity(self) -> usize {
        match self {
            Self::Array => 1,
            Self::Map => 2,
            _ => 0,
        }
    }

    pub fn identifier(self) -> Identifier {
        Identifier::new(BUILTIN_NAMESPACE, self.name())
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }
}

lazy_static! {
    /// Builtin names and aliases, both resolving to the builtin they denote.
    static ref BUILTINS_BY_NAME: HashMap<&'static str, BuiltinKind> = {
        let mut names: HashMap<&'static str, BuiltinKind> =
            BuiltinKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect();
        names.extend(ALIASES.iter().copied());
        names
    };
}

const ALIASES: [(&str, BuiltinKind); 11] = [
    ("byte", BuiltinKind::UInt8),
    ("sbyte", BuiltinKind::Int8),
    ("short", BuiltinKind::Int16),
    ("ushort", BuiltinKind::UInt16),
    ("int", BuiltinKind::Int32),
    ("uint", BuiltinKind::UInt32),
    ("long", BuiltinKind::Int64),
    ("ulong", BuiltinKind::UInt64),
    ("float", BuiltinKind::Float32),
    ("double", BuiltinKind::Float64),
    ("guid", BuiltinKind::Uuid),
];

/// Looks up an unqualified builtin name or alias.
pub fn lookup_builtin(name: &str) -> Option<BuiltinKind> {
    BUILTINS_BY_NAME.get(name).copied()
}

/// Creates one definition per builtin in `table`.
pub(crate) fn register_builtins(
    table: &mut ConstructionModelTable,
) -> HashMap<BuiltinKind, Ref<ModelDefinition>> {
    BuiltinKind::ALL
        .iter()
        .map(|&kind| {
            let definition = table.create(ModelDefinition::Builtin(BuiltinDefinition {
                identifier: kind.identifier(),
                kind,
            }));
            (kind, definition)
        })
        .collect()
}
