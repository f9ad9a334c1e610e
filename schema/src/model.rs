//! The resolved semantic model handed to emitters and the wire codec.

use std::collections::HashMap;

use crate::builtins::BuiltinKind;
use crate::components::{Component, ComponentTable, ModelTable, Ref};
use crate::identifier::{Identifier, Name};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltinDefinition {
    pub identifier: Identifier,
    pub kind: BuiltinKind,
}

/// A product type. Fields are sorted by id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageDefinition {
    pub identifier: Identifier,
    pub fields: Vec<MessageFieldDefinition>,
    pub used_ids: Vec<u32>,
}

impl MessageDefinition {
    pub fn field(&self, id: u32) -> Option<&MessageFieldDefinition> {
        self.fields
            .binary_search_by_key(&id, |field| field.id)
            .ok()
            .map(|index| &self.fields[index])
    }
}

/// A sum type. Fields are sorted by value; value `0` is the default variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagDefinition {
    pub identifier: Identifier,
    pub fields: Vec<TagFieldDefinition>,
    pub used_ids: Vec<u32>,
}

impl TagDefinition {
    pub fn field(&self, value: u32) -> Option<&TagFieldDefinition> {
        self.fields
            .binary_search_by_key(&value, |field| field.value)
            .ok()
            .map(|index| &self.fields[index])
    }
}

/// A generic declaration. `parameters` are [`ModelReference::TemplateArgument`]s, one per
/// parameter, shared by every use inside the definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateDefinition<D> {
    pub parameters: Vec<Ref<ModelReference>>,
    pub definition: D,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelDefinition {
    Builtin(BuiltinDefinition),
    Message(MessageDefinition),
    MessageTemplate(TemplateDefinition<MessageDefinition>),
    Tag(TagDefinition),
    TagTemplate(TemplateDefinition<TagDefinition>),
}

impl Component for ModelDefinition {
    const DISPLAY_NAME: &'static str = "model definition";
}

impl ModelDefinition {
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Builtin(builtin) => &builtin.identifier,
            Self::Message(message) => &message.identifier,
            Self::MessageTemplate(template) => &template.definition.identifier,
            Self::Tag(tag) => &tag.identifier,
            Self::TagTemplate(template) => &template.definition.identifier,
        }
    }

    /// Number of type arguments a reference to this definition must supply.
    pub fn arity(&self) -> usize {
        match self {
            Self::Builtin(builtin) => builtin.kind.arity(),
            Self::MessageTemplate(template) => template.parameters.len(),
            Self::TagTemplate(template) => template.parameters.len(),
            Self::Message(_) | Self::Tag(_) => 0,
        }
    }

    pub fn parameters(&self) -> &[Ref<ModelReference>] {
        match self {
            Self::MessageTemplate(template) => &template.parameters,
            Self::TagTemplate(template) => &template.parameters,
            _ => &[],
        }
    }

    pub fn builtin_kind(&self) -> Option<BuiltinKind> {
        match self {
            Self::Builtin(builtin) => Some(builtin.kind),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&MessageDefinition> {
        match self {
            Self::Message(message) => Some(message),
            Self::MessageTemplate(template) => Some(&template.definition),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&TagDefinition> {
        match self {
            Self::Tag(tag) => Some(tag),
            Self::TagTemplate(template) => Some(&template.definition),
            _ => None,
        }
    }

    /// Stable name of the variant, used in summaries and the content hash.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Builtin(_) => "builtin",
            Self::Message(_) => "message",
            Self::MessageTemplate(_) => "message template",
            Self::Tag(_) => "tag",
            Self::TagTemplate(_) => "tag template",
        }
    }
}

/// A type usage site. Every field, payload and service type owns its own reference; only
/// template arguments are shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelReference {
    Builtin {
        definition: Ref<ModelDefinition>,
        args: Vec<Ref<ModelReference>>,
    },
    Message {
        definition: Ref<ModelDefinition>,
    },
    MessageTemplate {
        definition: Ref<ModelDefinition>,
        args: Vec<Ref<ModelReference>>,
    },
    Tag {
        definition: Ref<ModelDefinition>,
    },
    TagTemplate {
        definition: Ref<ModelDefinition>,
        args: Vec<Ref<ModelReference>>,
    },
    /// Positional placeholder for the `index`th parameter of the generic `owner`.
    TemplateArgument {
        owner: Ref<ModelDefinition>,
        index: usize,
        name: Name,
    },
}

impl Component for ModelReference {
    const DISPLAY_NAME: &'static str = "model reference";
}

/// What a [`ModelReference`] points at, with template arguments told apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReferenceTarget<'r> {
    Definition {
        definition: Ref<ModelDefinition>,
        args: &'r [Ref<ModelReference>],
    },
    Parameter {
        index: usize,
        name: &'r str,
    },
}

impl ModelReference {
    pub fn target(&self) -> ReferenceTarget<'_> {
        match self {
            Self::Builtin { definition, args }
            | Self::MessageTemplate { definition, args }
            | Self::TagTemplate { definition, args } => ReferenceTarget::Definition {
                definition: *definition,
                args,
            },
            Self::Message { definition } | Self::Tag { definition } => {
                ReferenceTarget::Definition {
                    definition: *definition,
                    args: &[],
                }
            }
            Self::TemplateArgument { index, name, .. } => ReferenceTarget::Parameter {
                index: *index,
                name,
            },
        }
    }

    /// The referenced definition; `None` for template arguments.
    pub fn definition(&self) -> Option<Ref<ModelDefinition>> {
        match self {
            Self::Builtin { definition, .. }
            | Self::Message { definition }
            | Self::MessageTemplate { definition, .. }
            | Self::Tag { definition }
            | Self::TagTemplate { definition, .. } => Some(*definition),
            Self::TemplateArgument { .. } => None,
        }
    }

    pub fn args(&self) -> &[Ref<ModelReference>] {
        match self {
            Self::Builtin { args, .. }
            | Self::MessageTemplate { args, .. }
            | Self::TagTemplate { args, .. } => args,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageFieldDefinition {
    pub type_: Ref<ModelReference>,
    pub name: Name,
    pub id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFieldDefinition {
    pub name: Name,
    pub value: u32,
    pub payload: Option<Ref<ModelReference>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub identifier: Identifier,
    pub input: Ref<ModelReference>,
    pub output: Ref<ModelReference>,
    pub id: u32,
}

impl ModelTable {
    /// Structural equality of two references: same variant, same definition and pairwise
    /// structurally equal arguments. Template arguments match by owner and position.
    pub fn same_shape(&self, a: Ref<ModelReference>, b: Ref<ModelReference>) -> bool {
        if a == b {
            return true;
        }
        match (a.get(self), b.get(self)) {
            (
                ModelReference::TemplateArgument {
                    owner: owner_a,
                    index: index_a,
                    ..
                },
                ModelReference::TemplateArgument {
                    owner: owner_b,
                    index: index_b,
                    ..
                },
            ) => owner_a == owner_b && index_a == index_b,
            (ref_a, ref_b) => {
                std::mem::discriminant(ref_a) == std::mem::discriminant(ref_b)
                    && ref_a.definition() == ref_b.definition()
                    && ref_a.args().len() == ref_b.args().len()
                    && ref_a
                        .args()
                        .iter()
                        .zip(ref_b.args())
                        .all(|(&arg_a, &arg_b)| self.same_shape(arg_a, arg_b))
            }
        }
    }

    /// Renders a reference the way it would be written fully qualified, e.g.
    /// `box.Box<ks.int32>`. Template arguments render as their parameter name.
    pub fn describe(&self, reference: Ref<ModelReference>) -> String {
        let (definition, args) = match reference.get(self).target() {
            ReferenceTarget::Parameter { name, .. } => return name.to_string(),
            ReferenceTarget::Definition { definition, args } => (definition, args),
        };

        let mut description = definition.get(self).identifier().to_string();
        if !args.is_empty() {
            let args: Vec<String> = args
                .iter()
                .map(|&arg| self.describe(arg))
                .collect();
            description.push('<');
            description.push_str(&args.join(", "));
            description.push('>');
        }
        description
    }
}

/// The compiled schema: the terminal artifact of the compiler.
#[derive(Debug)]
pub struct Project {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) content_hash: String,
    pub(crate) models: Vec<Ref<ModelDefinition>>,
    pub(crate) services: Vec<ServiceDefinition>,
    pub(crate) table: ModelTable,
    pub(crate) index: HashMap<Identifier, Ref<ModelDefinition>>,
    pub(crate) builtins: HashMap<BuiltinKind, Ref<ModelDefinition>>,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Lowercase hex SHA-256 of the canonical schema serialization.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// User-declared models, each after everything it depends on.
    pub fn models(&self) -> &[Ref<ModelDefinition>] {
        &self.models
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn table(&self) -> &ModelTable {
        &self.table
    }

    /// Looks up a model (builtins included) by its fully-qualified identifier.
    pub fn model(&self, identifier: &Identifier) -> Option<Ref<ModelDefinition>> {
        self.index.get(identifier).copied()
    }

    pub fn service(&self, id: u32) -> Option<&ServiceDefinition> {
        self.services.iter().find(|service| service.id == id)
    }

    pub fn builtin(&self, kind: BuiltinKind) -> Ref<ModelDefinition> {
        // every builtin is registered before user models
        self.builtins[&kind]
    }

    pub fn definition(&self, ref_: Ref<ModelDefinition>) -> &ModelDefinition {
        self.table.get(ref_)
    }

    pub fn reference(&self, ref_: Ref<ModelReference>) -> &ModelReference {
        self.table.get(ref_)
    }
}
