//! Identifier assignment and reference resolution.
//!
//! The first pass gives every declaration its fully-qualified [`Identifier`]; the second turns
//! every written type into a [`ResolvedType`] pointing at a declaration or a template parameter.

use tracing::trace;

use crate::ast::{OptionEntry, OptionValue, SourceFile, Statement, TypeExpression};
use crate::builtins::{lookup_builtin, BuiltinKind, BUILTIN_NAMESPACE};
use crate::declarations::{DeclId, DeclarationSource, DeclarationTable};
use crate::error::{CompileError, Result};
use crate::identifier::{is_within_namespace, join_namespace, parent_namespace, Identifier, Name};

const USED_IDS_OPTION: &str = "used_ids";
const INPUT_OPTION: &str = "input";
const OUTPUT_OPTION: &str = "output";
const ID_OPTION: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ResolvedType {
    Declaration {
        target: DeclId,
        args: Vec<ResolvedType>,
    },
    /// Positional template parameter of the enclosing declaration.
    Parameter { index: usize },
}

impl ResolvedType {
    fn collect_dependencies(&self, dependencies: &mut Vec<DeclId>) {
        if let Self::Declaration { target, args } = self {
            dependencies.push(*target);
            for arg in args {
                arg.collect_dependencies(dependencies);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ResolvedField {
    pub name: Name,
    pub type_: ResolvedType,
    pub id: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct ResolvedTagField {
    pub name: Name,
    pub payload: Option<ResolvedType>,
    pub value: u32,
}

#[derive(Clone, Debug)]
pub(crate) enum ResolvedDeclaration {
    Builtin(BuiltinKind),
    Message {
        template_params: Vec<Name>,
        fields: Vec<ResolvedField>,
        used_ids: Vec<u32>,
    },
    Tag {
        template_params: Vec<Name>,
        fields: Vec<ResolvedTagField>,
        used_ids: Vec<u32>,
    },
    Service {
        input: ResolvedType,
        output: ResolvedType,
        id: u32,
    },
}

impl ResolvedDeclaration {
    /// Declarations that must be built before this one, in field order.
    pub(crate) fn dependencies(&self) -> Vec<DeclId> {
        let mut dependencies = Vec::new();
        match self {
            Self::Builtin(_) => {}
            Self::Message { fields, .. } => {
                for field in fields {
                    field.type_.collect_dependencies(&mut dependencies);
                }
            }
            Self::Tag { fields, .. } => {
                for payload in fields.iter().filter_map(|field| field.payload.as_ref()) {
                    payload.collect_dependencies(&mut dependencies);
                }
            }
            Self::Service { input, output, .. } => {
                input.collect_dependencies(&mut dependencies);
                output.collect_dependencies(&mut dependencies);
            }
        }
        dependencies
    }
}

/// Registers the builtins and every declaration of `files` under its fully-qualified name.
pub(crate) fn collect_declarations(files: &[SourceFile]) -> Result<DeclarationTable<'_>> {
    let mut table = DeclarationTable::new();
    for kind in BuiltinKind::ALL {
        table.insert(kind.identifier(), DeclarationSource::Builtin(kind))?;
    }

    for file in files {
        collect_statements(&mut table, "", &file.statements)?;
    }

    Ok(table)
}

fn collect_statements<'a>(
    table: &mut DeclarationTable<'a>,
    namespace: &str,
    statements: &'a [Statement],
) -> Result<()> {
    // a global namespace statement applies to the rest of the file
    let mut current = namespace.to_string();

    for statement in statements {
        let (name, source) = match statement {
            Statement::Namespace(namespace_statement) => {
                let nested = join_namespace(&current, &namespace_statement.name);
                if is_within_namespace(&nested, BUILTIN_NAMESPACE) {
                    return Err(CompileError::ReservedNamespace { namespace: nested });
                }
                match &namespace_statement.body {
                    Some(body) => collect_statements(table, &nested, body)?,
                    None => current = nested,
                }
                continue;
            }
            Statement::Message(message) => (&message.name, DeclarationSource::Message(message)),
            Statement::Tag(tag) => (&tag.name, DeclarationSource::Tag(tag)),
            Statement::Service(service) => (&service.name, DeclarationSource::Service(service)),
        };

        let identifier = Identifier::new(current.clone(), name.clone());
        trace!(%identifier, "registering declaration");
        table.insert(identifier, source)?;
    }

    Ok(())
}

/// The scope a reference is resolved in. Passed by value so nested resolution cannot leak
/// template bindings into siblings.
#[derive(Copy, Clone)]
struct ResolutionContext<'c> {
    declaration: &'c Identifier,
    namespace: &'c str,
    template_params: &'c [Name],
}

impl<'c> ResolutionContext<'c> {
    fn with_template_params(self, template_params: &'c [Name]) -> Self {
        Self {
            template_params,
            ..self
        }
    }
}

/// Resolves every declaration of `table`; the result is indexed by [`DeclId`].
pub(crate) fn resolve_declarations(table: &DeclarationTable) -> Result<Vec<ResolvedDeclaration>> {
    let resolver = Resolver { table };
    table
        .iter()
        .map(|(_, declaration)| {
            let context = ResolutionContext {
                declaration: &declaration.identifier,
                namespace: &declaration.namespace,
                template_params: &[],
            };
            resolver.resolve_declaration(context, declaration.source)
        })
        .collect()
}

struct Resolver<'t, 'a> {
    table: &'t DeclarationTable<'a>,
}

impl Resolver<'_, '_> {
    fn resolve_declaration(
        &self,
        context: ResolutionContext,
        source: DeclarationSource,
    ) -> Result<ResolvedDeclaration> {
        match source {
            DeclarationSource::Builtin(kind) => Ok(ResolvedDeclaration::Builtin(kind)),
            DeclarationSource::Message(message) => {
                let context = context.with_template_params(&message.template_params);
                let fields = message
                    .fields
                    .iter()
                    .map(|field| {
                        Ok(ResolvedField {
                            name: field.name.clone(),
                            type_: self.resolve_type(context, &field.type_)?,
                            id: field.id,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ResolvedDeclaration::Message {
                    template_params: message.template_params.clone(),
                    fields,
                    used_ids: model_used_ids(context.declaration, &message.options)?,
                })
            }
            DeclarationSource::Tag(tag) => {
                let context = context.with_template_params(&tag.template_params);
                let fields = tag
                    .fields
                    .iter()
                    .map(|field| {
                        Ok(ResolvedTagField {
                            name: field.name.clone(),
                            payload: field
                                .payload
                                .as_ref()
                                .map(|payload| self.resolve_type(context, payload))
                                .transpose()?,
                            value: field.value,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ResolvedDeclaration::Tag {
                    template_params: tag.template_params.clone(),
                    fields,
                    used_ids: model_used_ids(context.declaration, &tag.options)?,
                })
            }
            DeclarationSource::Service(service) => {
                let mut input = None;
                let mut output = None;
                let mut id = None;
                for option in &service.options {
                    let repeated = match option.key.as_str() {
                        INPUT_OPTION => input.is_some(),
                        OUTPUT_OPTION => output.is_some(),
                        ID_OPTION => id.is_some(),
                        _ => false,
                    };
                    if repeated {
                        return Err(invalid_option(context.declaration, option, "a single value"));
                    }
                    match (option.key.as_str(), &option.value) {
                        (INPUT_OPTION, OptionValue::Type(type_)) => {
                            input = Some(self.resolve_type(context, type_)?)
                        }
                        (OUTPUT_OPTION, OptionValue::Type(type_)) => {
                            output = Some(self.resolve_type(context, type_)?)
                        }
                        (ID_OPTION, OptionValue::Integer(value)) => id = Some(*value),
                        (INPUT_OPTION | OUTPUT_OPTION, _) => {
                            return Err(invalid_option(context.declaration, option, "a type"))
                        }
                        (ID_OPTION, _) => {
                            return Err(invalid_option(context.declaration, option, "an integer"))
                        }
                        _ => return Err(unknown_option(context.declaration, option)),
                    }
                }

                let missing = |option: &'static str| CompileError::MissingServiceOption {
                    service: context.declaration.clone(),
                    option,
                };
                Ok(ResolvedDeclaration::Service {
                    input: input.ok_or_else(|| missing(INPUT_OPTION))?,
                    output: output.ok_or_else(|| missing(OUTPUT_OPTION))?,
                    id: id.ok_or_else(|| missing(ID_OPTION))?,
                })
            }
        }
    }

    fn resolve_type(
        &self,
        context: ResolutionContext,
        type_: &TypeExpression,
    ) -> Result<ResolvedType> {
        let reference = Identifier::parse(&type_.name);

        if reference.is_global() {
            if let Some(index) = context
                .template_params
                .iter()
                .position(|param| *param == reference.name)
            {
                if !type_.args.is_empty() {
                    return Err(CompileError::ArityMismatch {
                        context: context.declaration.clone(),
                        reference,
                        expected: 0,
                        found: type_.args.len(),
                    });
                }
                return Ok(ResolvedType::Parameter { index });
            }
        }

        let target = self
            .lookup(context, &reference)
            .ok_or_else(|| CompileError::UnresolvedReference {
                reference: type_.name.clone(),
                context: context.declaration.clone(),
                span: type_.span,
            })?;

        let declaration = self.table.get(target);
        if declaration.source.is_service() {
            return Err(CompileError::NotAModel {
                reference: type_.name.clone(),
                context: context.declaration.clone(),
                service: declaration.identifier.clone(),
            });
        }

        let args = type_
            .args
            .iter()
            .map(|arg| self.resolve_type(context, arg))
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedType::Declaration { target, args })
    }

    /// Builtins and aliases first for unqualified names, then each enclosing namespace from the
    /// innermost outward.
    fn lookup(&self, context: ResolutionContext, reference: &Identifier) -> Option<DeclId> {
        if reference.is_global() {
            if let Some(target) = lookup_builtin(&reference.name)
                .and_then(|kind| self.table.lookup(&kind.identifier()))
            {
                return Some(target);
            }
        }

        let mut scope = Some(context.namespace);
        while let Some(namespace) = scope {
            let candidate = Identifier::new(
                join_namespace(namespace, &reference.namespace),
                reference.name.clone(),
            );
            if let Some(target) = self.table.lookup(&candidate) {
                return Some(target);
            }
            scope = parent_namespace(namespace);
        }
        None
    }
}

fn model_used_ids(model: &Identifier, options: &[OptionEntry]) -> Result<Vec<u32>> {
    let mut used_ids = Vec::new();
    for option in options {
        match (option.key.as_str(), &option.value) {
            (USED_IDS_OPTION, OptionValue::Integer(id)) => used_ids.push(*id),
            (USED_IDS_OPTION, OptionValue::IntegerList(ids)) => used_ids.extend_from_slice(ids),
            (USED_IDS_OPTION, OptionValue::Type(_)) => {
                return Err(invalid_option(model, option, "an integer or integer list"))
            }
            _ => return Err(unknown_option(model, option)),
        }
    }
    Ok(used_ids)
}

fn invalid_option(context: &Identifier, option: &OptionEntry, expected: &'static str) -> CompileError {
    CompileError::InvalidOptionValue {
        context: context.clone(),
        option: option.key.clone(),
        expected,
    }
}

fn unknown_option(context: &Identifier, option: &OptionEntry) -> CompileError {
    CompileError::UnknownOption {
        context: context.clone(),
        option: option.key.clone(),
    }
}
