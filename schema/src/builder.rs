//! Turns resolved declarations, in dependency order, into arena-backed model definitions.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::builtins::{self, BuiltinKind};
use crate::components::{ComponentTable, ConstructionModelTable, ModelTable, Ref};
use crate::declarations::{DeclId, DeclarationTable};
use crate::error::{CompileError, Result};
use crate::identifier::{Identifier, Name};
use crate::model::{
    MessageDefinition, MessageFieldDefinition, ModelDefinition, ModelReference,
    ServiceDefinition, TagDefinition, TagFieldDefinition, TemplateDefinition,
};
use crate::resolver::{ResolvedDeclaration, ResolvedField, ResolvedTagField, ResolvedType};

/// Output of [`build_models`]: everything a [`Project`](crate::Project) owns except its hash.
pub(crate) struct BuiltModels {
    pub table: ModelTable,
    pub models: Vec<Ref<ModelDefinition>>,
    pub services: Vec<ServiceDefinition>,
    pub index: HashMap<Identifier, Ref<ModelDefinition>>,
    pub builtins: HashMap<BuiltinKind, Ref<ModelDefinition>>,
}

pub(crate) fn build_models(
    declarations: &DeclarationTable,
    resolved: &[ResolvedDeclaration],
    order: &[DeclId],
) -> Result<BuiltModels> {
    let mut table = ConstructionModelTable::new();
    let builtins = builtins::register_builtins(&mut table);

    let mut builder = ModelBuilder {
        declarations,
        table,
        definitions: HashMap::new(),
        builtins,
        models: Vec::new(),
        services: Vec::new(),
        service_ids: HashMap::new(),
        contained_parameters: HashMap::new(),
    };
    for &id in order {
        builder.build(id, &resolved[id.index()])?;
    }

    let ModelBuilder {
        table,
        definitions,
        builtins,
        models,
        mut services,
        ..
    } = builder;
    services.sort_by_key(|service| service.id);

    let index = definitions
        .iter()
        .map(|(&id, &definition)| (declarations.identifier(id).clone(), definition))
        .collect();
    let table = table
        .convert_to_model_table()
        .expect("every reserved definition is filled before building finishes");

    Ok(BuiltModels {
        table,
        models,
        services,
        index,
        builtins,
    })
}

struct ModelBuilder<'t, 'a> {
    declarations: &'t DeclarationTable<'a>,
    table: ConstructionModelTable,
    definitions: HashMap<DeclId, Ref<ModelDefinition>>,
    builtins: HashMap<BuiltinKind, Ref<ModelDefinition>>,
    models: Vec<Ref<ModelDefinition>>,
    services: Vec<ServiceDefinition>,
    service_ids: HashMap<u32, Identifier>,
    /// Per template, which parameters end up as an `array` or `map` argument.
    contained_parameters: HashMap<Ref<ModelDefinition>, Vec<bool>>,
}

impl ModelBuilder<'_, '_> {
    fn build(&mut self, id: DeclId, declaration: &ResolvedDeclaration) -> Result<()> {
        let identifier = self.declarations.identifier(id).clone();
        trace!(%identifier, "building");

        match declaration {
            ResolvedDeclaration::Builtin(kind) => {
                self.definitions.insert(id, self.builtins[kind]);
            }
            ResolvedDeclaration::Message {
                template_params,
                fields,
                used_ids,
            } => {
                let slot = self.table.reserve();
                let parameters = self.template_arguments(slot, template_params);
                let definition = MessageDefinition {
                    fields: self.message_fields(&identifier, fields, &parameters)?,
                    used_ids: check_used_ids(&identifier, used_ids, fields.iter().map(|f| f.id))?,
                    identifier,
                };
                let definition = if parameters.is_empty() {
                    ModelDefinition::Message(definition)
                } else {
                    self.mark_contained_parameters(
                        slot,
                        parameters.len(),
                        fields.iter().map(|field| &field.type_),
                    );
                    ModelDefinition::MessageTemplate(TemplateDefinition {
                        parameters,
                        definition,
                    })
                };
                self.finish_model(id, slot, definition);
            }
            ResolvedDeclaration::Tag {
                template_params,
                fields,
                used_ids,
            } => {
                let slot = self.table.reserve();
                let parameters = self.template_arguments(slot, template_params);
                let definition = TagDefinition {
                    fields: self.tag_fields(&identifier, fields, &parameters)?,
                    used_ids: check_used_ids(
                        &identifier,
                        used_ids,
                        fields.iter().map(|f| f.value),
                    )?,
                    identifier,
                };
                let definition = if parameters.is_empty() {
                    ModelDefinition::Tag(definition)
                } else {
                    self.mark_contained_parameters(
                        slot,
                        parameters.len(),
                        fields.iter().filter_map(|field| field.payload.as_ref()),
                    );
                    ModelDefinition::TagTemplate(TemplateDefinition {
                        parameters,
                        definition,
                    })
                };
                self.finish_model(id, slot, definition);
            }
            ResolvedDeclaration::Service {
                input,
                output,
                id: service_id,
            } => {
                if *service_id == 0 {
                    return Err(CompileError::InvalidServiceId {
                        service: identifier,
                        id: *service_id,
                    });
                }
                if let Some(first) = self.service_ids.get(service_id) {
                    return Err(CompileError::DuplicateServiceId {
                        id: *service_id,
                        first: first.clone(),
                        second: identifier,
                    });
                }
                let input = self.reference(&identifier, input, &[])?;
                let output = self.reference(&identifier, output, &[])?;
                self.service_ids.insert(*service_id, identifier.clone());
                self.services.push(ServiceDefinition {
                    identifier,
                    input,
                    output,
                    id: *service_id,
                });
            }
        }
        Ok(())
    }

    fn finish_model(&mut self, id: DeclId, slot: Ref<ModelDefinition>, definition: ModelDefinition) {
        self.table.insert(slot, definition);
        self.definitions.insert(id, slot);
        self.models.push(slot);
    }

    /// One shared reference per template parameter, owned by the definition in `slot`.
    fn template_arguments(
        &mut self,
        slot: Ref<ModelDefinition>,
        template_params: &[Name],
    ) -> Vec<Ref<ModelReference>> {
        template_params
            .iter()
            .enumerate()
            .map(|(index, name)| {
                self.table.create(ModelReference::TemplateArgument {
                    owner: slot,
                    index,
                    name: name.clone(),
                })
            })
            .collect()
    }

    fn message_fields(
        &mut self,
        model: &Identifier,
        fields: &[ResolvedField],
        parameters: &[Ref<ModelReference>],
    ) -> Result<Vec<MessageFieldDefinition>> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut definitions = Vec::with_capacity(fields.len());

        for field in fields {
            if !ids.insert(field.id) {
                return Err(CompileError::DuplicateFieldId {
                    model: model.clone(),
                    id: field.id,
                });
            }
            check_field_name(model, &mut names, &field.name)?;
            definitions.push(MessageFieldDefinition {
                type_: self.reference(model, &field.type_, parameters)?,
                name: field.name.clone(),
                id: field.id,
            });
        }

        definitions.sort_by_key(|field| field.id);
        Ok(definitions)
    }

    fn tag_fields(
        &mut self,
        model: &Identifier,
        fields: &[ResolvedTagField],
        parameters: &[Ref<ModelReference>],
    ) -> Result<Vec<TagFieldDefinition>> {
        let mut values = HashSet::new();
        let mut names = HashSet::new();
        let mut definitions = Vec::with_capacity(fields.len());

        for field in fields {
            if !values.insert(field.value) {
                return Err(CompileError::DuplicateTagValue {
                    model: model.clone(),
                    value: field.value,
                });
            }
            check_field_name(model, &mut names, &field.name)?;
            let payload = match &field.payload {
                Some(payload) => Some(self.reference(model, payload, parameters)?),
                None => None,
            };
            definitions.push(TagFieldDefinition {
                name: field.name.clone(),
                value: field.value,
                payload,
            });
        }

        definitions.sort_by_key(|field| field.value);
        Ok(definitions)
    }

    /// Creates a fresh reference for one usage site, checking arity and `void` arguments.
    fn reference(
        &mut self,
        context: &Identifier,
        type_: &ResolvedType,
        parameters: &[Ref<ModelReference>],
    ) -> Result<Ref<ModelReference>> {
        let (target, args) = match type_ {
            ResolvedType::Parameter { index } => return Ok(parameters[*index]),
            ResolvedType::Declaration { target, args } => (*target, args),
        };

        let definition_ref = *self
            .definitions
            .get(&target)
            .expect("dependencies are built first");
        let definition = self.table.get(definition_ref);
        let identifier = definition.identifier().clone();

        if definition.arity() != args.len() {
            return Err(CompileError::ArityMismatch {
                context: context.clone(),
                reference: identifier,
                expected: definition.arity(),
                found: args.len(),
            });
        }
        let variant = match definition {
            ModelDefinition::Builtin(_) => ReferenceVariant::Builtin,
            ModelDefinition::Message(_) => ReferenceVariant::Message,
            ModelDefinition::MessageTemplate(_) => ReferenceVariant::MessageTemplate,
            ModelDefinition::Tag(_) => ReferenceVariant::Tag,
            ModelDefinition::TagTemplate(_) => ReferenceVariant::TagTemplate,
        };

        if args
            .iter()
            .enumerate()
            .any(|(index, arg)| self.is_contained(definition_ref, index) && self.is_void(arg))
        {
            return Err(CompileError::VoidTypeArgument {
                context: context.clone(),
                template: identifier,
            });
        }

        let args = args
            .iter()
            .map(|arg| self.reference(context, arg, parameters))
            .collect::<Result<Vec<_>>>()?;

        let reference = match variant {
            ReferenceVariant::Builtin => ModelReference::Builtin {
                definition: definition_ref,
                args,
            },
            ReferenceVariant::Message => ModelReference::Message {
                definition: definition_ref,
            },
            ReferenceVariant::MessageTemplate => ModelReference::MessageTemplate {
                definition: definition_ref,
                args,
            },
            ReferenceVariant::Tag => ModelReference::Tag {
                definition: definition_ref,
            },
            ReferenceVariant::TagTemplate => ModelReference::TagTemplate {
                definition: definition_ref,
                args,
            },
        };
        Ok(self.table.create(reference))
    }

    /// Whether argument `index` of `definition` ends up as an `array` or `map` argument, directly
    /// or through the fields of a template.
    fn is_contained(&self, definition: Ref<ModelDefinition>, index: usize) -> bool {
        matches!(
            self.table.get(definition).builtin_kind(),
            Some(BuiltinKind::Array | BuiltinKind::Map)
        ) || self
            .contained_parameters
            .get(&definition)
            .is_some_and(|contained| contained[index])
    }

    fn mark_contained_parameters<'r>(
        &mut self,
        slot: Ref<ModelDefinition>,
        arity: usize,
        types: impl Iterator<Item = &'r ResolvedType>,
    ) {
        let mut contained = vec![false; arity];
        for type_ in types {
            self.collect_contained(type_, false, &mut contained);
        }
        self.contained_parameters.insert(slot, contained);
    }

    fn collect_contained(&self, type_: &ResolvedType, inside: bool, contained: &mut [bool]) {
        match type_ {
            ResolvedType::Parameter { index } => contained[*index] |= inside,
            ResolvedType::Declaration { target, args } => {
                let Some(&definition) = self.definitions.get(target) else {
                    return;
                };
                for (index, arg) in args.iter().enumerate() {
                    self.collect_contained(arg, self.is_contained(definition, index), contained);
                }
            }
        }
    }

    fn is_void(&self, type_: &ResolvedType) -> bool {
        match type_ {
            ResolvedType::Declaration { target, .. } => self
                .definitions
                .get(target)
                .is_some_and(|&definition| definition == self.builtins[&BuiltinKind::Void]),
            ResolvedType::Parameter { .. } => false,
        }
    }
}

#[derive(Copy, Clone)]
enum ReferenceVariant {
    Builtin,
    Message,
    MessageTemplate,
    Tag,
    TagTemplate,
}

fn check_field_name(model: &Identifier, names: &mut HashSet<Name>, name: &str) -> Result<()> {
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(CompileError::DuplicateFieldName {
            model: model.clone(),
            name: name.to_string(),
        })
    }
}

/// Retired ids may not be reused by a live field. Returned sorted and deduplicated.
fn check_used_ids(
    model: &Identifier,
    used_ids: &[u32],
    live_ids: impl Iterator<Item = u32>,
) -> Result<Vec<u32>> {
    let live: HashSet<u32> = live_ids.collect();
    if let Some(&id) = used_ids.iter().find(|id| live.contains(id)) {
        return Err(CompileError::RetiredIdInUse {
            model: model.clone(),
            id,
        });
    }
    let mut used_ids = used_ids.to_vec();
    used_ids.sort_unstable();
    used_ids.dedup();
    Ok(used_ids)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::ast::SourceFile;
    use crate::parser::parse_source;
    use crate::resolver::{collect_declarations, resolve_declarations};
    use crate::topo::sort_declarations;

    fn build(source: &str) -> Result<BuiltModels> {
        let files: Vec<SourceFile> = vec![parse_source(Path::new("test.ks"), source).unwrap()];
        let table = collect_declarations(&files)?;
        let resolved = resolve_declarations(&table)?;
        let order = sort_declarations(&table, &resolved)?;
        build_models(&table, &resolved, &order)
    }

    fn definition<'m>(built: &'m BuiltModels, name: &str) -> &'m ModelDefinition {
        built.index[&Identifier::parse(name)].get(&built.table)
    }

    #[test]
    fn sorts_fields_by_id_and_value() {
        let built = build(
            "message M { string b = 7; int a = 2; bool c = 4; }\n\
             tag T { Z = 3; X = 0; Y(M) = 1; }",
        )
        .unwrap();
        let message = definition(&built, "M").message().unwrap();
        let ids: Vec<u32> = message.fields.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 4, 7]);
        let tag = definition(&built, "T").tag().unwrap();
        let names: Vec<&str> = tag.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);
        assert!(tag.field(1).unwrap().payload.is_some());
    }

    #[test]
    fn template_arguments_are_shared_and_fresh_elsewhere() {
        let built = build(
            "message template<T> Pair { T first = 1; T second = 2; }\n\
             message User { int a = 1; int b = 2; }",
        )
        .unwrap();
        let pair = definition(&built, "Pair");
        let ModelDefinition::MessageTemplate(template) = pair else {
            panic!("expected template");
        };
        let fields = &template.definition.fields;
        assert_eq!(fields[0].type_, fields[1].type_);
        assert_eq!(fields[0].type_, template.parameters[0]);

        let user = definition(&built, "User").message().unwrap();
        assert_ne!(user.fields[0].type_, user.fields[1].type_);
        assert!(built
            .table
            .same_shape(user.fields[0].type_, user.fields[1].type_));
    }

    #[test]
    fn describes_instantiated_references() {
        let built = build(
            "namespace box;\n\
             message template<T> Box { T value = 1; }\n\
             message Holder { Box<int> boxed = 1; map<string, array<Box<uint>>> nested = 2; }",
        )
        .unwrap();
        let holder = definition(&built, "box.Holder").message().unwrap();
        assert_eq!(built.table.describe(holder.fields[0].type_), "box.Box<ks.int32>");
        assert_eq!(
            built.table.describe(holder.fields[1].type_),
            "ks.map<ks.string, ks.array<box.Box<ks.uint32>>>"
        );
        let ModelDefinition::MessageTemplate(template) = definition(&built, "box.Box") else {
            panic!("expected template");
        };
        assert_eq!(built.table.describe(template.definition.fields[0].type_), "T");
    }

    #[test]
    fn rejects_duplicate_field_id() {
        let error = build("message M { int a = 1; int b = 1; }").err().unwrap();
        assert!(matches!(error, CompileError::DuplicateFieldId { id: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_tag_value() {
        let error = build("tag T { A = 0; B = 0; }").err().unwrap();
        assert!(matches!(error, CompileError::DuplicateTagValue { value: 0, .. }));
    }

    #[test]
    fn rejects_duplicate_field_name() {
        let error = build("message M { int a = 1; string a = 2; }").err().unwrap();
        assert!(matches!(error, CompileError::DuplicateFieldName { name, .. } if name == "a"));
    }

    #[test]
    fn rejects_retired_id_in_use() {
        let error = build("message M { int a = 1; @used_ids = [1, 2]; }").err().unwrap();
        assert!(matches!(error, CompileError::RetiredIdInUse { id: 1, .. }));
        assert!(build("message M { int a = 3; @used_ids = [1, 2]; }").is_ok());
    }

    #[test]
    fn rejects_arity_mismatch() {
        let error = build("message template<A, B> P { A a = 1; B b = 2; }\nmessage M { P<int> p = 1; }")
            .err()
            .unwrap();
        assert!(matches!(
            error,
            CompileError::ArityMismatch { expected: 2, found: 1, .. }
        ));
        let error = build("message M { int<int> x = 1; }").err().unwrap();
        assert!(matches!(error, CompileError::ArityMismatch { expected: 0, .. }));
        let error = build("message M { array v = 1; }").err().unwrap();
        assert!(matches!(error, CompileError::ArityMismatch { expected: 1, found: 0, .. }));
    }

    #[test]
    fn rejects_void_composite_arguments() {
        let error = build("message M { array<void> v = 1; }").err().unwrap();
        assert!(matches!(error, CompileError::VoidTypeArgument { .. }));
        let error = build("message M { map<string, void> v = 1; }").err().unwrap();
        assert!(matches!(error, CompileError::VoidTypeArgument { .. }));
        // user templates may take void
        assert!(build("message template<T> B { T v = 1; }\nmessage M { B<void> b = 1; }").is_ok());
    }

    #[test]
    fn rejects_void_reaching_composites_through_templates() {
        let error = build(
            "message template<T> B { array<T> items = 1; }\n\
             message M { B<void> b = 1; }",
        )
        .err()
        .unwrap();
        assert!(matches!(
            error,
            CompileError::VoidTypeArgument { ref template, .. } if template.name == "B"
        ));

        // through a second template, with void in the second parameter
        let error = build(
            "message template<K, V> Table { map<K, V> rows = 1; }\n\
             message template<A, B> Wrap { A label = 1; Table<string, B> table = 2; }\n\
             message M { Wrap<int, void> w = 1; }",
        )
        .err()
        .unwrap();
        assert!(matches!(
            error,
            CompileError::VoidTypeArgument { ref template, .. } if template.name == "Wrap"
        ));

        let error = build(
            "tag template<T> Maybe { None = 0; Some(map<string, T>) = 1; }\n\
             service S { @input = Maybe<void>; @output = void; @id = 1; }",
        )
        .err()
        .unwrap();
        assert!(matches!(error, CompileError::VoidTypeArgument { .. }));

        // a container of the template itself still takes void elsewhere
        assert!(build(
            "message template<A, B> Wrap { A label = 1; array<B> items = 2; }\n\
             message M { Wrap<void, int> w = 1; array<Wrap<void, int>> ws = 2; }",
        )
        .is_ok());
    }

    #[test]
    fn validates_service_ids() {
        let source = "message R {}\n\
                      service A { @input = R; @output = R; @id = 3; }\n\
                      service B { @input = R; @output = R; @id = 3; }";
        let error = build(source).err().unwrap();
        assert!(matches!(
            error,
            CompileError::DuplicateServiceId { id: 3, ref first, ref second }
                if first.name == "A" && second.name == "B"
        ));

        let error = build("service A { @input = void; @output = void; @id = 0; }")
            .err()
            .unwrap();
        assert!(matches!(error, CompileError::InvalidServiceId { .. }));
    }

    #[test]
    fn services_are_sorted_by_id() {
        let built = build(
            "service B { @input = void; @output = int; @id = 9; }\n\
             service A { @input = string; @output = void; @id = 2; }",
        )
        .unwrap();
        let ids: Vec<u32> = built.services.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 9]);
        assert_eq!(built.table.describe(built.services[1].output), "ks.int32");
    }
}
