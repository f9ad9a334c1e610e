use sha2::{Digest, Sha256};

use crate::components::{ModelTable, Ref};
use crate::identifier::Identifier;
use crate::model::{ModelDefinition, ModelReference, ReferenceTarget, ServiceDefinition};

const TRAILER: &str = "KS-SCHEMA/1";

/// Feeds a canonical serialization of the schema into SHA-256.
///
/// Strings are written as an 8-byte little-endian length followed by their UTF-8 bytes, integers
/// as 8-byte little-endian values.
struct CanonicalHasher<'t> {
    table: &'t ModelTable,
    digest: Sha256,
}

impl CanonicalHasher<'_> {
    fn write_int(&mut self, value: u64) {
        self.digest.update(value.to_le_bytes());
    }

    fn write_str(&mut self, value: &str) {
        self.write_int(value.len() as u64);
        self.digest.update(value.as_bytes());
    }

    fn write_identifier(&mut self, identifier: &Identifier) {
        self.write_str(&identifier.namespace);
        self.write_str(&identifier.name);
    }

    fn write_reference(&mut self, reference: Ref<ModelReference>) {
        let table = self.table;
        match reference.get(table).target() {
            ReferenceTarget::Parameter { index, .. } => {
                self.write_str("parameter");
                self.write_int(index as u64);
            }
            ReferenceTarget::Definition { definition, args } => {
                self.write_str("model");
                self.write_identifier(definition.get(table).identifier());
                self.write_int(args.len() as u64);
                for &arg in args {
                    self.write_reference(arg);
                }
            }
        }
    }

    fn write_model(&mut self, definition: &ModelDefinition) {
        self.write_str(definition.kind_name());
        self.write_identifier(definition.identifier());
        self.write_int(definition.arity() as u64);

        if let Some(message) = definition.message() {
            self.write_int(message.fields.len() as u64);
            for field in &message.fields {
                self.write_int(field.id.into());
                self.write_str(&field.name);
                self.write_reference(field.type_);
            }
            self.write_used_ids(&message.used_ids);
        } else if let Some(tag) = definition.tag() {
            self.write_int(tag.fields.len() as u64);
            for field in &tag.fields {
                self.write_int(field.value.into());
                self.write_str(&field.name);
                match field.payload {
                    Some(payload) => {
                        self.write_int(1);
                        self.write_reference(payload);
                    }
                    None => self.write_int(0),
                }
            }
            self.write_used_ids(&tag.used_ids);
        }
    }

    fn write_used_ids(&mut self, used_ids: &[u32]) {
        self.write_int(used_ids.len() as u64);
        for &id in used_ids {
            self.write_int(id.into());
        }
    }

    fn write_service(&mut self, service: &ServiceDefinition) {
        self.write_identifier(&service.identifier);
        self.write_int(service.id.into());
        self.write_reference(service.input);
        self.write_reference(service.output);
    }
}

/// Lowercase hex SHA-256 over name, version, user models sorted by identifier and services sorted
/// by id.
pub(crate) fn content_hash(
    name: &str,
    version: &str,
    table: &ModelTable,
    models: &[Ref<ModelDefinition>],
    services: &[ServiceDefinition],
) -> String {
    let mut hasher = CanonicalHasher {
        table,
        digest: Sha256::new(),
    };
    hasher.write_str(name);
    hasher.write_str(version);

    let mut models: Vec<&ModelDefinition> = models.iter().map(|&model| model.get(table)).collect();
    models.sort_by(|a, b| a.identifier().cmp(b.identifier()));
    hasher.write_int(models.len() as u64);
    for model in models {
        hasher.write_model(model);
    }

    let mut services: Vec<&ServiceDefinition> = services.iter().collect();
    services.sort_by_key(|service| service.id);
    hasher.write_int(services.len() as u64);
    for service in services {
        hasher.write_service(service);
    }

    hasher.write_str(TRAILER);
    hex::encode(hasher.digest.finalize())
}
