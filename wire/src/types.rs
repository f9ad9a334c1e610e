use std::fmt;

use ks_schema::{ModelDefinition, Project, Ref};

/// A fully instantiated type: a definition with every template parameter bound.
///
/// `array<int32>` and `array<string>` are distinct concrete types, so they get distinct codecs
/// and default values.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConcreteType {
    definition: Ref<ModelDefinition>,
    args: Vec<ConcreteType>,
}

impl ConcreteType {
    pub(crate) fn new(definition: Ref<ModelDefinition>, args: Vec<ConcreteType>) -> Self {
        Self { definition, args }
    }

    pub fn definition(&self) -> Ref<ModelDefinition> {
        self.definition
    }

    pub fn args(&self) -> &[ConcreteType] {
        &self.args
    }

    /// Renders the type fully qualified, e.g. `app.Page<ks.string>`.
    pub fn describe(&self, project: &Project) -> String {
        let mut description = project.definition(self.definition).identifier().to_string();
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|arg| arg.describe(project)).collect();
            description.push('<');
            description.push_str(&args.join(", "));
            description.push('>');
        }
        description
    }
}

impl fmt::Debug for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{:?}", self.definition)
        } else {
            f.debug_tuple("ConcreteType")
                .field(&self.definition)
                .field(&self.args)
                .finish()
        }
    }
}
