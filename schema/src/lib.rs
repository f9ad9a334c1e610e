//! Compiler for `.ks` schema files.
//!
//! Sources are parsed in parallel, then resolved, ordered and built into an immutable
//! [`Project`] on a single thread.

pub mod ast;
pub mod builtins;
pub mod components;
pub mod error;
pub mod identifier;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod source;

mod builder;
mod declarations;
mod hash;
mod resolver;
mod topo;

use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

pub use builtins::{BuiltinKind, BUILTIN_NAMESPACE};
pub use components::{ComponentTable, ModelTable, Ref};
pub use error::{CompileError, Diagnostic, Result, Span};
pub use identifier::Identifier;
pub use model::{
    BuiltinDefinition, MessageDefinition, MessageFieldDefinition, ModelDefinition,
    ModelReference, Project, ReferenceTarget, ServiceDefinition, TagDefinition,
    TagFieldDefinition, TemplateDefinition,
};
pub use source::SourceText;

/// Project metadata that is not part of the schema sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerOptions {
    pub name: String,
    pub version: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            name: "unnamed".into(),
            version: "0.1.0".into(),
        }
    }
}

/// Compiles already loaded sources. The result does not depend on the order of `sources`.
pub fn compile_sources(sources: &[SourceText], options: &CompilerOptions) -> Result<Project> {
    let parsed: Vec<_> = sources
        .par_iter()
        .map(|source| parser::parse_source(&source.path, &source.text))
        .collect();

    let mut files = Vec::with_capacity(parsed.len());
    let mut diagnostics = Vec::new();
    for result in parsed {
        match result {
            Ok(file) => files.push(file),
            Err(errors) => diagnostics.extend(errors),
        }
    }
    if !diagnostics.is_empty() {
        return Err(CompileError::Syntax(diagnostics));
    }
    debug!(files = files.len(), "parsed sources");

    let declarations = resolver::collect_declarations(&files)?;
    debug!(declarations = declarations.len(), "registered declarations");
    let resolved = resolver::resolve_declarations(&declarations)?;
    let order = topo::sort_declarations(&declarations, &resolved)?;
    let built = builder::build_models(&declarations, &resolved, &order)?;
    debug!(
        models = built.models.len(),
        services = built.services.len(),
        "built models"
    );

    let content_hash = hash::content_hash(
        &options.name,
        &options.version,
        &built.table,
        &built.models,
        &built.services,
    );
    debug!(%content_hash, "computed content hash");

    Ok(Project {
        name: options.name.clone(),
        version: options.version.clone(),
        content_hash,
        models: built.models,
        services: built.services,
        table: built.table,
        index: built.index,
        builtins: built.builtins,
    })
}

/// Loads every `.ks` file below `root` and compiles them.
pub fn compile_directory(root: &Path, options: &CompilerOptions) -> Result<Project> {
    let sources = source::load_sources(root)?;
    compile_sources(&sources, options)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const USERS: &str = "namespace app.users;\n\
                         message User { uuid id = 1; string name = 2; Role role = 3; }\n\
                         tag Role { Guest = 0; Member(int) = 1; Admin = 2; }";
    const EVENTS: &str = "namespace app { namespace events {\n\
                          message template<T> Page { array<T> items = 1; ulong next = 2; }\n\
                          service ListUsers { @input = int; @output = Page<users.User>; @id = 4; }\n\
                          } }";

    fn compile(sources: &[(&str, &str)]) -> Result<Project> {
        let sources: Vec<SourceText> = sources
            .iter()
            .map(|(path, text)| SourceText::new(*path, *text))
            .collect();
        compile_sources(&sources, &CompilerOptions::default())
    }

    fn names(project: &Project) -> Vec<String> {
        project
            .models()
            .iter()
            .map(|&model| project.definition(model).identifier().to_string())
            .collect()
    }

    #[test]
    fn compiles_project_in_dependency_order() {
        let project = compile(&[("users.ks", USERS), ("events.ks", EVENTS)]).unwrap();
        assert_eq!(
            names(&project),
            vec!["app.events.Page", "app.users.Role", "app.users.User"]
        );
        let service = project.service(4).unwrap();
        assert_eq!(service.identifier.to_string(), "app.events.ListUsers");
        assert_eq!(
            project.table().describe(service.output),
            "app.events.Page<app.users.User>"
        );
        assert_eq!(project.content_hash().len(), 64);
        assert!(project
            .model(&Identifier::new("ks", "uuid"))
            .is_some_and(|model| model == project.builtin(BuiltinKind::Uuid)));
    }

    #[test]
    fn hash_ignores_file_layout() {
        let split = compile(&[("users.ks", USERS), ("events.ks", EVENTS)]).unwrap();
        let reversed = compile(&[("events.ks", EVENTS), ("users.ks", USERS)]).unwrap();
        let merged_source = format!(
            "{EVENTS}\nnamespace app.users {{ {} }}",
            USERS.trim_start_matches("namespace app.users;\n")
        );
        let merged = compile(&[("all.ks", merged_source.as_str())]).unwrap();
        assert_eq!(split.content_hash(), reversed.content_hash());
        assert_eq!(split.content_hash(), merged.content_hash());
    }

    #[test]
    fn hash_tracks_schema_content_and_metadata() {
        let base = compile(&[("users.ks", USERS)]).unwrap();
        let changed_source = USERS.replace("name = 2", "name = 5");
        let changed = compile(&[("users.ks", changed_source.as_str())]).unwrap();
        assert_ne!(base.content_hash(), changed.content_hash());

        let sources = [SourceText::new("users.ks", USERS)];
        let renamed = compile_sources(
            &sources,
            &CompilerOptions {
                name: "other".into(),
                version: "0.1.0".into(),
            },
        )
        .unwrap();
        assert_ne!(base.content_hash(), renamed.content_hash());
    }

    #[test]
    fn aggregates_syntax_errors_of_all_files() {
        let error = compile(&[("a.ks", "message A { $ }"), ("b.ks", "tag B {")]).unwrap_err();
        let files: Vec<String> = error
            .diagnostics()
            .iter()
            .map(|diagnostic| diagnostic.file.display().to_string())
            .collect();
        assert_eq!(files, vec!["a.ks", "b.ks"]);
    }

    #[test]
    fn rejects_cycles_across_files() {
        let error = compile(&[
            ("a.ks", "namespace a;\nmessage A { b.B b = 1; }"),
            ("b.ks", "namespace b;\nmessage B { a.A a = 1; }"),
        ])
        .unwrap_err();
        assert!(matches!(error, CompileError::CircularDependency { .. }));
    }

    #[test]
    fn compiles_directory() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("users")).unwrap();
        fs::write(root.path().join("users/users.ks"), USERS).unwrap();
        fs::write(root.path().join("events.ks"), EVENTS).unwrap();
        let project = compile_directory(root.path(), &CompilerOptions::default()).unwrap();
        assert_eq!(project.models().len(), 3);
        assert_eq!(project.services().len(), 1);
    }
}
