//! Syntax tree of a single `.ks` file. Nodes only live until the model is built.

use std::path::PathBuf;

use crate::error::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Namespace(NamespaceStatement),
    Message(ModelDeclaration<FieldDeclaration>),
    Tag(ModelDeclaration<TagFieldDeclaration>),
    Service(ServiceDeclaration),
}

/// `namespace a.b;` (global, `body` is `None`) or `namespace a.b { ... }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceStatement {
    pub name: String,
    pub body: Option<Vec<Statement>>,
    pub span: Span,
}

/// Shared shape of `message` and `tag` declarations; `F` is the field flavor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelDeclaration<F> {
    pub name: String,
    pub template_params: Vec<String>,
    pub fields: Vec<F>,
    pub options: Vec<OptionEntry>,
    pub span: Span,
}

impl<F> ModelDeclaration<F> {
    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty()
    }
}

/// `type name = id;`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub type_: TypeExpression,
    pub name: String,
    pub id: u32,
    pub span: Span,
}

/// `name = value;` or `name(Type) = value;`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFieldDeclaration {
    pub name: String,
    pub payload: Option<TypeExpression>,
    pub value: u32,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDeclaration {
    pub name: String,
    pub options: Vec<OptionEntry>,
    pub span: Span,
}

/// `@key = value;`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionEntry {
    pub key: String,
    pub value: OptionValue,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Integer(u32),
    IntegerList(Vec<u32>),
    Type(TypeExpression),
}

/// A type usage as written, e.g. `map<string, acme.Account>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeExpression {
    pub name: String,
    pub args: Vec<TypeExpression>,
    pub span: Span,
}
