use std::collections::HashMap;

use crate::ast::{FieldDeclaration, ModelDeclaration, ServiceDeclaration, TagFieldDeclaration};
use crate::builtins::BuiltinKind;
use crate::error::{CompileError, Result};
use crate::identifier::Identifier;

/// Index of a declaration in its [`DeclarationTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct DeclId(usize);

impl DeclId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// The syntax a declaration came from. Builtins have none.
#[derive(Copy, Clone, Debug)]
pub(crate) enum DeclarationSource<'a> {
    Builtin(BuiltinKind),
    Message(&'a ModelDeclaration<FieldDeclaration>),
    Tag(&'a ModelDeclaration<TagFieldDeclaration>),
    Service(&'a ServiceDeclaration),
}

impl DeclarationSource<'_> {
    pub(crate) fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

#[derive(Debug)]
pub(crate) struct Declaration<'a> {
    pub identifier: Identifier,
    /// Namespace the declaration's references resolve from.
    pub namespace: String,
    pub source: DeclarationSource<'a>,
}

/// Bidirectional mapping between fully-qualified identifiers and declaration ids.
#[derive(Debug, Default)]
pub(crate) struct DeclarationTable<'a> {
    declarations: Vec<Declaration<'a>>,
    ids: HashMap<Identifier, DeclId>,
}

impl<'a> DeclarationTable<'a> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a declaration. Fails if its identifier is already taken.
    pub(crate) fn insert(
        &mut self,
        identifier: Identifier,
        source: DeclarationSource<'a>,
    ) -> Result<DeclId> {
        if self.ids.contains_key(&identifier) {
            return Err(CompileError::DuplicateDeclaration { identifier });
        }
        let id = DeclId(self.declarations.len());
        self.ids.insert(identifier.clone(), id);
        self.declarations.push(Declaration {
            namespace: identifier.namespace.clone(),
            identifier,
            source,
        });
        Ok(id)
    }

    pub(crate) fn lookup(&self, identifier: &Identifier) -> Option<DeclId> {
        self.ids.get(identifier).copied()
    }

    pub(crate) fn identifier(&self, id: DeclId) -> &Identifier {
        &self.declarations[id.0].identifier
    }

    pub(crate) fn get(&self, id: DeclId) -> &Declaration<'a> {
        &self.declarations[id.0]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration<'a>)> {
        self.declarations
            .iter()
            .enumerate()
            .map(|(index, declaration)| (DeclId(index), declaration))
    }

    pub(crate) fn len(&self) -> usize {
        self.declarations.len()
    }
}
