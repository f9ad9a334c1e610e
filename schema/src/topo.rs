use tracing::trace;

use crate::declarations::{DeclId, DeclarationTable};
use crate::error::{CompileError, Result};
use crate::resolver::ResolvedDeclaration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders all declarations so that each comes after every declaration it references.
///
/// Roots are visited in identifier order, so the result does not depend on file order.
pub(crate) fn sort_declarations(
    table: &DeclarationTable,
    resolved: &[ResolvedDeclaration],
) -> Result<Vec<DeclId>> {
    let mut roots: Vec<DeclId> = table.iter().map(|(id, _)| id).collect();
    roots.sort_by(|a, b| table.identifier(*a).cmp(table.identifier(*b)));

    let mut sorter = TopologicalSorter {
        table,
        resolved,
        marks: vec![Mark::Unvisited; table.len()],
        stack: Vec::new(),
        order: Vec::with_capacity(table.len()),
    };
    for root in roots {
        sorter.visit(root)?;
    }
    Ok(sorter.order)
}

struct TopologicalSorter<'t, 'a> {
    table: &'t DeclarationTable<'a>,
    resolved: &'t [ResolvedDeclaration],
    marks: Vec<Mark>,
    /// Declarations currently in progress, outermost first.
    stack: Vec<DeclId>,
    order: Vec<DeclId>,
}

impl TopologicalSorter<'_, '_> {
    fn visit(&mut self, id: DeclId) -> Result<()> {
        match self.marks[id.index()] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(self.cycle_error(id)),
            Mark::Unvisited => {}
        }

        self.marks[id.index()] = Mark::InProgress;
        self.stack.push(id);

        for dependency in self.resolved[id.index()].dependencies() {
            self.visit(dependency)?;
        }

        self.stack.pop();
        self.marks[id.index()] = Mark::Done;
        trace!(identifier = %self.table.identifier(id), "dependencies done");
        self.order.push(id);
        Ok(())
    }

    fn cycle_error(&self, id: DeclId) -> CompileError {
        let start = self
            .stack
            .iter()
            .position(|&entry| entry == id)
            .unwrap_or_default();
        let path = self.stack[start..]
            .iter()
            .chain(std::iter::once(&id))
            .map(|&entry| self.table.identifier(entry).clone())
            .collect();
        CompileError::CircularDependency { path }
    }
}
