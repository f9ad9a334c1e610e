use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::num::{NonZeroU32, NonZeroUsize};

use crate::model::{ModelDefinition, ModelReference};

/// Trait implemented by everything stored in the model arena.
pub trait Component {
    const DISPLAY_NAME: &'static str;
}

/// Type on which internal arena traits are implemented.
///
/// Keeps the container accessors out of the public [`Component`] trait.
pub struct ComponentTraits;

/// A component referencable via [`Ref`]. Intended for internal use.
pub trait HasArenaContainer<R: Component>: Sized {
    fn get_container_from_construction_table(table: &ConstructionModelTable) -> &[Option<R>];
    fn get_container_from_construction_table_mut(
        table: &mut ConstructionModelTable,
    ) -> &mut Vec<Option<R>>;
    fn get_container_from_model_table(table: &ModelTable) -> &[R];
}

/// A reference to a [`Component`] stored in a [`ComponentTable`].
///
/// Two refs are equal only if they point to the same slot; structurally identical references
/// created at different sites are distinct.
pub struct Ref<R>(NonZeroU32, PhantomData<R>)
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>;

impl<R> Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    const fn from_inner(inner: NonZeroU32) -> Self {
        Self(inner, PhantomData)
    }

    fn index(self) -> usize {
        let size: NonZeroUsize = self
            .0
            .try_into()
            .expect("Could not convert component reference to usize index");
        usize::from(size) - 1
    }

    pub fn get(self, table: &impl ComponentTable) -> &R {
        table.get(self)
    }
}

// derive(...) would require R itself to implement the traits, even though it only appears in the
// PhantomData.

impl<R> Copy for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
}

impl<R> Clone for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> fmt::Debug for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} #{}>", R::DISPLAY_NAME, self.0)
    }
}

impl<R> PartialEq for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<R> Eq for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
}

impl<R> Hash for Ref<R>
where
    R: Component,
    ComponentTraits: HasArenaContainer<R>,
{
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// An arena-like container for the model [`Component`]s.
pub trait ComponentTable {
    /// Retrieves a component by reference. Panics if the slot is empty.
    fn get<R>(&self, ref_: Ref<R>) -> &R
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>;
}

/// The table used while models are being built.
///
/// Slots are `Option`s because a definition's template arguments point back at the definition,
/// so its `Ref` has to exist before the definition itself.
#[derive(Default)]
pub struct ConstructionModelTable {
    definitions: Vec<Option<ModelDefinition>>,
    references: Vec<Option<ModelReference>>,
}

impl ComponentTable for ConstructionModelTable {
    fn get<R>(&self, ref_: Ref<R>) -> &R
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_table(self);
        container
            .get(ref_.index())
            .expect("Invalid component reference (out-of-bounds)")
            .as_ref()
            .expect("Component is not present")
    }
}

impl ConstructionModelTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a [`Ref`] which points to an absent, reserved slot in the table.
    pub(crate) fn reserve<R>(&mut self) -> Ref<R>
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_table_mut(self);
        container.push(None);

        // the length is the 1-based id, non-zero after the push
        let size = NonZeroUsize::new(container.len()).expect("container is non-empty");
        let id: NonZeroU32 = size.try_into().expect("ID did not fit into 32-bit integer");

        Ref::from_inner(id)
    }

    /// Fills the slot pointed to by `ref_`. Returns `ref_` for convenience.
    pub(crate) fn insert<R>(&mut self, ref_: Ref<R>, value: R) -> Ref<R>
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_table_mut(self);
        let slot = container
            .get_mut(ref_.index())
            .expect("Invalid component reference (out-of-bounds)");
        *slot = Some(value);
        ref_
    }

    /// Shorthand for `insert(reserve(), value)`
    pub(crate) fn create<R>(&mut self, value: R) -> Ref<R>
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let ref_ = self.reserve();
        self.insert(ref_, value)
    }

    #[cfg(test)]
    pub(crate) fn is_present<R>(&self, ref_: Ref<R>) -> bool
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_construction_table(self);
        container
            .get(ref_.index())
            .is_some_and(|slot| slot.is_some())
    }

    /// Freezes this table. Returns `None` if a reserved slot was never filled.
    pub(crate) fn convert_to_model_table(self) -> Option<ModelTable> {
        Some(ModelTable {
            definitions: Self::convert_container(self.definitions)?,
            references: Self::convert_container(self.references)?,
        })
    }

    fn convert_container<R>(container: Vec<Option<R>>) -> Option<Box<[R]>> {
        container.into_iter().collect()
    }
}

/// The read-only table that lives alongside the final [`Project`](crate::Project).
///
/// Every component a [`Ref`] points to is present.
pub struct ModelTable {
    definitions: Box<[ModelDefinition]>,
    references: Box<[ModelReference]>,
}

impl ComponentTable for ModelTable {
    fn get<R>(&self, ref_: Ref<R>) -> &R
    where
        R: Component,
        ComponentTraits: HasArenaContainer<R>,
    {
        let container = ComponentTraits::get_container_from_model_table(self);
        container
            .get(ref_.index())
            .expect("Invalid component reference (out-of-bounds)")
    }
}

impl ModelTable {
    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}

impl fmt::Debug for ModelTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelTable")
            .field("definitions", &self.definitions.len())
            .field("references", &self.references.len())
            .finish()
    }
}

macro_rules! has_arena_container_impl {
    ($type_name:ty, $field_name:ident) => {
        impl HasArenaContainer<$type_name> for ComponentTraits {
            fn get_container_from_construction_table(
                table: &ConstructionModelTable,
            ) -> &[Option<$type_name>] {
                &table.$field_name
            }

            fn get_container_from_construction_table_mut(
                table: &mut ConstructionModelTable,
            ) -> &mut Vec<Option<$type_name>> {
                &mut table.$field_name
            }

            fn get_container_from_model_table(table: &ModelTable) -> &[$type_name] {
                &table.$field_name
            }
        }
    };
}

has_arena_container_impl!(ModelDefinition, definitions);
has_arena_container_impl!(ModelReference, references);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinKind;
    use crate::model::BuiltinDefinition;

    fn builtin(kind: BuiltinKind) -> ModelDefinition {
        ModelDefinition::Builtin(BuiltinDefinition {
            identifier: kind.identifier(),
            kind,
        })
    }

    #[test]
    fn reserved_slot_is_filled_later() {
        let mut table = ConstructionModelTable::new();
        let reserved: Ref<ModelDefinition> = table.reserve();
        assert!(!table.is_present(reserved));
        assert!(table.convert_to_model_table().is_none());

        let mut table = ConstructionModelTable::new();
        let reserved: Ref<ModelDefinition> = table.reserve();
        table.insert(reserved, builtin(BuiltinKind::Int32));
        assert!(table.is_present(reserved));
        let table = table.convert_to_model_table().unwrap();
        assert_eq!(reserved.get(&table).identifier().name, "int32");
    }

    #[test]
    fn refs_compare_by_slot() {
        let mut table = ConstructionModelTable::new();
        let int32 = table.create(builtin(BuiltinKind::Int32));
        let first = table.create(ModelReference::Builtin {
            definition: int32,
            args: Vec::new(),
        });
        let second = table.create(ModelReference::Builtin {
            definition: int32,
            args: Vec::new(),
        });
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
        assert_eq!(format!("{first:?}"), "<model reference #1>");
    }
}
