use std::any::TypeId;

use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::{AlgebraicType, AlgebraicTypeRef};

/// An ordered collection of algebraic types.
///
/// The index of a type in the collection is its [`AlgebraicTypeRef`],
/// 0-based and stable for the lifetime of a module descriptor.
/// The typespace grows monotonically; refs are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Typespace {
    /// The types in the typespace, indexed by ref.
    pub types: Vec<AlgebraicType>,
}

impl Typespace {
    /// The empty typespace.
    pub const EMPTY: Self = Self { types: Vec::new() };

    /// Returns a typespace with the given `types`.
    pub const fn new(types: Vec<AlgebraicType>) -> Self {
        Self { types }
    }

    /// Returns the type referred to by `r`, if it is in range.
    pub fn get(&self, r: AlgebraicTypeRef) -> Option<&AlgebraicType> {
        self.types.get(r.idx())
    }

    /// Returns a mutable reference to the type referred to by `r`.
    pub fn get_mut(&mut self, r: AlgebraicTypeRef) -> Option<&mut AlgebraicType> {
        self.types.get_mut(r.idx())
    }

    /// Appends `ty` to the typespace, returning its new ref.
    ///
    /// Refs are handed out strictly increasing.
    pub fn add(&mut self, ty: AlgebraicType) -> AlgebraicTypeRef {
        let r = AlgebraicTypeRef(self.types.len() as u32);
        self.types.push(ty);
        r
    }

    /// Reserves a slot for a type that will be provided later via
    /// [`Self::set`], returning its ref.
    ///
    /// This is how recursive types register: the slot's ref can occur
    /// inside the definition that eventually fills it.
    pub fn reserve(&mut self) -> AlgebraicTypeRef {
        self.add(AlgebraicType::unit())
    }

    /// Replaces the type at `r` with `ty`.
    ///
    /// Panics if `r` has not been handed out yet.
    pub fn set(&mut self, r: AlgebraicTypeRef, ty: AlgebraicType) {
        self.types[r.idx()] = ty;
    }

    /// Returns the number of types in the typespace.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns whether the typespace holds no types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns whether every `Ref` reachable from `ty`
    /// resolves within this typespace.
    pub fn is_valid_for(&self, ty: &AlgebraicType) -> bool {
        match ty {
            AlgebraicType::Ref(r) => self.get(*r).is_some(),
            AlgebraicType::Sum(sum) => sum.variants.iter().all(|v| self.is_valid_for(&v.algebraic_type)),
            AlgebraicType::Product(prod) => prod.elements.iter().all(|e| self.is_valid_for(&e.algebraic_type)),
            AlgebraicType::Array(array) => self.is_valid_for(&array.elem_ty),
            _ => true,
        }
    }
}

impl Serialize for Typespace {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.types.serialize(writer);
    }
}

impl Deserialize for Typespace {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        Deserialize::deserialize(de).map(Self::new)
    }
}

/// A collector that module types register themselves into.
///
/// Implemented by the module-definition builder;
/// [`SpacetimeType::make_type`](crate::SpacetimeType::make_type)
/// threads one of these through type construction
/// so that named types land in the typespace exactly once
/// and occur as [`AlgebraicType::Ref`]s at their use sites.
pub trait TypespaceBuilder {
    /// Returns the type registered for the Rust type identified by `typeid`,
    /// registering it by running `make_ty` if this is its first occurrence.
    ///
    /// Registration is idempotent per `typeid` (and per `name`):
    /// repeated calls return the original ref
    /// and do not create a second typespace entry.
    ///
    /// `make_ty` receives the builder again so that field types can
    /// register themselves recursively; the slot for `typeid` is
    /// reserved before `make_ty` runs, which is what allows
    /// self-referential types.
    fn add(
        &mut self,
        typeid: TypeId,
        name: Option<&'static str>,
        make_ty: impl FnOnce(&mut Self) -> AlgebraicType,
    ) -> AlgebraicType
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_are_monotonic() {
        let mut ts = Typespace::default();
        let a = ts.add(AlgebraicType::U8);
        let b = ts.add(AlgebraicType::String);
        let c = ts.add(AlgebraicType::U8);
        assert!(a < b && b < c);
        assert_eq!(ts.get(b), Some(&AlgebraicType::String));
        assert_eq!(ts.len(), 3);
    }

    #[test]
    fn reserved_slot_allows_recursion() {
        let mut ts = Typespace::default();
        let r = ts.reserve();
        let node = AlgebraicType::product([
            ("value", AlgebraicType::U32),
            ("next", AlgebraicType::option(AlgebraicType::Ref(r))),
        ]);
        ts.set(r, node.clone());
        assert_eq!(ts.get(r), Some(&node));
        assert!(ts.is_valid_for(&node));
    }

    #[test]
    fn dangling_ref_detected() {
        let ts = Typespace::default();
        assert!(!ts.is_valid_for(&AlgebraicType::Ref(AlgebraicTypeRef(0))));
    }
}
