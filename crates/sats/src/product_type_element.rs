use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::AlgebraicType;

/// A factor / element of a product type.
///
/// An element consists of an optional name and a type.
///
/// NOTE: Each element has an implicit element tag based on its order.
/// Uniquely identifies an element similarly to protobuf tags.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ProductTypeElement {
    /// The name of the field / element.
    ///
    /// As our type system is structural,
    /// a type like `{ foo: U8 }`, where `foo: U8` is the `ProductTypeElement`,
    /// is inequal to `{ bar: U8 }`, although their `algebraic_type`s (`U8`) match.
    pub name: Option<Box<str>>,
    /// The type of the element.
    ///
    /// Only values of this type can be stored in the element.
    pub algebraic_type: AlgebraicType,
}

impl ProductTypeElement {
    /// Returns an element with the given `name` and `algebraic_type`.
    pub const fn new(algebraic_type: AlgebraicType, name: Option<Box<str>>) -> Self {
        Self { algebraic_type, name }
    }

    /// Returns a named element with `name` and `algebraic_type`.
    pub fn new_named(algebraic_type: AlgebraicType, name: impl Into<Box<str>>) -> Self {
        Self::new(algebraic_type, Some(name.into()))
    }

    /// Returns the name of the field.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns whether the field has the given name.
    pub fn has_name(&self, name: &str) -> bool {
        self.name() == Some(name)
    }
}

impl From<AlgebraicType> for ProductTypeElement {
    fn from(value: AlgebraicType) -> Self {
        ProductTypeElement::new(value, None)
    }
}

impl<'a> From<(&'a str, AlgebraicType)> for ProductTypeElement {
    fn from((name, ty): (&'a str, AlgebraicType)) -> Self {
        ProductTypeElement::new_named(ty, name)
    }
}

impl Serialize for ProductTypeElement {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.name.serialize(writer);
        self.algebraic_type.serialize(writer);
    }
}

impl Deserialize for ProductTypeElement {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        let name = Deserialize::deserialize(de)?;
        let algebraic_type = Deserialize::deserialize(de)?;
        Ok(Self { name, algebraic_type })
    }
}
