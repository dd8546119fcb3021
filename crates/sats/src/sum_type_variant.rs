use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::AlgebraicType;

/// A variant of a sum type.
///
/// NOTE: Each variant has an implicit variant tag based on its order,
/// and that tag is what a sum value carries on the wire.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SumTypeVariant {
    /// The name of the variant, if any.
    pub name: Option<Box<str>>,
    /// The type of the variant's payload.
    ///
    /// Payload-less variants, as in C-style enums, use the unit type here.
    pub algebraic_type: AlgebraicType,
}

impl SumTypeVariant {
    /// Returns a variant with the given `name` and payload `algebraic_type`.
    pub const fn new(algebraic_type: AlgebraicType, name: Option<Box<str>>) -> Self {
        Self { name, algebraic_type }
    }

    /// Returns a named variant with `name` and payload `algebraic_type`.
    pub fn new_named(algebraic_type: AlgebraicType, name: impl Into<Box<str>>) -> Self {
        Self::new(algebraic_type, Some(name.into()))
    }

    /// Returns a named variant with a unit payload.
    pub fn unit(name: impl Into<Box<str>>) -> Self {
        Self::new_named(AlgebraicType::unit(), name)
    }

    /// Returns the name of the variant.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns whether the variant has the given name.
    pub fn has_name(&self, name: &str) -> bool {
        self.name() == Some(name)
    }

    /// Returns whether the variant's payload is the unit type.
    pub fn is_unit(&self) -> bool {
        matches!(&self.algebraic_type, AlgebraicType::Product(p) if p.is_unit())
    }
}

impl From<AlgebraicType> for SumTypeVariant {
    fn from(ty: AlgebraicType) -> Self {
        Self::new(ty, None)
    }
}

impl<'a> From<(&'a str, AlgebraicType)> for SumTypeVariant {
    fn from((name, ty): (&'a str, AlgebraicType)) -> Self {
        Self::new_named(ty, name)
    }
}

impl Serialize for SumTypeVariant {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.name.serialize(writer);
        self.algebraic_type.serialize(writer);
    }
}

impl Deserialize for SumTypeVariant {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        let name = Deserialize::deserialize(de)?;
        let algebraic_type = Deserialize::deserialize(de)?;
        Ok(Self { name, algebraic_type })
    }
}
