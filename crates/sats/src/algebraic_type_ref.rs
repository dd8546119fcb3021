use core::fmt;

use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};

/// A reference to an [`AlgebraicType`](crate::AlgebraicType)
/// within a [`Typespace`](crate::Typespace).
///
/// A reference is the index of the type in the typespace's ordered vector.
/// References are the only way to build recursive or shared types;
/// they are stable for the lifetime of a module descriptor
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlgebraicTypeRef(pub u32);

impl AlgebraicTypeRef {
    /// Returns the reference as a plain index into a typespace.
    pub const fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AlgebraicTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same notation as the SATS text format.
        write!(f, "&{}", self.0)
    }
}

impl Serialize for AlgebraicTypeRef {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.0.serialize(writer);
    }
}

impl Deserialize for AlgebraicTypeRef {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        u32::deserialize(de).map(Self)
    }
}
