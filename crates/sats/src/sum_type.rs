use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::SumTypeVariant;

/// A structural sum type: an ordered sequence of named variants.
///
/// Tagged unions, enums, and `Option` are all sums.
/// A sum value is encoded as a one-byte variant tag
/// (the variant's index in this sequence)
/// followed by the variant's payload.
///
/// Sums with payload-less variants keep this framing:
/// an enum-like sum still encodes as its tag byte plus a unit payload,
/// never as a bare promoted integer outside the sum framing.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct SumType {
    /// The variants of the sum type.
    pub variants: Box<[SumTypeVariant]>,
}

impl SumType {
    /// The variant name for the payload-carrying arm of an option sum.
    pub const OPTION_SOME_TAG: &'static str = "some";
    /// The variant name for the empty arm of an option sum.
    pub const OPTION_NONE_TAG: &'static str = "none";

    /// Returns a sum type with the given `variants`.
    pub fn new(variants: Box<[SumTypeVariant]>) -> Self {
        Self { variants }
    }

    /// Returns whether this is the canonical option sum,
    /// i.e. `some(T) | none` in that order,
    /// and if so, the payload type wrapped by `some`.
    pub fn as_option(&self) -> Option<&crate::AlgebraicType> {
        match &*self.variants {
            [some, none]
                if some.has_name(Self::OPTION_SOME_TAG) && none.has_name(Self::OPTION_NONE_TAG) && none.is_unit() =>
            {
                Some(&some.algebraic_type)
            }
            _ => None,
        }
    }

    /// Returns whether every variant is payload-less.
    pub fn is_simple_enum(&self) -> bool {
        self.variants.iter().all(SumTypeVariant::is_unit)
    }
}

impl<V: Into<SumTypeVariant>, const N: usize> From<[V; N]> for SumType {
    fn from(variants: [V; N]) -> Self {
        Self::new(variants.map(Into::into).into())
    }
}

impl Serialize for SumType {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.variants.serialize(writer);
    }
}

impl Deserialize for SumType {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        Deserialize::deserialize(de).map(Self::new)
    }
}
