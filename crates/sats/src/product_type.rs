use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::{AlgebraicType, ProductTypeElement};

/// A structural product type: an ordered sequence of optionally named factors.
///
/// Structs, tuples, and the unit type are all products.
/// A product value is encoded as each element in declaration order,
/// with no prefix and no separators.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct ProductType {
    /// The factors of the product type.
    pub elements: Box<[ProductTypeElement]>,
}

impl ProductType {
    /// The field name for the `U256` payload of an `Identity` product.
    pub const IDENTITY_TAG: &'static str = "__identity__";
    /// The field name for the `U128` payload of a `ConnectionId` product.
    pub const CONNECTION_ID_TAG: &'static str = "__connection_id__";
    /// The field name for the `I64` payload of a `Timestamp` product.
    pub const TIMESTAMP_TAG: &'static str = "__timestamp_micros_since_unix_epoch__";
    /// The field name for the `I64` payload of a `TimeDuration` product.
    pub const TIME_DURATION_TAG: &'static str = "__time_duration_micros__";

    /// Returns a product type with the given `elements` as factors.
    pub fn new(elements: Box<[ProductTypeElement]>) -> Self {
        Self { elements }
    }

    /// Returns the unit type, the product with no factors.
    pub fn unit() -> Self {
        Self::new([].into())
    }

    /// Returns whether this is the unit type.
    pub fn is_unit(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the number of factors, i.e., the arity of the product.
    pub fn arity(&self) -> usize {
        self.elements.len()
    }

    /// Returns whether this is a special single-field product
    /// wrapping `inner` under the sentinel field name `tag`.
    fn is_special_tag(&self, tag: &str, inner: &AlgebraicType) -> bool {
        match &*self.elements {
            [elem] => elem.has_name(tag) && &elem.algebraic_type == inner,
            _ => false,
        }
    }

    /// Returns whether this is the special `Identity` product.
    pub fn is_identity(&self) -> bool {
        self.is_special_tag(Self::IDENTITY_TAG, &AlgebraicType::U256)
    }

    /// Returns whether this is the special `ConnectionId` product.
    pub fn is_connection_id(&self) -> bool {
        self.is_special_tag(Self::CONNECTION_ID_TAG, &AlgebraicType::U128)
    }

    /// Returns whether this is the special `Timestamp` product.
    pub fn is_timestamp(&self) -> bool {
        self.is_special_tag(Self::TIMESTAMP_TAG, &AlgebraicType::I64)
    }

    /// Returns whether this is the special `TimeDuration` product.
    pub fn is_time_duration(&self) -> bool {
        self.is_special_tag(Self::TIME_DURATION_TAG, &AlgebraicType::I64)
    }

    /// Returns whether this is one of the special products
    /// recognized by sentinel field names.
    pub fn is_special(&self) -> bool {
        self.is_identity() || self.is_connection_id() || self.is_timestamp() || self.is_time_duration()
    }
}

impl<E: Into<ProductTypeElement>, const N: usize> From<[E; N]> for ProductType {
    fn from(elements: [E; N]) -> Self {
        Self::new(elements.map(Into::into).into())
    }
}

impl FromIterator<ProductTypeElement> for ProductType {
    fn from_iter<I: IntoIterator<Item = ProductTypeElement>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for ProductType {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.elements.serialize(writer);
    }
}

impl Deserialize for ProductType {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        Deserialize::deserialize(de).map(Self::new)
    }
}
