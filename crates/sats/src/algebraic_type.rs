use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::{AlgebraicTypeRef, ProductType, SumType, SumTypeVariant};

/// The type of an array, holding the element type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ArrayType {
    /// The type of the elements of the array.
    pub elem_ty: Box<AlgebraicType>,
}

impl ArrayType {
    /// Returns the type of an array with elements of type `elem_ty`.
    pub fn new(elem_ty: AlgebraicType) -> Self {
        Self {
            elem_ty: Box::new(elem_ty),
        }
    }
}

/// The type of a value in the algebraic type system:
/// a primitive, a string, an array, a product, a sum,
/// or a reference to another type in a typespace.
///
/// References are the only way to share or recurse;
/// module-declared structs and enums register themselves in the typespace
/// and occur as `Ref`s wherever they are used as field or variant types.
///
/// The type is itself BSATN-encodable, tagged as enumerated below;
/// that encoding is what the module descriptor's typespace is made of.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum AlgebraicType {
    /// A reference to a type in the typespace, tag 0.
    Ref(AlgebraicTypeRef),
    /// A sum type, tag 1.
    Sum(SumType),
    /// A product type, tag 2.
    Product(ProductType),
    /// An array type, tag 3.
    Array(ArrayType),
    /// A UTF-8 string, tag 4.
    String,
    /// A boolean, tag 5.
    Bool,
    /// A signed 8-bit integer, tag 6.
    I8,
    /// An unsigned 8-bit integer, tag 7.
    U8,
    /// A signed 16-bit integer, tag 8.
    I16,
    /// An unsigned 16-bit integer, tag 9.
    U16,
    /// A signed 32-bit integer, tag 10.
    I32,
    /// An unsigned 32-bit integer, tag 11.
    U32,
    /// A signed 64-bit integer, tag 12.
    I64,
    /// An unsigned 64-bit integer, tag 13.
    U64,
    /// A signed 128-bit integer, tag 14.
    I128,
    /// An unsigned 128-bit integer, tag 15.
    U128,
    /// A signed 256-bit integer, tag 16.
    I256,
    /// An unsigned 256-bit integer, tag 17.
    U256,
    /// An IEEE-754 single-precision float, tag 18.
    F32,
    /// An IEEE-754 double-precision float, tag 19.
    F64,
}

impl AlgebraicType {
    /// Returns the unit type, i.e., the empty product.
    pub fn unit() -> Self {
        Self::Product(ProductType::unit())
    }

    /// Returns a product type with the given `elements`.
    pub fn product<P: Into<ProductType>>(elements: P) -> Self {
        Self::Product(elements.into())
    }

    /// Returns a sum type with the given `variants`.
    pub fn sum<S: Into<SumType>>(variants: S) -> Self {
        Self::Sum(variants.into())
    }

    /// Returns an array type with elements of type `elem_ty`.
    pub fn array(elem_ty: Self) -> Self {
        Self::Array(ArrayType::new(elem_ty))
    }

    /// Returns the canonical option type over `some_type`:
    /// the two-variant sum `some(T) | none`.
    pub fn option(some_type: Self) -> Self {
        Self::sum([
            SumTypeVariant::new_named(some_type, SumType::OPTION_SOME_TAG),
            SumTypeVariant::unit(SumType::OPTION_NONE_TAG),
        ])
    }

    /// Returns a sum of payload-less variants with the given `names`.
    pub fn simple_enum<'a>(names: impl Iterator<Item = &'a str>) -> Self {
        Self::sum(SumType::new(names.map(SumTypeVariant::unit).collect()))
    }

    /// Returns the byte-blob type, an array of `U8`.
    pub fn bytes() -> Self {
        Self::array(Self::U8)
    }

    /// Returns the special identity type,
    /// a product with a single `U256` field named `__identity__`.
    pub fn identity() -> Self {
        Self::product([(ProductType::IDENTITY_TAG, Self::U256)])
    }

    /// Returns the special connection-id type,
    /// a product with a single `U128` field named `__connection_id__`.
    pub fn connection_id() -> Self {
        Self::product([(ProductType::CONNECTION_ID_TAG, Self::U128)])
    }

    /// Returns the special timestamp type, a product with a single `I64`
    /// field named `__timestamp_micros_since_unix_epoch__`.
    pub fn timestamp() -> Self {
        Self::product([(ProductType::TIMESTAMP_TAG, Self::I64)])
    }

    /// Returns the special time-duration type, a product with a single
    /// `I64` field named `__time_duration_micros__`.
    pub fn time_duration() -> Self {
        Self::product([(ProductType::TIME_DURATION_TAG, Self::I64)])
    }

    /// Returns the `ScheduleAt` sum type,
    /// `Interval(TimeDuration) | Time(Timestamp)`.
    pub fn schedule_at() -> Self {
        Self::sum([
            ("Interval", Self::time_duration()),
            ("Time", Self::timestamp()),
        ])
    }

    /// Returns this type as a product type, if it is one.
    pub fn as_product(&self) -> Option<&ProductType> {
        match self {
            Self::Product(p) => Some(p),
            _ => None,
        }
    }

    /// Returns this type as a sum type, if it is one.
    pub fn as_sum(&self) -> Option<&SumType> {
        match self {
            Self::Sum(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this type as a type reference, if it is one.
    pub fn as_ref(&self) -> Option<AlgebraicTypeRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns whether this is the unit type.
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Product(p) if p.is_unit())
    }

    /// Returns whether this is one of the special product types
    /// recognized by sentinel field names.
    pub fn is_special(&self) -> bool {
        matches!(self, Self::Product(p) if p.is_special())
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Ref(_) => 0,
            Self::Sum(_) => 1,
            Self::Product(_) => 2,
            Self::Array(_) => 3,
            Self::String => 4,
            Self::Bool => 5,
            Self::I8 => 6,
            Self::U8 => 7,
            Self::I16 => 8,
            Self::U16 => 9,
            Self::I32 => 10,
            Self::U32 => 11,
            Self::I64 => 12,
            Self::U64 => 13,
            Self::I128 => 14,
            Self::U128 => 15,
            Self::I256 => 16,
            Self::U256 => 17,
            Self::F32 => 18,
            Self::F64 => 19,
        }
    }
}

impl Serialize for AlgebraicType {
    fn serialize(&self, writer: &mut impl BufWriter) {
        writer.put_u8(self.tag());
        match self {
            Self::Ref(r) => r.serialize(writer),
            Self::Sum(sum) => sum.serialize(writer),
            Self::Product(prod) => prod.serialize(writer),
            Self::Array(array) => array.elem_ty.serialize(writer),
            _ => {}
        }
    }
}

impl Deserialize for AlgebraicType {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        let tag = de.sum_tag("AlgebraicType", 20)?;
        match tag {
            0 => Deserialize::deserialize(de).map(Self::Ref),
            1 => de.nested(|de| Deserialize::deserialize(de).map(Self::Sum)),
            2 => de.nested(|de| Deserialize::deserialize(de).map(Self::Product)),
            3 => de.nested(|de| Deserialize::deserialize(de).map(Self::array)),
            4 => Ok(Self::String),
            5 => Ok(Self::Bool),
            6 => Ok(Self::I8),
            7 => Ok(Self::U8),
            8 => Ok(Self::I16),
            9 => Ok(Self::U16),
            10 => Ok(Self::I32),
            11 => Ok(Self::U32),
            12 => Ok(Self::I64),
            13 => Ok(Self::U64),
            14 => Ok(Self::I128),
            15 => Ok(Self::U128),
            16 => Ok(Self::I256),
            17 => Ok(Self::U256),
            18 => Ok(Self::F32),
            19 => Ok(Self::F64),
            _ => unreachable!("tag already validated against the variant count"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsatn;

    #[test]
    fn primitive_tags_match_wire_numbering() {
        assert_eq!(bsatn::to_vec(&AlgebraicType::String), [4]);
        assert_eq!(bsatn::to_vec(&AlgebraicType::Bool), [5]);
        assert_eq!(bsatn::to_vec(&AlgebraicType::I8), [6]);
        assert_eq!(bsatn::to_vec(&AlgebraicType::U8), [7]);
        assert_eq!(bsatn::to_vec(&AlgebraicType::F64), [19]);
        assert_eq!(
            bsatn::to_vec(&AlgebraicType::Ref(AlgebraicTypeRef(7))),
            [0, 7, 0, 0, 0]
        );
    }

    #[test]
    fn unit_is_empty_product() {
        // Tag 2 (product) followed by a zero element count.
        assert_eq!(bsatn::to_vec(&AlgebraicType::unit()), [2, 0, 0, 0, 0]);
        assert!(AlgebraicType::unit().is_unit());
    }

    #[test]
    fn option_type_is_canonical_sum() {
        let opt = AlgebraicType::option(AlgebraicType::U8);
        let sum = opt.as_sum().unwrap();
        assert_eq!(sum.as_option(), Some(&AlgebraicType::U8));
        // Tag 1 (sum), two variants; names ride as Option<String>
        // with 0 = present, matching the value-position convention.
        let bytes = bsatn::to_vec(&opt);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], [2, 0, 0, 0]);
        assert_eq!(bytes[5], 0); // "some" name present
    }

    #[test]
    fn special_types_recognized() {
        assert!(AlgebraicType::identity().is_special());
        assert!(AlgebraicType::connection_id().is_special());
        assert!(AlgebraicType::timestamp().is_special());
        assert!(AlgebraicType::time_duration().is_special());
        assert!(!AlgebraicType::product([("x", AlgebraicType::U256)]).is_special());
    }

    #[test]
    fn type_encoding_round_trips() {
        let ty = AlgebraicType::product([
            ("id", AlgebraicType::U32),
            ("tags", AlgebraicType::array(AlgebraicType::String)),
            ("parent", AlgebraicType::option(AlgebraicType::Ref(AlgebraicTypeRef(0)))),
        ]);
        let bytes = bsatn::to_vec(&ty);
        assert_eq!(bsatn::from_slice::<AlgebraicType>(&bytes).unwrap(), ty);
    }

    #[test]
    fn deeply_nested_type_hits_recursion_cap() {
        let mut ty = AlgebraicType::U8;
        for _ in 0..200 {
            ty = AlgebraicType::array(ty);
        }
        let bytes = bsatn::to_vec(&ty);
        assert!(matches!(
            bsatn::from_slice::<AlgebraicType>(&bytes),
            Err(DecodeError::TooDeep { .. })
        ));
    }
}
