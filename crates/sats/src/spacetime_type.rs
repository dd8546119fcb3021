use ethnum::{i256, u256};

use crate::typespace::TypespaceBuilder;
use crate::{AlgebraicType, Timestamp, TimeDuration};

/// A type that has a counterpart in the algebraic type system.
///
/// Every table row type, every column type, and every reducer argument
/// type implements this; it is what lets the module descriptor spell out
/// the schema of everything crossing the host boundary.
///
/// Structs and enums declared by a module register themselves in the
/// typespace through the builder and return a `Ref`;
/// structural types (primitives, strings, arrays, options) are spelled
/// out inline.
pub trait SpacetimeType {
    /// Returns the algebraic type representing `Self`,
    /// registering named types into `ts` as needed.
    fn make_type<S: TypespaceBuilder>(ts: &mut S) -> AlgebraicType;
}

macro_rules! impl_primitives {
    ($($t:ty => $variant:ident,)*) => {
        $(impl SpacetimeType for $t {
            fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
                AlgebraicType::$variant
            }
        })*
    };
}

impl_primitives! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    i128 => I128,
    u128 => U128,
    i256 => I256,
    u256 => U256,
    f32 => F32,
    f64 => F64,
}

impl SpacetimeType for String {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::String
    }
}

impl SpacetimeType for Box<str> {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::String
    }
}

impl SpacetimeType for () {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::unit()
    }
}

impl<T: SpacetimeType> SpacetimeType for Vec<T> {
    fn make_type<S: TypespaceBuilder>(ts: &mut S) -> AlgebraicType {
        AlgebraicType::array(T::make_type(ts))
    }
}

impl<T: SpacetimeType> SpacetimeType for Box<[T]> {
    fn make_type<S: TypespaceBuilder>(ts: &mut S) -> AlgebraicType {
        AlgebraicType::array(T::make_type(ts))
    }
}

impl<T: SpacetimeType> SpacetimeType for Option<T> {
    fn make_type<S: TypespaceBuilder>(ts: &mut S) -> AlgebraicType {
        AlgebraicType::option(T::make_type(ts))
    }
}

impl SpacetimeType for Timestamp {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::timestamp()
    }
}

impl SpacetimeType for TimeDuration {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::time_duration()
    }
}
