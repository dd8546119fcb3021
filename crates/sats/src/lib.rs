//! The SpacetimeDB Algebraic Type System.
//!
//! Defines the in-memory model of algebraic types
//! ([`AlgebraicType`], [`ProductType`], [`SumType`], [`Typespace`]),
//! the BSATN binary codec over them ([`bsatn`], [`buffer`]),
//! and the [`SpacetimeType`] trait that connects Rust types to the model.
//!
//! Everything that crosses the guest/host boundary
//! (the module descriptor, reducer arguments, and row payloads)
//! is BSATN produced and consumed by this crate.

pub mod algebraic_type;
pub mod algebraic_type_ref;
pub mod bsatn;
pub mod buffer;
pub mod product_type;
pub mod product_type_element;
pub mod spacetime_type;
pub mod sum_type;
pub mod sum_type_variant;
pub mod time_duration;
pub mod timestamp;
pub mod typespace;

pub use algebraic_type::{AlgebraicType, ArrayType};
pub use algebraic_type_ref::AlgebraicTypeRef;
pub use bsatn::{Deserialize, Serialize};
pub use buffer::DecodeError;
pub use product_type::ProductType;
pub use product_type_element::ProductTypeElement;
pub use spacetime_type::SpacetimeType;
pub use sum_type::SumType;
pub use sum_type_variant::SumTypeVariant;
pub use time_duration::TimeDuration;
pub use timestamp::Timestamp;
pub use typespace::{Typespace, TypespaceBuilder};

pub use ethnum::{i256, u256};
