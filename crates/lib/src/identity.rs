use core::fmt;

use spacetimedb_sats::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use spacetimedb_sats::buffer::{BufReader, BufWriter};
use spacetimedb_sats::typespace::TypespaceBuilder;
use spacetimedb_sats::{u256, AlgebraicType, SpacetimeType};

/// The persistent identity of a database actor: a caller, a module,
/// or the database itself.
///
/// In the type system this is the special single-field product
/// `{ __identity__: U256 }`, which encodes as the bare `u256`.
/// The host hands the caller's identity to every reducer invocation
/// as four little-endian `u64` pieces.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    __identity__: u256,
}

impl Identity {
    /// The all-zero identity.
    pub const ZERO: Self = Self {
        __identity__: u256::ZERO,
    };

    /// Returns an identity with the given `u256` payload.
    pub const fn from_u256(val: u256) -> Self {
        Self { __identity__: val }
    }

    /// Returns the identity's payload.
    pub const fn to_u256(self) -> u256 {
        self.__identity__
    }

    /// Returns an identity from its little-endian byte representation.
    ///
    /// This is the byte order used across the host ABI.
    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Self::from_u256(u256::from_le_bytes(bytes))
    }

    /// Returns the identity's little-endian byte representation.
    pub fn to_byte_array(self) -> [u8; 32] {
        self.__identity__.to_le_bytes()
    }

    #[doc(hidden)]
    pub fn __dummy() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Big-endian hex, so identities sort the way they read.
        f.pad(&hex::encode(self.__identity__.to_be_bytes()))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl SpacetimeType for Identity {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::identity()
    }
}

impl Serialize for Identity {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.__identity__.serialize(writer);
    }
}

impl Deserialize for Identity {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        u256::deserialize(de).map(Self::from_u256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb_sats::bsatn;

    #[test]
    fn byte_array_round_trip_is_little_endian() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xaa;
        bytes[31] = 0x01;
        let id = Identity::from_byte_array(bytes);
        assert_eq!(id.to_byte_array(), bytes);
        // The BSATN payload is the same little-endian bytes.
        assert_eq!(bsatn::to_vec(&id), bytes);
    }
}
