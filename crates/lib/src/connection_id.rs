use core::fmt;

use spacetimedb_sats::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use spacetimedb_sats::buffer::{BufReader, BufWriter};
use spacetimedb_sats::typespace::TypespaceBuilder;
use spacetimedb_sats::{AlgebraicType, SpacetimeType};

/// An ephemeral handle on one client connection.
///
/// In the type system this is the special single-field product
/// `{ __connection_id__: U128 }`, which encodes as the bare `u128`.
///
/// Unlike an [`Identity`](crate::Identity), a connection id does not
/// outlive the connection it names; the all-zero id stands for
/// "no connection", i.e., a reducer invoked by the module itself.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId {
    __connection_id__: u128,
}

impl ConnectionId {
    /// The all-zero connection id, interpreted as "no connection".
    pub const ZERO: Self = Self { __connection_id__: 0 };

    /// Returns a connection id with the given `u128` payload.
    pub const fn from_u128(val: u128) -> Self {
        Self { __connection_id__: val }
    }

    /// Returns the connection id's payload.
    pub const fn to_u128(self) -> u128 {
        self.__connection_id__
    }

    /// Returns a connection id from its little-endian byte representation,
    /// the byte order used across the host ABI.
    pub fn from_le_byte_array(bytes: [u8; 16]) -> Self {
        Self::from_u128(u128::from_le_bytes(bytes))
    }

    /// Returns the connection id's little-endian byte representation.
    pub fn as_le_byte_array(self) -> [u8; 16] {
        self.__connection_id__.to_le_bytes()
    }

    /// Returns `None` for the all-zero id and `Some(self)` otherwise.
    pub fn none_if_zero(self) -> Option<Self> {
        (self != Self::ZERO).then_some(self)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&hex::encode(self.__connection_id__.to_be_bytes()))
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({self})")
    }
}

impl SpacetimeType for ConnectionId {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::connection_id()
    }
}

impl Serialize for ConnectionId {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.__connection_id__.serialize(writer);
    }
}

impl Deserialize for ConnectionId {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        u128::deserialize(de).map(Self::from_u128)
    }
}
