use core::fmt;
use std::time::Duration;

use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};

/// A signed duration measured in microseconds.
///
/// On the wire this is the special single-field product
/// `{ __time_duration_micros__: I64 }`,
/// which encodes as the bare `i64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeDuration {
    micros: i64,
}

impl TimeDuration {
    /// The zero-length duration.
    pub const ZERO: Self = Self { micros: 0 };

    /// Returns a duration of `micros` microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Returns the number of microseconds in this duration.
    pub const fn to_micros(self) -> i64 {
        self.micros
    }

    /// Returns a `TimeDuration` of the same length as `duration`.
    ///
    /// Panics if `duration`'s microseconds overflow an `i64`,
    /// some 292 millennia.
    pub fn from_duration(duration: Duration) -> Self {
        Self::from_micros(duration.as_micros().try_into().expect("duration overflows i64 micros"))
    }

    /// Returns this duration as a [`Duration`] if it is non-negative,
    /// or the magnitude as the error if it is negative.
    pub fn to_duration(self) -> Result<Duration, Duration> {
        let abs = Duration::from_micros(self.micros.unsigned_abs());
        if self.micros >= 0 {
            Ok(abs)
        } else {
            Err(abs)
        }
    }
}

impl From<Duration> for TimeDuration {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.micros)
    }
}

impl Serialize for TimeDuration {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.micros.serialize(writer);
    }
}

impl Deserialize for TimeDuration {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        i64::deserialize(de).map(Self::from_micros)
    }
}
