use core::fmt;
use core::ops::{Add, Sub};
use std::time::Duration;

use crate::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use crate::buffer::{BufReader, BufWriter};
use crate::TimeDuration;

/// A point in time, measured in microseconds since the UNIX epoch.
///
/// On the wire this is the special single-field product
/// `{ __timestamp_micros_since_unix_epoch__: I64 }`,
/// which encodes as the bare `i64`.
///
/// Reducers should not reach for the system clock;
/// the timestamp of the current invocation is carried on the context
/// the host hands to every call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    micros_since_unix_epoch: i64,
}

impl Timestamp {
    /// The timestamp 0 microseconds since the UNIX epoch.
    pub const UNIX_EPOCH: Self = Self {
        micros_since_unix_epoch: 0,
    };

    /// Returns a timestamp `micros` microseconds since the UNIX epoch.
    pub const fn from_micros_since_unix_epoch(micros: i64) -> Self {
        Self {
            micros_since_unix_epoch: micros,
        }
    }

    /// Returns the number of microseconds since the UNIX epoch.
    pub const fn to_micros_since_unix_epoch(self) -> i64 {
        self.micros_since_unix_epoch
    }

    /// Returns the absolute difference between this and an `earlier`
    /// timestamp as a `Duration`.
    ///
    /// Returns an error holding the magnitude when `earlier >= self`.
    pub fn duration_since(&self, earlier: Timestamp) -> Result<Duration, Duration> {
        let micros = self.micros_since_unix_epoch.abs_diff(earlier.micros_since_unix_epoch);
        let dur = Duration::from_micros(micros);
        if earlier < *self {
            Ok(dur)
        } else {
            Err(dur)
        }
    }

    /// Returns a timestamp with `duration` added, or `None` on overflow.
    pub fn checked_add(&self, duration: TimeDuration) -> Option<Self> {
        self.micros_since_unix_epoch
            .checked_add(duration.to_micros())
            .map(Self::from_micros_since_unix_epoch)
    }

    /// Returns a timestamp with `duration` subtracted, or `None` on overflow.
    pub fn checked_sub(&self, duration: TimeDuration) -> Option<Self> {
        self.micros_since_unix_epoch
            .checked_sub(duration.to_micros())
            .map(Self::from_micros_since_unix_epoch)
    }
}

impl Add<TimeDuration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TimeDuration) -> Self::Output {
        self.checked_add(rhs).expect("overflow when adding duration to timestamp")
    }
}

impl Sub<TimeDuration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: TimeDuration) -> Self::Output {
        self.checked_sub(rhs)
            .expect("underflow when subtracting duration from timestamp")
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        self + TimeDuration::from_duration(rhs)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        self - TimeDuration::from_duration(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us since epoch", self.micros_since_unix_epoch)
    }
}

impl Serialize for Timestamp {
    fn serialize(&self, writer: &mut impl BufWriter) {
        self.micros_since_unix_epoch.serialize(writer);
    }
}

impl Deserialize for Timestamp {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        i64::deserialize(de).map(Self::from_micros_since_unix_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_round_trips() {
        let ts = Timestamp::from_micros_since_unix_epoch(1_000_000);
        let dur = TimeDuration::from_micros(250);
        assert_eq!((ts + dur) - dur, ts);
        assert_eq!((ts + dur).duration_since(ts), Ok(Duration::from_micros(250)));
        assert_eq!(ts.duration_since(ts + dur), Err(Duration::from_micros(250)));
    }

    #[test]
    fn negative_duration_reported_as_err() {
        assert_eq!(
            TimeDuration::from_micros(-5).to_duration(),
            Err(Duration::from_micros(5))
        );
        assert_eq!(TimeDuration::from_micros(5).to_duration(), Ok(Duration::from_micros(5)));
    }
}
