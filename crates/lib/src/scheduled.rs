use std::time::Duration;

use spacetimedb_sats::bsatn::{Deserialize, DecodeError, Deserializer, Serialize};
use spacetimedb_sats::buffer::{BufReader, BufWriter};
use spacetimedb_sats::typespace::TypespaceBuilder;
use spacetimedb_sats::{AlgebraicType, SpacetimeType, TimeDuration, Timestamp};

/// When a scheduled reducer should fire.
///
/// Every scheduled table carries a column of this type;
/// inserting a row schedules an invocation of the table's reducer,
/// and deleting the row cancels it.
/// That makes scheduling transactional: if the inserting reducer
/// fails for any other reason, nothing was scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleAt {
    /// Fire in a loop, once every interval.
    Interval(TimeDuration),
    /// Fire once, at the given time.
    Time(Timestamp),
}

impl From<TimeDuration> for ScheduleAt {
    fn from(interval: TimeDuration) -> Self {
        Self::Interval(interval)
    }
}

impl From<Duration> for ScheduleAt {
    fn from(interval: Duration) -> Self {
        Self::Interval(interval.into())
    }
}

impl From<Timestamp> for ScheduleAt {
    fn from(time: Timestamp) -> Self {
        Self::Time(time)
    }
}

impl SpacetimeType for ScheduleAt {
    fn make_type<S: TypespaceBuilder>(_ts: &mut S) -> AlgebraicType {
        AlgebraicType::schedule_at()
    }
}

impl Serialize for ScheduleAt {
    fn serialize(&self, writer: &mut impl BufWriter) {
        match self {
            ScheduleAt::Interval(interval) => {
                writer.put_u8(0);
                interval.serialize(writer);
            }
            ScheduleAt::Time(time) => {
                writer.put_u8(1);
                time.serialize(writer);
            }
        }
    }
}

impl Deserialize for ScheduleAt {
    fn deserialize<'de, R: BufReader<'de>>(de: &mut Deserializer<'_, R>) -> Result<Self, DecodeError> {
        match de.sum_tag("ScheduleAt", 2)? {
            0 => Deserialize::deserialize(de).map(ScheduleAt::Interval),
            _ => Deserialize::deserialize(de).map(ScheduleAt::Time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb_sats::bsatn;

    #[test]
    fn schedule_at_framing() {
        let interval = ScheduleAt::Interval(TimeDuration::from_micros(10));
        let mut expected = vec![0u8];
        expected.extend_from_slice(&10i64.to_le_bytes());
        assert_eq!(bsatn::to_vec(&interval), expected);

        let time = ScheduleAt::Time(Timestamp::from_micros_since_unix_epoch(99));
        assert_eq!(bsatn::from_slice::<ScheduleAt>(&bsatn::to_vec(&time)).unwrap(), time);
    }
}
