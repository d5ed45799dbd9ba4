use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

const S32_CHARS: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";
const TID_LEN: usize = 13;
const CLOCK_ID_BITS: u32 = 10;
const CLOCK_ID_MASK: u64 = (1 << CLOCK_ID_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 53) - 1;

/// Timestamp identifier: the sort and partition key of every entry.
///
/// A `Tid` packs a 53-bit microsecond timestamp and a 10-bit clock
/// identifier into a 64-bit value whose top bit is always zero:
///
/// ```text
/// 0 | timestamp_us (53 bits) | clock_id (10 bits)
/// ```
///
/// The string form is 13 characters of a sortable base32 alphabet, so
/// lexicographic order of the strings equals numeric order of the values,
/// which equals chronological order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(u64);

impl Tid {
    /// Build a TID from a microsecond timestamp and a clock id.
    ///
    /// Out-of-range bits are masked off.
    pub const fn new(timestamp_us: u64, clock_id: u16) -> Self {
        Self(((timestamp_us & TIMESTAMP_MASK) << CLOCK_ID_BITS) | (clock_id as u64 & CLOCK_ID_MASK))
    }

    /// The smallest possible TID.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Microseconds since the UNIX epoch.
    pub fn timestamp_us(&self) -> u64 {
        self.0 >> CLOCK_ID_BITS
    }

    /// Clock identifier of the writer that produced this TID.
    pub fn clock_id(&self) -> u16 {
        (self.0 & CLOCK_ID_MASK) as u16
    }

    /// The packed 64-bit value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns `true` if this TID sorts strictly before `other`.
    pub fn older_than(&self, other: &Self) -> bool {
        self < other
    }

    /// Returns `true` if this TID sorts strictly after `other`.
    pub fn newer_than(&self, other: &Self) -> bool {
        self > other
    }

    fn encode(&self) -> String {
        (0..TID_LEN)
            .map(|i| {
                let shift = 5 * (TID_LEN - 1 - i);
                S32_CHARS[((self.0 >> shift) & 31) as usize] as char
            })
            .collect()
    }

    fn decode(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidTid {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        if s.len() != TID_LEN {
            return Err(invalid("expected 13 characters"));
        }
        let mut value: u128 = 0;
        for byte in s.bytes() {
            let digit = S32_CHARS
                .iter()
                .position(|c| *c == byte)
                .ok_or_else(|| invalid("character outside the sortable base32 alphabet"))?;
            value = (value << 5) | digit as u128;
        }
        if value > i64::MAX as u128 {
            return Err(invalid("top bit must be zero"));
        }
        Ok(Self(value as u64))
    }
}

impl fmt::Debug for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tid({})", self.encode())
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Tid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Tid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Tid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Hands out strictly increasing TIDs for a single writer.
///
/// The wall clock may stall or step backwards; the clock then advances the
/// previous timestamp by one microsecond instead, so keys never repeat.
#[derive(Clone, Debug)]
pub struct TidClock {
    clock_id: u16,
    last: Option<Tid>,
}

impl TidClock {
    /// Create a clock for the given writer id (only the low 10 bits are used).
    pub fn new(clock_id: u16) -> Self {
        Self {
            clock_id,
            last: None,
        }
    }

    /// Resume a clock after `last`, e.g. the newest key already persisted.
    pub fn resume(clock_id: u16, last: Tid) -> Self {
        Self {
            clock_id,
            last: Some(last),
        }
    }

    /// Next TID for the current wall-clock time.
    pub fn next(&mut self) -> Tid {
        let now_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        self.next_at(now_us)
    }

    /// Next TID for an explicit timestamp.
    pub fn next_at(&mut self, timestamp_us: u64) -> Tid {
        let mut tid = Tid::new(timestamp_us, self.clock_id);
        if let Some(last) = self.last {
            if tid <= last {
                tid = Tid::new(last.timestamp_us() + 1, self.clock_id);
            }
        }
        self.last = Some(tid);
        tid
    }

    /// The most recently issued TID.
    pub fn last(&self) -> Option<Tid> {
        self.last
    }
}
