#[cfg(feature = "bincode")]
pub mod bincode;
pub mod article;
pub mod message;
pub mod relative_time;

use std::{fmt, str};

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub use self::article::{Article, RawArticle};
pub use self::message::ServerMessage;

/// A point in time, in seconds since the unix epoch (UTC)
///
/// On the wire it is an RFC 3339 string, e.g. `2024-05-01T12:00:00Z`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub fn now() -> Self {
        Self::from(OffsetDateTime::now_utc())
    }

    pub fn saturating_sub_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// `None` if the value does not fit the calendar `time` can represent
    pub fn to_offset_date_time(self) -> Option<OffsetDateTime> {
        let secs = i64::try_from(self.0).ok()?;
        OffsetDateTime::from_unix_timestamp(secs).ok()
    }

    pub fn to_rfc3339(self) -> Option<String> {
        self.to_offset_date_time()?.format(&Rfc3339).ok()
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

/// Instants before the epoch collapse to [`Timestamp::ZERO`]
impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(u64::try_from(value.unix_timestamp()).unwrap_or_default())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(s) => f.write_str(&s),
            None => write!(f, "@{}", self.0),
        }
    }
}

impl str::FromStr for Timestamp {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(OffsetDateTime::parse(s, &Rfc3339)?))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = self
            .to_rfc3339()
            .ok_or_else(|| S::Error::custom("timestamp out of range"))?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
