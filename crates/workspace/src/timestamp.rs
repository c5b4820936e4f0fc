use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// `YYYY-MM-DD HH:MM:SS`, the layout stored in `metadata.json`.
const METADATA_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Wall-clock timestamp with second precision, as recorded in workspace metadata.
/// 以秒為精度的本地時間戳記，對應工作區中繼資料的格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    /// Current local time; falls back to UTC when the local offset is unknown.
    pub fn now() -> Self {
        Self::from_offset(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let utc = OffsetDateTime::from(time);
        let local = UtcOffset::current_local_offset()
            .map(|offset| utc.to_offset(offset))
            .unwrap_or(utc);
        Self::from_offset(local)
    }

    fn from_offset(value: OffsetDateTime) -> Self {
        let time = value.time();
        let time = time.replace_nanosecond(0).unwrap_or(time);
        Self(PrimitiveDateTime::new(value.date(), time))
    }

    pub fn parse(text: &str) -> Result<Self, time::error::Parse> {
        PrimitiveDateTime::parse(text.trim(), METADATA_FORMAT).map(Self)
    }

    pub fn as_datetime(&self) -> PrimitiveDateTime {
        self.0
    }
}

impl From<PrimitiveDateTime> for Timestamp {
    fn from(value: PrimitiveDateTime) -> Self {
        let time = value.time();
        Self(value.replace_time(time.replace_nanosecond(0).unwrap_or(time)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.0.format(METADATA_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl FromStr for Timestamp {
    type Err = time::error::Parse;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse(&text)
            .map_err(|err| D::Error::custom(format!("invalid timestamp '{text}': {err}")))
    }
}
