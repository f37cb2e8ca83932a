//! Session stamps (`HH_MM_SS_DD_MM_YYYY`)

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::RecorderError;

const STAMP_FORMAT: &str = "%H_%M_%S_%d_%m_%Y";
const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Local wall-clock time a session started, used to name its artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionStamp(NaiveDateTime);

impl SessionStamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Sub-second precision is dropped
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.with_nanosecond(0).unwrap_or(datetime))
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// `DD/MM/YYYY HH:MM:SS`
    pub fn display_time(&self) -> String {
        self.0.format(DISPLAY_FORMAT).to_string()
    }
}

impl fmt::Display for SessionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(STAMP_FORMAT))
    }
}

impl FromStr for SessionStamp {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, STAMP_FORMAT)
            .map(Self)
            .map_err(|_| RecorderError::InvalidStamp(s.to_string()))
    }
}

impl TryFrom<String> for SessionStamp {
    type Error = RecorderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionStamp> for String {
    fn from(stamp: SessionStamp) -> Self {
        stamp.to_string()
    }
}
