//! Time zone used when rendering timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use thiserror::Error;

/// Zone in which timestamps are rendered. Defaults to the system's local zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time zone `{0}`, expected `local`, `utc`, or an offset like `+0200` or `-05:30`")]
pub struct ZoneParseError(String);

impl Zone {
    pub fn utc() -> Self {
        Zone::Fixed(Utc.fix())
    }

    /// Render `instant` in this zone using a `chrono` strftime pattern.
    pub fn format(&self, instant: DateTime<Utc>, pattern: &str) -> String {
        match self {
            Zone::Local => instant.with_timezone(&Local).format(pattern).to_string(),
            Zone::Fixed(offset) => instant.with_timezone(offset).format(pattern).to_string(),
        }
    }
}

impl FromStr for Zone {
    type Err = ZoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ZoneParseError(s.to_string());
        match s {
            "local" | "Local" => return Ok(Zone::Local),
            "utc" | "UTC" | "Z" => return Ok(Zone::utc()),
            _ => {}
        }

        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = match rest.len() {
            4 => rest.to_string(),
            5 if rest.as_bytes()[2] == b':' => rest.replacen(':', "", 1),
            _ => return Err(invalid()),
        };
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Zone::Fixed)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => f.write_str("local"),
            Zone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}
