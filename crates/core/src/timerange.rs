//! Time range parsing for trimmed downloads.
//!
//! Accepted forms are `START-STOP`, `START-`, `-STOP` and a bare `STOP`.
//! Each offset is either clock notation (`1:30`, `00:01:30.500`) or a sum of
//! unit suffixed values (`1m30s`, `250ms`, `2h`); a plain number is seconds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("Invalid time offset: {0}")]
    InvalidOffset(String),

    #[error("Time range stop {stop:?} is not after start {start:?}")]
    StopBeforeStart { start: Duration, stop: Duration },
}

/// A start offset and optional stop offset into a media stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Duration,
    /// `None` means until the end of the stream.
    pub stop: Option<Duration>,
}

impl TimeRange {
    pub fn new(start: Duration, stop: Option<Duration>) -> Result<Self, TimeRangeError> {
        if let Some(stop) = stop {
            if stop <= start {
                return Err(TimeRangeError::StopBeforeStart { start, stop });
            }
        }
        Ok(Self { start, stop })
    }

    /// Range from the beginning up to `stop`.
    pub fn until(stop: Duration) -> Self {
        Self {
            start: Duration::ZERO,
            stop: Some(stop),
        }
    }

    /// Whether this range covers the whole stream.
    pub fn is_full(&self) -> bool {
        self.start.is_zero() && self.stop.is_none()
    }

    /// Length of the range, if it has a stop.
    pub fn duration(&self) -> Option<Duration> {
        self.stop.map(|stop| stop.saturating_sub(self.start))
    }
}

impl FromStr for TimeRange {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((start, stop)) => {
                if start.trim().is_empty() && stop.trim().is_empty() {
                    return Err(TimeRangeError::InvalidOffset(s.to_string()));
                }
                let start = if start.trim().is_empty() {
                    Duration::ZERO
                } else {
                    parse_offset(start)?
                };
                let stop = if stop.trim().is_empty() {
                    None
                } else {
                    Some(parse_offset(stop)?)
                };
                TimeRange::new(start, stop)
            }
            None => TimeRange::new(Duration::ZERO, Some(parse_offset(s)?)),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", format_seconds(self.start))?;
        if let Some(stop) = self.stop {
            write!(f, "{}", format_seconds(stop))?;
        }
        Ok(())
    }
}

/// Formats a duration as fractional seconds, the way the engine expects it.
pub fn format_seconds(d: Duration) -> String {
    let millis = d.subsec_millis();
    if millis == 0 {
        format!("{}", d.as_secs())
    } else {
        format!("{}.{:03}", d.as_secs(), millis)
    }
}

fn parse_offset(s: &str) -> Result<Duration, TimeRangeError> {
    let s = s.trim();
    let invalid = || TimeRangeError::InvalidOffset(s.to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    if s.contains(':') {
        let mut total = 0.0f64;
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }
        for part in parts {
            let value: f64 = part.parse().map_err(|_| invalid())?;
            if !value.is_finite() || value < 0.0 {
                return Err(invalid());
            }
            total = total * 60.0 + value;
        }
        return seconds(total).ok_or_else(invalid);
    }

    if let Ok(secs) = s.parse::<f64>() {
        return seconds(secs).ok_or_else(invalid);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            _ => return Err(invalid()),
        };
        let part = seconds(value * factor).ok_or_else(invalid)?;
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}

/// Converts fractional seconds, rejecting negative, non-finite and
/// out-of-range values.
fn seconds(secs: f64) -> Option<Duration> {
    if !secs.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
