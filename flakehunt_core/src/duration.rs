//! Human-readable durations in the `1h30m`, `1.5s`, `250ms` notation, both
//! for parsing flags and for the progress line.

use crate::config::ConfigError;
use std::fmt;
use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parses durations such as `10m`, `1.5s`, `250ms` or `1h30m`. A bare number
/// is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let s = input.trim();
    if s.is_empty() {
        return Err(invalid("empty duration"));
    }
    if let Ok(secs) = s.parse::<f64>() {
        return scaled(secs, NANOS_PER_SEC as f64)
            .ok_or_else(|| invalid("must be a non-negative number"));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail.find(is_numeric).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if number.is_empty() {
            return Err(invalid("expected a number"));
        }
        if unit.is_empty() {
            return Err(invalid("missing unit"));
        }

        let value: f64 = number.parse().map_err(|_| invalid("not a number"))?;
        let per_unit = unit_nanos(unit)
            .ok_or_else(|| invalid("unknown unit, expected ns, us, ms, s, m or h"))?;
        let part = scaled(value, per_unit).ok_or_else(|| invalid("out of range"))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| invalid("out of range"))?;
        rest = tail;
    }
    Ok(total)
}

fn is_numeric(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return None,
    };
    Some(nanos)
}

fn scaled(value: f64, nanos_per_unit: f64) -> Option<Duration> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let nanos = (value * nanos_per_unit).round();
    (nanos < u64::MAX as f64).then(|| Duration::from_nanos(nanos as u64))
}

/// Displays a duration the way the progress line shows it: `1m30s`,
/// `1h0m0s`, `1.5ms`, `250µs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.as_nanos();
        if nanos == 0 {
            return write!(f, "0s");
        }
        if nanos < NANOS_PER_MICRO {
            return write!(f, "{nanos}ns");
        }
        if nanos < NANOS_PER_MILLI {
            write_fraction(f, nanos, NANOS_PER_MICRO)?;
            return write!(f, "µs");
        }
        if nanos < NANOS_PER_SEC {
            write_fraction(f, nanos, NANOS_PER_MILLI)?;
            return write!(f, "ms");
        }

        let secs = nanos / NANOS_PER_SEC;
        let (hours, minutes) = (secs / 3600, secs / 60 % 60);
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        write_fraction(f, nanos % (60 * NANOS_PER_SEC), NANOS_PER_SEC)?;
        write!(f, "s")
    }
}

/// Writes `nanos / unit` with its fractional digits, trailing zeros dropped.
fn write_fraction(f: &mut fmt::Formatter<'_>, nanos: u128, unit: u128) -> fmt::Result {
    write!(f, "{}", nanos / unit)?;
    let frac = nanos % unit;
    if frac == 0 {
        return Ok(());
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    write!(f, ".{}", digits.trim_end_matches('0'))
}
