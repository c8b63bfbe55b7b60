use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// A byte count read from configuration, either a plain number or a string such as `"4mb"`.
///
/// Units are case-insensitive and 1024-based: `b`, `kb`, `mb`, `gb` (an optional
/// `i`, as in `MiB`, is accepted). Fractions are allowed, `"1.5mb"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid byte size: {input:?}")]
pub struct ParseByteSizeError {
    input: String,
    #[source]
    source: Option<ParseFloatError>,
}

impl ParseByteSizeError {
    fn new(input: &str) -> Self {
        Self { input: input.to_owned(), source: None }
    }

    /// The rejected input, as it was given.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl ByteSize {
    pub const fn b(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn kib(kib: u64) -> Self {
        Self(kib * KIB)
    }

    pub const fn mib(mib: u64) -> Self {
        Self(mib * MIB)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            n if n >= GIB && n % GIB == 0 => write!(f, "{}gb", n / GIB),
            n if n >= MIB && n % MIB == 0 => write!(f, "{}mb", n / MIB),
            n if n >= KIB && n % KIB == 0 => write!(f, "{}kb", n / KIB),
            n => write!(f, "{n}b"),
        }
    }
}

impl FromStr for ByteSize {
    type Err = ParseByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseByteSizeError::new(s);

        let trimmed = s.trim();
        let split = trimmed.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "m" | "mb" | "mib" => MIB,
            "g" | "gb" | "gib" => GIB,
            _ => return Err(error()),
        };

        if let Ok(whole) = number.parse::<u64>() {
            return whole.checked_mul(multiplier).map(ByteSize).ok_or_else(error);
        }

        let fraction = number
            .parse::<f64>()
            .map_err(|e| ParseByteSizeError { source: Some(e), ..ParseByteSizeError::new(s) })?;
        let bytes = (fraction * multiplier as f64).floor();
        if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
            return Err(error());
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "range checked above")]
        let bytes = bytes as u64;
        Ok(ByteSize(bytes))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ByteSizeVisitor;

        impl Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a number of bytes or a size string like \"4mb\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v).map(ByteSize).map_err(|e| E::custom(format_args!("invalid byte size {v}: {e}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}
