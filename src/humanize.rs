//! Human-readable size formatting and parsing utilities
//!
//! Units are decimal: `K` = 10^3, `M` = 10^6, `G` = 10^9, `T` = 10^12.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Size overflows: {0}")]
    Overflow(String),
}

/// Signed byte count with human-readable parsing
///
/// Negative values are meaningful to callers (for example "no limit"), so
/// they parse and serialize like any other number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub i64);

impl ByteSize {
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, i64)] = &[
            ("B", 1),
            ("KB", 1_000),
            ("MB", 1_000_000),
            ("GB", 1_000_000_000),
            ("TB", 1_000_000_000_000),
        ];

        let abs = self.0.unsigned_abs() as i64;
        let sign = if self.0 < 0 { "-" } else { "" };

        for &(unit, divisor) in UNITS.iter().rev() {
            if abs >= divisor {
                let value = abs / divisor;
                let decimal = (abs % divisor) * 10 / divisor;
                if decimal > 0 {
                    return format!("{}{}.{}{}", sign, value, decimal, unit);
                }
                return format!("{}{}{}", sign, value, unit);
            }
        }

        format!("{}B", self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"50M\", \"1G\") or integer")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                i64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom(format!("size {} overflows", v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        // Try to parse as plain number first
        if let Ok(num) = s.parse::<i64>() {
            return Ok(ByteSize(num));
        }

        let digits_start = usize::from(s.starts_with('-'));
        let (num_str, unit) = match s[digits_start..].find(|c: char| !c.is_ascii_digit()) {
            Some(pos) if pos > 0 => s.split_at(digits_start + pos),
            _ => return Err(ParseError::InvalidFormat(s.to_string())),
        };

        let num: i64 = num_str.parse()?;

        let multiplier: i64 = match unit.trim() {
            "B" => 1,
            "K" | "KB" => 1_000,
            "M" | "MB" => 1_000_000,
            "G" | "GB" => 1_000_000_000,
            "T" | "TB" => 1_000_000_000_000,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        num.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bytes() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_i64(), 1024);
        assert_eq!("1K".parse::<ByteSize>().unwrap().as_i64(), 1_000);
        assert_eq!("1k".parse::<ByteSize>().unwrap().as_i64(), 1_000);
        assert_eq!("100B".parse::<ByteSize>().unwrap().as_i64(), 100);
    }

    #[test]
    fn test_parse_decimal_units() {
        assert_eq!("50M".parse::<ByteSize>().unwrap().as_i64(), 50_000_000);
        assert_eq!("50MB".parse::<ByteSize>().unwrap().as_i64(), 50_000_000);
        assert_eq!("1G".parse::<ByteSize>().unwrap().as_i64(), 1_000_000_000);
        assert_eq!("2T".parse::<ByteSize>().unwrap().as_i64(), 2_000_000_000_000);
    }

    #[test]
    fn test_parse_negative_disables() {
        assert_eq!("-1".parse::<ByteSize>().unwrap().as_i64(), -1);
        assert_eq!("-2K".parse::<ByteSize>().unwrap().as_i64(), -2_000);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("M".parse::<ByteSize>(), Err(ParseError::InvalidFormat(_))));
        assert!(matches!("-".parse::<ByteSize>(), Err(ParseError::InvalidFormat(_))));
        assert!(matches!("10X".parse::<ByteSize>(), Err(ParseError::InvalidUnit(_))));
        assert!(matches!("10000000T".parse::<ByteSize>(), Err(ParseError::Overflow(_))));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(ByteSize(999).to_human_readable(), "999B");
        assert_eq!(ByteSize(1_000).to_human_readable(), "1KB");
        assert_eq!(ByteSize(1_500_000).to_human_readable(), "1.5MB");
        assert_eq!(ByteSize(50_000_000_000).to_human_readable(), "50GB");
        assert_eq!(ByteSize(-1).to_human_readable(), "-1B");
    }

    #[test]
    fn test_deserialize_string() {
        let json = r#"{"size": "10M"}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            size: ByteSize,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.size.as_i64(), 10_000_000);
    }

    #[test]
    fn test_deserialize_number() {
        let json = r#"{"size": -1}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            size: ByteSize,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.size.as_i64(), -1);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ByteSize(1_000)), "1KB");
        assert_eq!(format!("{}", ByteSize(5_000_000)), "5MB");
    }
}
