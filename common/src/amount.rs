use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CodecError;

/// Number of decimals of the native coin.
pub const DECIMALS: u32 = 9;
const UNIT: u64 = 1_000_000_000;

/// Coin amount, stored in nanoMAS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Whole coins, e.g. `Amount::from_mas(2)` is 2 MAS.
    pub fn from_mas(mas: u64) -> Option<Self> {
        mas.checked_mul(UNIT).map(Self)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl FromStr for Amount {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| CodecError::InvalidAmount {
            input: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        if trimmed.starts_with('-') {
            return Err(invalid("negative"));
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("not a decimal number"));
        }
        if fraction.len() > DECIMALS as usize {
            return Err(invalid("more than 9 decimals"));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| CodecError::AmountOverflow)?
        };
        // Right-pad the fraction to nanoMAS
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = DECIMALS as usize);
            padded.parse().map_err(|_| invalid("not a decimal number"))?
        };

        whole
            .checked_mul(UNIT)
            .and_then(|raw| raw.checked_add(fraction))
            .map(Amount)
            .ok_or(CodecError::AmountOverflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let fraction = self.0 % UNIT;
        if fraction == 0 {
            return write!(f, "{}", whole);
        }
        let fraction = format!("{:09}", fraction);
        write!(f, "{}.{}", whole, fraction.trim_end_matches('0'))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
