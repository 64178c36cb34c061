use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Quantities are compared in nano-units (10^-9), the finest scale the
/// cluster runtime keeps.
const NANO_EXP: i64 = 9;

/// A resource amount in the cluster's quantity syntax (`10Gi`, `500m`, `4`).
///
/// Equality is by amount, not by spelling: `1Gi == 1024Mi`, `1 == 1000m`.
/// The original spelling is kept and written back unchanged.
#[derive(Debug, Clone)]
pub struct Quantity {
    raw: String,
    nanos: i128,
}

impl Quantity {
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim().to_string();
        let nanos = parse_nanos(&raw)?;
        Ok(Self { raw, nanos })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The amount in nano-units, rounded up when finer than that.
    pub fn nanos(&self) -> i128 {
        self.nanos
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl FromStr for Quantity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Quantity::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn parse_nanos(input: &str) -> Result<i128> {
    if input.is_empty() {
        bail!("quantity must not be empty");
    }

    let (negative, rest) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_len);
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));

    if int_part.is_empty() && frac_part.is_empty() {
        bail!("quantity '{}' has no digits", input);
    }
    if frac_part.contains('.') {
        bail!("quantity '{}' has more than one decimal point", input);
    }

    let too_large = || anyhow!("quantity '{}' is too large", input);

    let mut mantissa: i128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        let digit = i128::from(c.to_digit(10).ok_or_else(|| anyhow!("invalid digit in '{}'", input))?);
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(digit))
            .ok_or_else(too_large)?;
    }

    let (binary_shift, decimal_exp) = parse_suffix(suffix)
        .ok_or_else(|| anyhow!("quantity '{}' has unknown suffix '{}'", input, suffix))?;

    let scaled = mantissa
        .checked_mul(1i128 << binary_shift)
        .ok_or_else(too_large)?;
    let exp = NANO_EXP + decimal_exp - frac_part.len() as i64;
    let magnitude = scale_pow10(scaled, exp).ok_or_else(too_large)?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Returns `(power of two, power of ten)` for a suffix.
fn parse_suffix(suffix: &str) -> Option<(u32, i64)> {
    let parsed = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        _ => {
            let exp = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            (0, i64::from(exp.parse::<i32>().ok()?))
        }
    };
    Some(parsed)
}

/// `value * 10^exp` for a non-negative `value`, rounding up when `exp < 0`.
fn scale_pow10(value: i128, exp: i64) -> Option<i128> {
    if value == 0 {
        return Some(0);
    }
    if exp >= 0 {
        let factor = 10i128.checked_pow(u32::try_from(exp).ok()?)?;
        value.checked_mul(factor)
    } else {
        let divisor = match u32::try_from(-exp).ok().and_then(|e| 10i128.checked_pow(e)) {
            Some(d) => d,
            // Far below one nano-unit.
            None => return Some(1),
        };
        Some(value / divisor + i128::from(value % divisor != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    #[test]
    fn plain_and_decimal_suffixes() {
        assert_eq!(q("4").nanos(), 4_000_000_000);
        assert_eq!(q("500m").nanos(), 500_000_000);
        assert_eq!(q("1k").nanos(), 1_000_000_000_000);
        assert_eq!(q("1n").nanos(), 1);
        assert_eq!(q("2u").nanos(), 2_000);
    }

    #[test]
    fn binary_suffixes() {
        assert_eq!(q("1Ki").nanos(), 1024 * 1_000_000_000);
        assert_eq!(q("10Gi").nanos(), 10 * (1i128 << 30) * 1_000_000_000);
        assert_eq!(q("1.5Gi").nanos(), 3 * (1i128 << 29) * 1_000_000_000);
    }

    #[test]
    fn equal_amounts_with_different_spelling() {
        assert_eq!(q("1Gi"), q("1024Mi"));
        assert_eq!(q("1"), q("1000m"));
        assert_eq!(q("0.5"), q("500m"));
        assert_eq!(q("1e3"), q("1k"));
        assert_eq!(q("1E3"), q("1k"));
        assert_ne!(q("1G"), q("1Gi"));
        assert_ne!(q("10Gi"), q("20Gi"));
    }

    #[test]
    fn exa_suffix_is_not_an_exponent() {
        assert_eq!(q("1E").nanos(), 10i128.pow(18) * 1_000_000_000);
    }

    #[test]
    fn sub_nano_rounds_up() {
        assert_eq!(q("0.1n").nanos(), 1);
        assert_eq!(q("1e-20").nanos(), 1);
        assert_eq!(q("0").nanos(), 0);
    }

    #[test]
    fn keeps_original_spelling() {
        assert_eq!(q(" 10Gi ").to_string(), "10Gi");
        assert_eq!(q("1000m").as_str(), "1000m");
    }

    #[test]
    fn rejects_malformed_quantities() {
        for bad in ["", "abc", "10GB", "1..2", "Gi", "1.2.3", "1e", "--1", "1 Gi"] {
            assert!(Quantity::parse(bad).is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(Quantity::parse("99999999999999999999999999999999999999999").is_err());
        assert!(Quantity::parse("1e40").is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let quantity: Quantity = serde_json::from_str("\"250m\"").unwrap();
        assert_eq!(quantity, q("0.25"));
        assert_eq!(serde_json::to_string(&quantity).unwrap(), "\"250m\"");
        assert!(serde_json::from_str::<Quantity>("\"ten\"").is_err());
    }
}
