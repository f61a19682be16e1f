//! Aspect ratio and screen size
//!
//! The payload header stores the screen aspect ratio as a float. The document
//! carries it as a `"numerator/denominator"` string (the closest fraction with
//! a denominator of at most one million) plus a screen size label looked up
//! from the exact float value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Platform, Result};

/// Largest denominator kept when converting a float to a fraction
pub const MAX_DENOMINATOR: u128 = 1_000_000;

/// Known aspect ratios (exact stored values) and their screen sizes
const SCREEN_SIZES: &[(f64, &str)] = &[
    (1.7647058963775635, "480x272"), // PSP
    (1.666748046875, "400x240"),     // 3DS top screen
    (1.333251953125, "256x192"),     // 3DS bottom screen
    (1.4285714626312256, "640x448"), // Wii 4:3
    (1.7763158082962036, "811x456"), // Wii 16:9
    (0.5625, "720x1280"),            // Mobile
    (0.5633803009986877, "720x1280"),
    (0.6666666865348816, "720x1280"),
    (1.3333333730697632, "256x192"),
    (1.7777777910232544, "1280x720"),
];

/// Look up the screen size label for a stored aspect ratio
pub fn screen_size(aspect: f64, platform: Platform) -> Result<&'static str> {
    let label = SCREEN_SIZES
        .iter()
        .find(|(ratio, _)| *ratio == aspect)
        .map(|(_, label)| *label)
        .ok_or(Error::UnsupportedAspectRatio(aspect))?;

    if label == "256x192" && platform == Platform::ThreeDs {
        return Ok("320x240");
    }
    Ok(label)
}

/// Rational aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub numerator: u64,
    pub denominator: u64,
}

impl AspectRatio {
    pub fn new(numerator: u64, denominator: u64) -> Self {
        let g = gcd(numerator as u128, denominator as u128).max(1) as u64;
        Self {
            numerator: numerator / g,
            denominator: denominator / g,
        }
    }

    /// Closest fraction to `value` with a denominator of at most [`MAX_DENOMINATOR`]
    pub fn from_f64(value: f64) -> Result<Self> {
        let (n, d) = exact_fraction(value).ok_or(Error::UnsupportedAspectRatio(value))?;
        let (n, d) = limit_denominator(n, d, MAX_DENOMINATOR);
        let numerator = u64::try_from(n).map_err(|_| Error::UnsupportedAspectRatio(value))?;
        let denominator = u64::try_from(d).map_err(|_| Error::UnsupportedAspectRatio(value))?;
        Ok(Self::new(numerator, denominator))
    }

    pub fn to_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::MalformedDocument(format!("invalid aspect ratio '{}'", s));
        let (numerator, denominator) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let numerator: u64 = numerator.parse().map_err(|_| invalid())?;
        let denominator: u64 = denominator.parse().map_err(|_| invalid())?;
        if denominator == 0 {
            return Err(invalid());
        }
        Ok(Self::new(numerator, denominator))
    }
}

impl Serialize for AspectRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AspectRatio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Exact value of a positive finite float as a reduced fraction
fn exact_fraction(value: f64) -> Option<(u128, u128)> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1 << 52) - 1);
    let (mut mantissa, mut exp) = if exponent == 0 {
        (fraction as u128, -1074)
    } else {
        ((fraction | (1 << 52)) as u128, exponent - 1075)
    };

    while exp < 0 && mantissa % 2 == 0 {
        mantissa /= 2;
        exp += 1;
    }

    if exp >= 0 {
        let n = mantissa.checked_mul(1u128.checked_shl(exp as u32)?)?;
        Some((n, 1))
    } else if exp >= -64 {
        Some((mantissa, 1u128 << (-exp)))
    } else {
        None
    }
}

/// Best rational approximation of n/d with denominator at most `max`
///
/// Walks the continued fraction expansion, then picks between the last
/// convergent and the best semiconvergent.
fn limit_denominator(n: u128, d: u128, max: u128) -> (u128, u128) {
    if d <= max {
        return (n, d);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0u128, 1u128, 1u128, 0u128);
    let (mut num, mut den) = (n, d);
    loop {
        let a = num / den;
        let q2 = match a.checked_mul(q1).and_then(|aq| aq.checked_add(q0)) {
            Some(q2) if q2 <= max => q2,
            _ => break,
        };
        let p2 = p0 + a * p1;
        (p0, q0, p1, q1) = (p1, q1, p2, q2);
        (num, den) = (den, num - a * den);
    }

    let k = (max - q0) / q1;
    let semi = (p0 + k * p1, q0 + k * q1);
    let convergent = (p1, q1);

    // |p/q - n/d| compared without division: |p*d - n*q| / q
    let distance = |(p, q): (u128, u128)| (p * d).abs_diff(n * q);
    if distance(convergent) * semi.1 <= distance(semi) * convergent.1 {
        convergent
    } else {
        semi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ratios() {
        let cases = [
            (1.7647058963775635, 30, 17),
            (1.3333333730697632, 4, 3),
            (1.7777777910232544, 16, 9),
            (1.4285714626312256, 10, 7),
            (0.5625, 9, 16),
            (1.666748046875, 6827, 4096),
        ];
        for (value, numerator, denominator) in cases {
            let ratio = AspectRatio::from_f64(value).unwrap();
            assert_eq!(ratio, AspectRatio::new(numerator, denominator), "{}", value);
        }
    }

    #[test]
    fn test_every_known_ratio_roundtrips_through_f32() {
        for (value, _) in SCREEN_SIZES {
            let ratio = AspectRatio::from_f64(*value).unwrap();
            assert_eq!(ratio.to_f64() as f32 as f64, *value, "{}", ratio);
        }
    }

    #[test]
    fn test_display_and_parse() {
        let ratio = AspectRatio::new(30, 17);
        assert_eq!(ratio.to_string(), "30/17");
        assert_eq!("30/17".parse::<AspectRatio>().unwrap(), ratio);
        assert_eq!("2".parse::<AspectRatio>().unwrap(), AspectRatio::new(2, 1));
        assert!("1/0".parse::<AspectRatio>().is_err());
        assert!("wide".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&AspectRatio::new(16, 9)).unwrap();
        assert_eq!(json, "\"16/9\"");
        let back: AspectRatio = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AspectRatio::new(16, 9));
    }

    #[test]
    fn test_screen_size() {
        assert_eq!(
            screen_size(1.7647058963775635, Platform::Standard).unwrap(),
            "480x272"
        );
        assert_eq!(
            screen_size(1.333251953125, Platform::Ds).unwrap(),
            "256x192"
        );
        assert_eq!(
            screen_size(1.333251953125, Platform::ThreeDs).unwrap(),
            "320x240"
        );
        assert!(matches!(
            screen_size(1.5, Platform::Standard),
            Err(Error::UnsupportedAspectRatio(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(AspectRatio::from_f64(0.0).is_err());
        assert!(AspectRatio::from_f64(-1.0).is_err());
        assert!(AspectRatio::from_f64(f64::NAN).is_err());
    }
}
