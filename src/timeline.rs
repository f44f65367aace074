//! Exact media time arithmetic
//!
//! Durations read from sub-manifests are kept as reduced fractions of a
//! second so that summing thousands of segments never drifts. Values are
//! only rounded when rendered, always half away from zero at millisecond
//! precision.

use std::cmp::Ordering;
use std::fmt;

/// Fractional digits kept when parsing decimals
const MAX_FRACTION_DIGITS: usize = 9;

/// Non-negative rational number of seconds
#[derive(Debug, Clone, Copy)]
pub struct Rational {
    num: u128,
    den: u128,
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };

    /// Create `num / den`, returns `None` for a zero denominator.
    pub fn new(num: u64, den: u64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        Some(Self::reduced(num as u128, den as u128))
    }

    /// Duration of `ticks` units at `timescale` units per second
    pub fn from_ticks(ticks: u64, timescale: u64) -> Option<Self> {
        Self::new(ticks, timescale)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::reduced(secs as u128, 1)
    }

    fn reduced(num: u128, den: u128) -> Self {
        let g = gcd(num, den).max(1);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    /// Parse a plain decimal such as `4`, `4.000000` or `.5` without
    /// going through floating point. Digits past nanosecond precision are
    /// dropped.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let frac_part = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let den = 10u128.pow(frac_part.len() as u32);
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().ok()?
        };
        Some(Self::reduced(int.checked_mul(den)?.checked_add(frac)?, den))
    }

    /// Milliseconds, rounded half away from zero
    pub fn round_millis(&self) -> u128 {
        self.round_scaled(1000)
    }

    /// Value scaled by `factor` and rounded half away from zero.
    /// Saturates instead of overflowing.
    pub fn round_scaled(&self, factor: u64) -> u128 {
        let factor = factor as u128;
        let whole = (self.num / self.den).saturating_mul(factor);
        let mut rem = self.num % self.den;
        let mut den = self.den;
        // rem < den, so halving both keeps the quotient and den non-zero
        loop {
            let scaled = rem
                .checked_mul(factor * 2)
                .and_then(|x| x.checked_add(den))
                .zip(den.checked_mul(2));
            match scaled {
                Some((n, d)) => return whole.saturating_add(n / d),
                None => {
                    rem >>= 1;
                    den >>= 1;
                }
            }
        }
    }

    /// `bits / self`, rounded half away from zero. `None` for a zero
    /// duration or a rate beyond `u64`.
    pub fn rate_per_sec(&self, bits: u64) -> Option<u64> {
        if self.num == 0 {
            return None;
        }
        let value = (bits as u128)
            .checked_mul(self.den)?
            .checked_mul(2)?
            .checked_add(self.num)?
            / self.num.checked_mul(2)?;
        u64::try_from(value).ok()
    }

    /// Exact sum, `None` when it cannot be represented
    pub fn checked_add(self, rhs: Rational) -> Option<Rational> {
        let g = gcd(self.den, rhs.den).max(1);
        let den = (self.den / g).checked_mul(rhs.den)?;
        let num = self
            .num
            .checked_mul(rhs.den / g)?
            .checked_add(rhs.num.checked_mul(self.den / g)?)?;
        Some(Rational::reduced(num, den))
    }

    /// Parse `30000/1001`, `25/1` or a plain decimal
    pub fn parse_fraction(s: &str) -> Option<Self> {
        match s.split_once('/') {
            Some((n, d)) => Self::new(n.trim().parse().ok()?, d.trim().parse().ok()?),
            None => Self::parse_decimal(s),
        }
    }

    /// `num/den`, or just `num` for whole numbers
    pub fn to_fraction_string(&self) -> String {
        if self.den == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num && self.den == other.den
    }
}

impl Eq for Rational {}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    /// Continued-fraction comparison, no cross multiplication
    fn cmp(&self, other: &Self) -> Ordering {
        let (mut a, mut b, mut c, mut d) = (self.num, self.den, other.num, other.den);
        loop {
            let (q1, r1) = (a / b, a % b);
            let (q2, r2) = (c / d, c % d);
            if q1 != q2 {
                return q1.cmp(&q2);
            }
            match (r1 == 0, r2 == 0) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                // r1/b against r2/d is d/r2 against b/r1
                (false, false) => (a, b, c, d) = (d, r2, b, r1),
            }
        }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

/// Seconds with three decimals, e.g. `4.000s`
impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.round_millis();
        write!(f, "{}.{:03}s", ms / 1000, ms % 1000)
    }
}
