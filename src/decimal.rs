use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Exact decimal number used for telemetry comparisons and increment math.
///
/// Simulator values and user settings arrive as short decimal strings;
/// doing the arithmetic in base ten keeps results like `0.1 + 0.2` exact
/// where binary floats would drift on user-facing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    /// The number is `units / 10^scale`. Normalized so the fraction
    /// carries no trailing zeros, which makes derived equality exact.
    units: i128,
    scale: u32,
}

/// Digit budget that keeps scale alignment inside `i128`.
const MAX_DIGITS: usize = 18;

impl Decimal {
    pub const ZERO: Decimal = Decimal { units: 0, scale: 0 };

    /// Parse a plain decimal string (`15`, `-12.5`, `+0.25`). Returns
    /// `None` for anything else, including empty and non-numeric input.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if int_part.len() + frac_part.len() > MAX_DIGITS {
            return None;
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut units: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            units = units.checked_mul(10)?.checked_add((b - b'0') as i128)?;
        }
        if negative {
            units = -units;
        }
        Some(Self::normalized(units, frac_part.len() as u32))
    }

    fn normalized(mut units: i128, mut scale: u32) -> Self {
        while scale > 0 && units % 10 == 0 {
            units /= 10;
            scale -= 1;
        }
        Decimal { units, scale }
    }

    /// Both operands scaled to a common power of ten.
    fn aligned(self, other: Self) -> (i128, i128) {
        let scale = self.scale.max(other.scale);
        let lhs = self.units * 10i128.pow(scale - self.scale);
        let rhs = other.units * 10i128.pow(scale - other.scale);
        (lhs, rhs)
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal::ZERO
    }
}

impl FromStr for Decimal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Decimal::parse(s).ok_or_else(|| format!("not a decimal number: '{s}'"))
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, other: Decimal) -> Decimal {
        let scale = self.scale.max(other.scale);
        let (lhs, rhs) = self.aligned(other);
        Decimal::normalized(lhs + rhs, scale)
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, other: Decimal) {
        *self = *self + other;
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs) = self.aligned(*other);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let sign = if self.units < 0 { "-" } else { "" };
        let abs = self.units.unsigned_abs();
        let pow = 10u128.pow(self.scale);
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / pow,
            abs % pow,
            width = self.scale as usize
        )
    }
}
