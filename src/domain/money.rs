use std::fmt;

/// Amounts are integers in the settlement currency's minor unit.
/// With a scale of 100, 1 unit = 100 minor units, so 50.00 = 5000.
pub type Amount = i64;

/// Number of minor units per whole unit used at the display boundary.
pub const MINOR_UNITS_PER_UNIT: Amount = 100;

/// Digits after the decimal point implied by [`MINOR_UNITS_PER_UNIT`].
const FRACTION_DIGITS: usize = 2;

/// Format minor units as a human-readable decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_amount(amount: Amount) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let scale = MINOR_UNITS_PER_UNIT.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = FRACTION_DIGITS
    )
}

/// Parse a decimal string into minor units.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
///
/// Input with more fractional digits than the scale is rejected instead of
/// truncated, so no precision is dropped on the way in.
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    if digits.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if fraction_str.contains('.') {
        return Err(ParseAmountError::InvalidFormat);
    }
    if fraction_str.len() > FRACTION_DIGITS {
        return Err(ParseAmountError::TooPrecise);
    }
    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let units: Amount = if units_str.is_empty() {
        0
    } else {
        parse_digits(units_str)?
    };

    let fraction: Amount = if fraction_str.is_empty() {
        0
    } else {
        // "5" means 50, "05" means 5
        let padded = format!("{:0<width$}", fraction_str, width = FRACTION_DIGITS);
        parse_digits(&padded)?
    };

    let amount = units
        .checked_mul(MINOR_UNITS_PER_UNIT)
        .and_then(|v| v.checked_add(fraction))
        .ok_or(ParseAmountError::OutOfRange)?;

    Ok(if negative { -amount } else { amount })
}

fn parse_digits(s: &str) -> Result<Amount, ParseAmountError> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseAmountError::InvalidFormat);
    }
    s.parse().map_err(|_| ParseAmountError::OutOfRange)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    TooPrecise,
    OutOfRange,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::TooPrecise => {
                write!(f, "at most {} decimal places are allowed", FRACTION_DIGITS)
            }
            ParseAmountError::OutOfRange => write!(f, "amount is out of range"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
