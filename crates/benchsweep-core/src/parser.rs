//! Pattern-driven extraction of metrics and error categories from console text.

use crate::config::Pattern;

/// Values extracted from one text blob: `(pattern name, value)` pairs for the
/// patterns that matched, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    values: Vec<(String, String)>,
}

impl Extracted {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name: message` pairs joined with `"; "`, as written to the `Error` column.
    pub fn join_messages(&self) -> String {
        self.values
            .iter()
            .map(|(name, message)| format!("{}: {}", name, message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Apply every pattern to `text`.
///
/// Each pattern searches anywhere in the text and only its first match is
/// used. Patterns that do not match are absent from the result.
pub fn extract(text: &str, patterns: &[Pattern]) -> Extracted {
    let values = patterns
        .iter()
        .filter_map(|pattern| {
            let captures = pattern.regex().captures(text)?;
            // A group inside an unmatched alternative yields no value.
            let value = captures.get(1).map_or("", |m| m.as_str());
            Some((pattern.name().to_string(), normalize_capture(value)))
        })
        .collect();
    Extracted { values }
}

/// Normalise a captured value.
///
/// Values of the form `digits.digits` are rounded half-up to two decimal
/// places and rendered without trailing zeros, keeping at least one
/// fractional digit (`10.456` -> `10.46`, `5.2` -> `5.2`, `1.999` -> `2.0`).
/// Anything else, integers included, is returned unchanged.
pub fn normalize_capture(value: &str) -> String {
    match value.split_once('.') {
        Some((int_part, frac_part)) if is_digits(int_part) && is_digits(frac_part) => {
            round_decimal(int_part, frac_part)
        }
        _ => value.to_string(),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Half-up rounding to two places on the digit string.
fn round_decimal(int_part: &str, frac_part: &str) -> String {
    let frac = frac_part.as_bytes();
    let mut digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    digits.extend((0..2).map(|i| frac.get(i).map_or(0, |b| b - b'0')));

    if frac.get(2).is_some_and(|&b| b >= b'5') {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - 2;
    let int_digits: String = digits[..split]
        .iter()
        .map(|d| char::from(b'0' + d))
        .collect();
    let int_digits = int_digits.trim_start_matches('0');
    let int_digits = if int_digits.is_empty() { "0" } else { int_digits };

    let mut frac_digits: String = digits[split..]
        .iter()
        .map(|d| char::from(b'0' + d))
        .collect();
    while frac_digits.len() > 1 && frac_digits.ends_with('0') {
        frac_digits.pop();
    }

    format!("{}.{}", int_digits, frac_digits)
}
