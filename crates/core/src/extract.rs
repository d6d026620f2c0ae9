use once_cell::sync::Lazy;
use regex::Regex;

static NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("valid numeral regex"));
static DECIMAL_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Nd}$").expect("valid digit regex"));

/// Returns the first integer or decimal numeral in `text`, scanning left to
/// right. Signs are not part of the match, so `-3` yields `3.0`.
///
/// Digits from any script count (`१२` is 12). Values too large for an `f64`
/// are treated as no numeral at all.
pub fn first_numeral(text: &str) -> Option<f64> {
    let found = NUMERAL.find(text)?;
    let ascii = found
        .as_str()
        .trim_end_matches('.')
        .chars()
        .map(|ch| match ch {
            '.' => Some('.'),
            _ => decimal_value(ch).and_then(|digit| char::from_digit(digit, 10)),
        })
        .collect::<Option<String>>()?;

    ascii.parse::<f64>().ok().filter(|value| value.is_finite())
}

// Unicode lays every decimal digit set out as ten consecutive code points,
// zero first, and adjacent sets start on a multiple of ten from the run start.
fn decimal_value(ch: char) -> Option<u32> {
    if let Some(digit) = ch.to_digit(10) {
        return Some(digit);
    }
    if !is_decimal_digit(ch) {
        return None;
    }

    let code = u32::from(ch);
    let mut run_start = code;
    while let Some(previous) = run_start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(previous) {
            break;
        }
        run_start -= 1;
    }
    Some((code - run_start) % 10)
}

fn is_decimal_digit(ch: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGIT.is_match(ch.encode_utf8(&mut buf))
}
