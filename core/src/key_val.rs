//! Key-value blob matching
//!
//! Some generator options carry a delimited `key=val[,key=val,...]` blob in
//! the token after the option. These helpers parse such a blob into a map
//! (honoring CSV-style double quotes, since values may contain the
//! separator) and scan an argument vector for an occurrence of the option
//! whose blob matches an expected map.

use std::collections::HashMap;

use regex::Regex;

use crate::VerifyError;

/// Parse a delimited key-value blob into a map.
///
/// Fields are split on `separator`; a double-quoted span protects separators
/// and `""` escapes a literal quote. Each field splits on its first `=`,
/// with the value defaulting to empty when no `=` is present.
///
/// # Example
///
/// ```
/// use quadcheck::key_val::key_value_map;
///
/// let map = key_value_map("a=1,b=2", ',');
/// assert_eq!(map["a"], "1");
/// assert_eq!(map["b"], "2");
/// ```
#[must_use]
pub fn key_value_map(blob: &str, separator: char) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for field in split_quoted(blob, separator) {
        match field.split_once('=') {
            Some((key, value)) => map.insert(key.to_string(), value.to_string()),
            None => map.insert(field, String::new()),
        };
    }
    map
}

/// Scan `haystack` for an occurrence of `opt` whose following token parses
/// to a map matching `expected`.
///
/// Exact mode requires map equality. Regex mode requires the same key count
/// and, per expected key, the expected value found as a regex within the
/// actual value. The scan advances two tokens past each candidate and
/// succeeds on the first match; an `opt` with no following token ends the
/// scan.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidPattern`] in regex mode when an expected
/// value does not compile.
pub fn match_key_val(
    haystack: &[String],
    opt: &str,
    separator: char,
    expected: &HashMap<String, String>,
    allow_regex: bool,
) -> Result<bool, VerifyError> {
    let mut pos = 0;
    while let Some(found) = haystack[pos..]
        .iter()
        .position(|token| token == opt)
        .map(|i| pos + i)
    {
        let Some(blob) = haystack.get(found + 1) else {
            break;
        };
        let actual = key_value_map(blob, separator);
        let matched = if allow_regex {
            maps_equal_regex(expected, &actual)?
        } else {
            *expected == actual
        };
        if matched {
            return Ok(true);
        }
        pos = found + 2;
    }
    Ok(false)
}

fn maps_equal_regex(
    expected: &HashMap<String, String>,
    actual: &HashMap<String, String>,
) -> Result<bool, VerifyError> {
    if expected.len() != actual.len() {
        return Ok(false);
    }
    for (key, pattern) in expected {
        let re = Regex::new(pattern).map_err(|e| VerifyError::InvalidPattern {
            pattern: pattern.clone(),
            source: e.to_string(),
        })?;
        match actual.get(key) {
            Some(value) if re.find(value).is_some() => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn split_quoted(blob: &str, separator: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = blob.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == separator {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}
