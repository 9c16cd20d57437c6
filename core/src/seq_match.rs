//! Sub-sequence search over argument vectors
//!
//! Pure functions in exact and regex-per-token variants, plus tail-anchored
//! ("final") forms and the subcommand scoping used by global-only checks.
//!
//! Regex semantics follow `Regex::find`: a needle element must match
//! somewhere within the corresponding haystack token, not span all of it.

use regex::Regex;

use crate::VerifyError;

/// Element-wise comparison of `needle` against `haystack` starting at `pos`.
#[must_use]
pub fn match_at(haystack: &[String], pos: usize, needle: &[String]) -> bool {
    if needle.len() > haystack.len().saturating_sub(pos) {
        return false;
    }
    needle
        .iter()
        .zip(&haystack[pos..])
        .all(|(want, have)| want == have)
}

/// Lowest start index where `needle` occurs as a contiguous sub-sequence.
///
/// An empty needle, or one longer than the haystack, finds nothing.
#[must_use]
pub fn find_sub(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| match_at(haystack, i, needle))
}

/// Like [`find_sub`], with each needle element treated as a regex searched
/// within the corresponding haystack token.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidPattern`] when a needle element does not
/// compile.
pub fn find_sub_regex(haystack: &[String], needle: &[String]) -> Result<Option<usize>, VerifyError> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Ok(None);
    }
    let patterns = compile(needle)?;
    Ok((0..=haystack.len() - patterns.len()).find(|&i| regex_match_at(haystack, i, &patterns)))
}

/// Element-wise comparison anchored at the exact tail of `haystack`.
#[must_use]
pub fn match_final(haystack: &[String], needle: &[String]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    match_at(haystack, haystack.len() - needle.len(), needle)
}

/// Regex variant of [`match_final`].
///
/// # Errors
///
/// Returns [`VerifyError::InvalidPattern`] when a needle element does not
/// compile.
pub fn match_final_regex(haystack: &[String], needle: &[String]) -> Result<bool, VerifyError> {
    if needle.len() > haystack.len() {
        return Ok(false);
    }
    let patterns = compile(needle)?;
    Ok(regex_match_at(
        haystack,
        haystack.len() - patterns.len(),
        &patterns,
    ))
}

/// The region of `haystack` preceding the first occurrence of `anchor`,
/// for global-only checks.
///
/// Returns `None` when the anchor sits at index 1: only the program token
/// precedes the subcommand there, so no global region exists. When the
/// anchor is absent entirely, the region is everything but the last token.
#[must_use]
pub fn global_region<'a>(haystack: &'a [String], anchor: &str) -> Option<&'a [String]> {
    match haystack.iter().position(|token| token == anchor) {
        Some(1) => None,
        Some(i) => Some(&haystack[..i]),
        None => Some(&haystack[..haystack.len().saturating_sub(1)]),
    }
}

fn regex_match_at(haystack: &[String], pos: usize, patterns: &[Regex]) -> bool {
    if patterns.len() > haystack.len().saturating_sub(pos) {
        return false;
    }
    patterns
        .iter()
        .zip(&haystack[pos..])
        .all(|(pattern, token)| pattern.find(token).is_some())
}

fn compile(needle: &[String]) -> Result<Vec<Regex>, VerifyError> {
    needle
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| VerifyError::InvalidPattern {
                pattern: pattern.clone(),
                source: e.to_string(),
            })
        })
        .collect()
}
