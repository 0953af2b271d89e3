// src/normalize.rs
//! Text canonicalization for scraped tag strings.
//!
//! Two strings that only differ in width forms, invisible characters, whitespace
//! runs or spacing around brackets normalize to the same value, so cosmetic drift
//! on the results page never looks like a content change.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
// Opening brackets: no space on either side.
static RE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([(\[{])\s*").expect("open bracket regex"));
// Closing brackets and commas: no space before.
static RE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([)\]},])").expect("close punct regex"));

/// Canonicalize a free-text token. Pure, total and idempotent.
pub fn normalize(s: &str) -> String {
    let folded = fold_whitespace(s);
    if folded.is_empty() {
        return folded;
    }
    let out = RE_OPEN.replace_all(&folded, "$1");
    let out = RE_CLOSE.replace_all(&out, "$1");
    out.trim().to_string()
}

/// Steps 1-3 of [`normalize`] only: NFKC, invisible characters, whitespace.
/// Used for display, where bracket spacing is kept as scraped.
pub fn fold_whitespace(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    // Invisibles go before composition so they cannot split a base from its mark.
    let composed: String = s
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{FEFF}'))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .nfkc()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    RE_WS.replace_all(&composed, " ").trim().to_string()
}
