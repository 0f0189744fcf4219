//! Channel name fingerprinting
//!
//! Collapses the provider's noisy, duplicated stream names into stable
//! grouping keys: `"[RO] Pro TV HD"`, `"RO|4K| Pro TV"` and `"Pro TV FHD"`
//! all map to the key `"protv"`. Two entries with an equal fingerprint
//! belong to the same canonical channel.

use std::collections::HashMap;

/// Quality/codec/backup tokens removed as whole words wherever they appear.
const STOP_TOKENS: &[&str] = &[
    "4k", "uhd", "fhd", "hd", "sd", "1080p", "1080i", "1080", "720p", "720",
    "576p", "hevc", "h265", "x265", "backup", "alt", "fps",
];

/// Trailing brand-suffix plurals unified so both spellings co-group.
const PLURAL_SUFFIXES: &[(&str, &str)] = &[("sports", "sport"), ("movies", "movie")];

/// Derive the grouping key for a raw channel name.
///
/// Pure and deterministic: lower-cases, strips leading country/source
/// markers, drops quality/codec/backup tokens and frame-rate tags, unifies
/// plural brand suffixes, and removes every remaining non-alphanumeric
/// character. A non-empty input never produces an empty key: when stripping
/// consumes everything, the lower-cased original (whitespace collapsed) is
/// the fallback.
pub fn fingerprint(raw_name: &str) -> String {
    let lowered = raw_name.to_lowercase();
    let stripped = strip_country_prefix(lowered.trim());

    let tokens: Vec<&str> = stripped
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    for (i, &token) in tokens.iter().enumerate() {
        if STOP_TOKENS.contains(&token) || is_frame_rate_tag(token) {
            continue;
        }
        if is_frame_rate_number(token) {
            let neighbor_fps = |t: Option<&&str>| matches!(t, Some(&"fps"));
            if neighbor_fps(tokens.get(i.wrapping_sub(1))) || neighbor_fps(tokens.get(i + 1)) {
                continue;
            }
        }
        kept.push(token);
    }

    if let Some(last) = kept.last_mut() {
        for &(plural, singular) in PLURAL_SUFFIXES {
            if *last == plural {
                *last = singular;
            }
        }
    }

    let key: String = kept.concat();
    if key.is_empty() {
        lowered.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        key
    }
}

/// Strip leading country/source markers: a 2-3 letter code at the start of
/// the string (optionally wrapped in `[...]`/`|...|`) terminated by one of
/// `:`, `-`, `|`, `]`. Applied repeatedly, start of string only.
pub(crate) fn strip_country_prefix(s: &str) -> &str {
    let mut rest = s;
    loop {
        let trimmed = rest.trim_start();
        let after_wrapper = trimmed
            .strip_prefix('[')
            .or_else(|| trimmed.strip_prefix('|'))
            .unwrap_or(trimmed);

        let code_len = after_wrapper
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        if !(2..=3).contains(&code_len) {
            return trimmed;
        }

        let mut tail = after_wrapper[code_len..].chars();
        match tail.next() {
            Some(':' | '-' | '|' | ']') => rest = tail.as_str(),
            _ => return trimmed,
        }
    }
}

/// `50fps`-style tag collapsed into a single token by the tokenizer.
fn is_frame_rate_tag(token: &str) -> bool {
    token
        .strip_suffix("fps")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Bare frame-rate number; only stripped when adjacent to an `fps` token.
fn is_frame_rate_number(token: &str) -> bool {
    matches!(token, "25" | "30" | "50" | "60")
}

/// Memoizes fingerprints per distinct raw name within one refresh epoch.
///
/// The orchestrator clears the table whenever a new raw entry list is
/// adopted so entries for renamed or removed channels never resurface.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    map: HashMap<String, String>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint `raw_name`, computing at most once per distinct input.
    pub fn get(&mut self, raw_name: &str) -> String {
        if let Some(key) = self.map.get(raw_name) {
            return key.clone();
        }
        let key = fingerprint(raw_name);
        self.map.insert(raw_name.to_string(), key.clone());
        key
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
