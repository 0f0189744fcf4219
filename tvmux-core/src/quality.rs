//! Source quality detection
//!
//! Derives a discrete quality tier from a raw stream name so the sources of
//! one canonical channel can be ranked, and cleans the name for display.

use serde::{Deserialize, Serialize};

/// Ordered video quality classification of a raw source.
///
/// Ordering follows the discriminant: `Sd < Hd < Hd50 < FullHd < UltraHd`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum QualityTier {
    Sd = 1,
    Hd = 2,
    Hd50 = 3,
    FullHd = 4,
    UltraHd = 5,
}

impl QualityTier {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityTier::Sd => "SD",
            QualityTier::Hd => "HD",
            QualityTier::Hd50 => "HD 50fps",
            QualityTier::FullHd => "FHD",
            QualityTier::UltraHd => "4K",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            QualityTier::Sd => "📼",
            QualityTier::Hd => "📺",
            QualityTier::Hd50 => "🎯",
            QualityTier::FullHd => "🔥",
            QualityTier::UltraHd => "⭐",
        }
    }
}

/// Classify a raw stream name into a quality tier.
///
/// Case-insensitive substring matching with fixed precedence; the first
/// matching tier wins, so a name carrying both "4k" and "hd" is UltraHd.
/// Names with no quality markers default to Sd.
pub fn classify(raw_name: &str) -> QualityTier {
    let name = raw_name.to_lowercase();
    if name.contains("4k") || name.contains("uhd") || name.contains("ultra") {
        QualityTier::UltraHd
    } else if name.contains("fhd") || name.contains("1080") || name.contains("full hd") {
        QualityTier::FullHd
    } else if name.contains("hd") && name.contains("50") && name.contains("fps") {
        QualityTier::Hd50
    } else if name.contains("hd") || name.contains("720") {
        QualityTier::Hd
    } else {
        QualityTier::Sd
    }
}

/// Quality tokens removed from display names (whole-word, case-insensitive).
const DISPLAY_STOP_TOKENS: &[&str] = &[
    "4k", "uhd", "ultra", "fhd", "hd", "sd", "1080p", "1080i", "1080", "720p",
    "720", "576p", "hevc", "h265", "x265", "backup", "alt", "fps",
];

/// Clean a raw name for display: drop the leading country marker,
/// bracket/paren groups, and quality tokens, then collapse whitespace. An
/// empty result falls back to the raw name unchanged.
pub fn clean_display_name(raw_name: &str) -> String {
    let without_prefix = crate::fingerprint::strip_country_prefix(raw_name.trim());
    let without_groups = strip_groups(without_prefix);

    let cleaned = without_groups
        .split_whitespace()
        .filter(|word| {
            let bare: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            !DISPLAY_STOP_TOKENS.contains(&bare.as_str()) && !is_frame_rate_word(&bare)
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        raw_name.to_string()
    } else {
        cleaned
    }
}

/// Remove `[...]` and `(...)` groups; stray pipes become spaces so the
/// remaining words still separate.
fn strip_groups(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            '|' | ':' if depth == 0 => out.push(' '),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_frame_rate_word(bare: &str) -> bool {
    bare.strip_suffix("fps")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ultra_hd_markers() {
        assert_eq!(classify("Pro TV 4K"), QualityTier::UltraHd);
        assert_eq!(classify("Pro TV UHD"), QualityTier::UltraHd);
        assert_eq!(classify("Pro TV Ultra"), QualityTier::UltraHd);
    }

    #[test]
    fn test_precedence_4k_beats_hd() {
        // a name containing both markers classifies as the higher tier
        assert_eq!(classify("Pro TV 4K HD"), QualityTier::UltraHd);
        assert_eq!(classify("RO|4K| Pro TV HD"), QualityTier::UltraHd);
    }

    #[test]
    fn test_full_hd_markers() {
        assert_eq!(classify("Pro TV FHD"), QualityTier::FullHd);
        assert_eq!(classify("Pro TV 1080p"), QualityTier::FullHd);
        assert_eq!(classify("Pro TV Full HD"), QualityTier::FullHd);
    }

    #[test]
    fn test_hd50_requires_all_three_markers() {
        assert_eq!(classify("Digi Sport HD 50fps"), QualityTier::Hd50);
        assert_eq!(classify("Digi Sport HD 50 fps"), QualityTier::Hd50);
        // missing "fps" downgrades to plain HD
        assert_eq!(classify("Digi Sport HD 50"), QualityTier::Hd);
    }

    #[test]
    fn test_hd_markers() {
        assert_eq!(classify("Pro TV HD"), QualityTier::Hd);
        assert_eq!(classify("Pro TV 720p"), QualityTier::Hd);
    }

    #[test]
    fn test_sd_default() {
        assert_eq!(classify("Pro TV"), QualityTier::Sd);
        assert_eq!(classify(""), QualityTier::Sd);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(QualityTier::UltraHd > QualityTier::FullHd);
        assert!(QualityTier::FullHd > QualityTier::Hd50);
        assert!(QualityTier::Hd50 > QualityTier::Hd);
        assert!(QualityTier::Hd > QualityTier::Sd);
        assert_eq!(QualityTier::Sd.rank(), 1);
        assert_eq!(QualityTier::UltraHd.rank(), 5);
    }

    #[test]
    fn test_clean_display_name_strips_noise() {
        assert_eq!(clean_display_name("[RO] Pro TV HD"), "Pro TV");
        assert_eq!(clean_display_name("RO|4K| Pro TV"), "Pro TV");
        assert_eq!(clean_display_name("UK| Sky Sports Main Event FHD"), "Sky Sports Main Event");
        assert_eq!(clean_display_name("Digi Sport 1 HD 50fps"), "Digi Sport 1");
    }

    #[test]
    fn test_clean_display_name_keeps_case() {
        assert_eq!(clean_display_name("Pro TV (backup)"), "Pro TV");
        assert_eq!(clean_display_name("TVR 1"), "TVR 1");
    }

    #[test]
    fn test_clean_display_name_falls_back_when_empty() {
        assert_eq!(clean_display_name("[RO] HD"), "[RO] HD");
        assert_eq!(clean_display_name("4K"), "4K");
    }
}
