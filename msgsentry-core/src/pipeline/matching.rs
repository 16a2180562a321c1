//! Text normalization and flagged-text matching
//!
//! Observed text is messy: timestamps get glued onto bubbles, punctuation
//! differs between renders, and long messages are re-observed in truncated
//! form while scrolling. Matching therefore runs on a normalized form and
//! falls through a cascade of progressively fuzzier tiers.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};

/// How an observed text matched a flagged one, strictest tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Normalized forms are identical.
    Exact,
    /// Observation contains the flagged text (timestamp or sender glued on).
    Contains,
    /// Flagged text contains the observation (truncated re-render).
    ContainedIn,
    /// High word overlap between the two.
    WordOverlap,
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}:\d{2}\s?(?:[ap]m)?").expect("valid regex"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid regex"))
}

/// Patterns for messenger UI chrome that is not message content.
fn ui_chrome_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"^\d+$",
            r"^\d{1,2}:\d{2}(\s?[ap]m)?$",
            r"^(online|offline)$",
            r"^last seen",
            r"^typing(\.\.\.|…)?$",
            r"^\d+\s+(members?|subscribers?|online)",
            r"^(photo|video|gif|sticker|file|voice message|video message)$",
            r"^(today|yesterday)$",
            r"^unread messages$",
            r"^(forwarded message|pinned message)",
            r"^\+?\d[\d\s()-]{6,}$",
            r"^(mute|unmute|reply|forward|delete|copy|select|cancel|send)$",
        ])
        .expect("valid regex set")
    })
}

/// Normalize text for matching: lowercase, strip timestamps, drop
/// punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_time = timestamp_regex().replace_all(&lowered, " ");
    let cleaned: String = without_time
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check whether observed text (normalized) matches flagged text
/// (normalized), returning the tier that matched.
pub fn matches_flagged(observed: &str, flagged: &str) -> Option<MatchTier> {
    if observed.is_empty() || flagged.is_empty() {
        return None;
    }
    if observed == flagged {
        return Some(MatchTier::Exact);
    }
    if observed.contains(flagged) {
        return Some(MatchTier::Contains);
    }
    // Short fragments are contained in almost anything.
    if observed.len() > 10 && flagged.contains(observed) {
        return Some(MatchTier::ContainedIn);
    }
    if word_overlap(observed, flagged) > 0.8 {
        return Some(MatchTier::WordOverlap);
    }
    None
}

/// Fraction of the smaller word set contained in the larger one.
///
/// Words of three characters or more only; short filler words would inflate
/// the overlap. Empty word sets overlap nothing.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a: std::collections::HashSet<&str> = a
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();
    let words_b: std::collections::HashSet<&str> = b
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let (smaller, larger) = if words_a.len() <= words_b.len() {
        (&words_a, &words_b)
    } else {
        (&words_b, &words_a)
    };
    let shared = smaller.iter().filter(|w| larger.contains(**w)).count();
    shared as f64 / smaller.len() as f64
}

/// Check whether a text node is messenger UI chrome rather than a message.
pub fn is_ui_chrome(text: &str) -> bool {
    ui_chrome_set().is_match(text.trim().to_lowercase().as_str())
}

/// Extract HTTP(S) URLs from message text.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', ']']).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_timestamp_and_punctuation() {
        assert_eq!(
            normalize("Breaking News!!! 12:45 PM: the moon is CHEESE."),
            "breaking news the moon is cheese"
        );
    }

    #[test]
    fn test_exact_match_after_normalization() {
        let flagged = normalize("The moon is cheese!");
        let observed = normalize("the moon is CHEESE");
        assert_eq!(matches_flagged(&observed, &flagged), Some(MatchTier::Exact));
    }

    #[test]
    fn test_contains_match_with_glued_prefix() {
        let flagged = normalize("the moon is cheese");
        let observed = normalize("Alice 10:02 the moon is cheese");
        assert_eq!(
            matches_flagged(&observed, &flagged),
            Some(MatchTier::Contains)
        );
    }

    #[test]
    fn test_truncated_observation_matches_reverse_containment() {
        let flagged = normalize("drinking bleach cures absolutely every known illness");
        let observed = normalize("drinking bleach cures");
        assert_eq!(
            matches_flagged(&observed, &flagged),
            Some(MatchTier::ContainedIn)
        );
    }

    #[test]
    fn test_short_fragment_does_not_reverse_match() {
        let flagged = normalize("drinking bleach cures absolutely everything");
        // 9 characters normalized, too short for reverse containment.
        assert_eq!(matches_flagged("drinking", &flagged), None);
    }

    #[test]
    fn test_word_overlap_tier() {
        let flagged = normalize("scientists confirm vaccines contain tracking microchips");
        let observed = normalize("confirm scientists microchips tracking contain vaccines now");
        assert_eq!(
            matches_flagged(&observed, &flagged),
            Some(MatchTier::WordOverlap)
        );
    }

    #[test]
    fn test_smaller_set_fully_contained_is_full_overlap() {
        assert_eq!(word_overlap("exam cancel", "exam cancel week"), 1.0);
        assert_eq!(word_overlap("exam cancel week", "exam cancel"), 1.0);
        assert_eq!(word_overlap("", "exam cancel"), 0.0);
    }

    #[test]
    fn test_word_filter_counts_characters_not_bytes() {
        // Two-letter Cyrillic words are four bytes but still filler.
        assert_eq!(word_overlap("да да", "нет они"), 0.0);
        assert_eq!(word_overlap("вакцины опасны", "опасны вакцины"), 1.0);
    }

    #[test]
    fn test_unrelated_text_does_not_match() {
        let flagged = normalize("the moon is cheese");
        let observed = normalize("see you at dinner tonight");
        assert_eq!(matches_flagged(&observed, &flagged), None);
    }

    #[test]
    fn test_ui_chrome_detection() {
        assert!(is_ui_chrome("14:05"));
        assert!(is_ui_chrome("online"));
        assert!(is_ui_chrome("Last seen recently"));
        assert!(is_ui_chrome("1024"));
        assert!(is_ui_chrome("typing..."));
        assert!(is_ui_chrome("52 members, 12 online"));
        assert!(!is_ui_chrome("the moon is cheese"));
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls("check http://grabify.link/x and https://example.com/a, ok?");
        assert_eq!(
            urls,
            vec![
                "http://grabify.link/x".to_string(),
                "https://example.com/a".to_string()
            ]
        );
        assert!(extract_urls("no links here").is_empty());
    }
}
