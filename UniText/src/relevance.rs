//! Heuristics separating probable game text from technical noise
//!
//! Two tiers are used. [`is_text_relevant`] is the strict scanner test: the
//! field or asset name mentions a text-ish keyword, or the content looks
//! like dialogue. [`is_potential_game_text`] is looser and name-agnostic,
//! for containers whose field names are mangled or stripped.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// Name keywords that mark a field or asset as text-bearing
pub const NAME_KEYWORDS: [&str; 9] = [
    "subtitle",
    "dialogue",
    "dialog",
    "caption",
    "text",
    "localization",
    "translation",
    "string",
    "message",
];

/// Minimum share of alphabetic characters in a text candidate
pub const MIN_LETTER_DENSITY: f64 = 0.3;

/// Minimum candidate length, in characters
pub const MIN_CANDIDATE_CHARS: usize = 4;

/// Length above which a valid candidate counts as game text on its own
const LONG_TEXT_CHARS: usize = 20;

// Every dialogue pattern is matched case-insensitively
static DIALOGUE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r#"(?i)"text"\s*:\s*"[^"]+""#,
        r"(?is)<subtitle[^>]*>.*?</subtitle>",
        r"\d{2}:\d{2}:\d{2}[,.]\d{3}",
        r"(?i)Dialogue:",
        r"\[.*?\].*?:.*",
        r#"".*?""#,
        r"(?i)[A-Z][a-z]+\s*:\s*[A-Z]",
    ])
    .expect("dialogue patterns are valid")
});

static HEX_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:0[xX])?[0-9A-Fa-f]{8,}$").expect("valid regex"));

static VERSION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[vV]?\d+(?:\.\d+)+[A-Za-z0-9\-_]*$").expect("valid regex"));

static CAPS_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("valid regex"));

static PATH_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w\-.]*[/\\])+[\w\-.]*$|^[\w\-]+(?:\.[\w\-]+)*\.[A-Za-z0-9]{1,5}$").expect("valid regex")
});

static GAME_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:you|your|the|and|press|click|continue|start|quit|save|load|level|quest|",
        r"player|health|attack|item|inventory|talk|find|go|get|open|close|yes|no|please|",
        r"thank|hello|welcome|game|back|next|select|option|settings|options)\b",
        r"|[.!?]\s*$|[.!?]\s+[A-Z]"
    ))
    .expect("valid regex")
});

/// Whether `name` contains one of the text keywords (case-insensitive)
#[must_use]
pub fn name_is_relevant(name: &str) -> bool {
    let lower = name.to_lowercase();
    NAME_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether `content` has a dialogue-shaped fragment
///
/// Quoted strings, `Name: Text` lines, SRT timestamps, `"text": "..."`
/// JSON pairs and `<subtitle>` markup all qualify.
#[must_use]
pub fn contains_dialogue_pattern(content: &str) -> bool {
    DIALOGUE_PATTERNS.is_match(content)
}

/// Strict relevance: the name mentions text, or the content looks like dialogue
#[must_use]
pub fn is_text_relevant(name: &str, content: &str) -> bool {
    name_is_relevant(name) || (!content.is_empty() && contains_dialogue_pattern(content))
}

/// Share of alphabetic characters in `text`
#[must_use]
pub fn letter_density(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    text.chars().filter(|c| c.is_alphabetic()).count() as f64 / total as f64
}

/// Reject technical-looking strings
///
/// Hex blobs, version numbers, all-caps identifiers and paths or file
/// names are rejected, as is anything under four characters or with a
/// letter density of 30% or less.
#[must_use]
pub fn is_valid_text_candidate(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < MIN_CANDIDATE_CHARS {
        return false;
    }
    if HEX_BLOB.is_match(text) || VERSION_NUMBER.is_match(text) || PATH_LIKE.is_match(text) {
        return false;
    }
    if CAPS_IDENTIFIER.is_match(text) && !text.contains(' ') {
        return false;
    }
    letter_density(text) > MIN_LETTER_DENSITY
}

/// Loose, name-agnostic test used where field names carry no meaning
#[must_use]
pub fn is_potential_game_text(text: &str) -> bool {
    is_valid_text_candidate(text) && (GAME_TEXT.is_match(text) || text.trim().chars().count() > LONG_TEXT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_keywords() {
        assert!(is_text_relevant("SubtitleData", ""));
        assert!(is_text_relevant("m_DialogLines", ""));
        assert!(is_text_relevant("ui_Strings", ""));
        assert!(!is_text_relevant("m_Position", ""));
    }

    #[test]
    fn test_dialogue_patterns() {
        assert!(contains_dialogue_pattern(r#"{"text": "Hello there"}"#));
        assert!(contains_dialogue_pattern("<subtitle id=\"1\">Hi</subtitle>"));
        assert!(contains_dialogue_pattern("00:01:02,500 --> 00:01:04,000"));
        assert!(contains_dialogue_pattern("Dialogue: 0,0:00:01.00"));
        assert!(contains_dialogue_pattern("John: Where are you going?"));
        assert!(contains_dialogue_pattern("he said \"run\""));
        assert!(!contains_dialogue_pattern("plain words without any markers"));
        assert!(is_text_relevant("m_Value", "Alice: Good morning"));
        assert!(!is_text_relevant("m_Value", ""));
    }

    #[test]
    fn test_candidate_rejects_technical_strings() {
        assert!(!is_valid_text_candidate("abc"));
        assert!(!is_valid_text_candidate("deadbeefcafebabe"));
        assert!(!is_valid_text_candidate("0x1F2E3D4C"));
        assert!(!is_valid_text_candidate("v1.2.3"));
        assert!(!is_valid_text_candidate("2021.3.4f1"));
        assert!(!is_valid_text_candidate("MAX_PLAYER_COUNT"));
        assert!(!is_valid_text_candidate("Assets/Scripts/Player.cs"));
        assert!(!is_valid_text_candidate("texture_atlas.png"));
        assert!(!is_valid_text_candidate("12345 6789 !!"));
        assert!(is_valid_text_candidate("Hello world"));
        assert!(is_valid_text_candidate("Bienvenue à bord"));
        assert!(is_valid_text_candidate("GAME OVER"));
    }

    #[test]
    fn test_potential_game_text() {
        assert!(is_potential_game_text("Press any key"));
        assert!(is_potential_game_text("It works."));
        assert!(is_potential_game_text("Lorem ipsum dolor sit amet consectetur"));
        assert!(!is_potential_game_text("Blorf"));
        assert!(!is_potential_game_text("m_LocalRotation.png"));
    }
}
