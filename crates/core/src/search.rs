use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchMode {
    /// Plain substring, exact case.
    CaseSensitive,
    #[default]
    CaseInsensitive,
    WholeWord,
    WholeWordCaseInsensitive,
    Regex,
    RegexCaseInsensitive,
}

impl MatchMode {
    pub fn is_case_sensitive(&self) -> bool {
        matches!(self, Self::CaseSensitive | Self::WholeWord | Self::Regex)
    }
}

/// Which match a phrase search reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPeriod {
    /// Earliest match in the chat.
    WithTheFirst,
    /// Earliest match strictly after the timestamp (ms).
    After(i64),
    /// Latest match strictly before the timestamp (ms).
    Before(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub mode: MatchMode,
    pub period: SearchPeriod,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            mode: MatchMode::default(),
            period: SearchPeriod::WithTheFirst,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Regular expression matching `phrase` as a whole word.
///
/// `\b` only anchors next to word characters, so a phrase that starts or ends
/// with punctuation is anchored on whitespace or the string boundary instead.
pub fn words_only_pattern(phrase: &str) -> String {
    let escaped = regex::escape(phrase);
    let head = match phrase.chars().next() {
        Some(c) if !is_word_char(c) => r"(^|\s)",
        _ => r"\b",
    };
    let tail = match phrase.chars().last() {
        Some(c) if !is_word_char(c) => r"($|\s)",
        _ => r"\b",
    };
    format!("{head}{escaped}{tail}")
}

/// Regular expression matching `phrase` literally anywhere in the text.
pub fn substring_pattern(phrase: &str) -> String {
    regex::escape(phrase)
}
