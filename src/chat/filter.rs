//! Text filtering for chat lines and nicknames

/// What the text is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCheckMode {
    Chat,
    /// Stricter: also rejects empty input and unusual characters
    Nickname,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCheckResult {
    Valid,
    /// Contains a censored word
    Censored,
    /// Empty nickname
    TooShort,
    /// Nickname contains characters outside the allowed set
    InvalidCharacters,
}

impl TextCheckResult {
    pub fn is_valid(self) -> bool {
        self == TextCheckResult::Valid
    }
}

pub trait TextFilter: Send + Sync {
    fn check(&self, text: &str, mode: TextCheckMode) -> TextCheckResult;
}

/// Words refused when no list is given
pub const DEFAULT_CENSORED_WORDS: &[&str] = &["fuck", "shit"];

/// Case-insensitive censored-substring filter
#[derive(Debug, Clone)]
pub struct WordListFilter {
    words: Vec<String>,
}

impl WordListFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    fn has_censored_word(&self, lowered: &str) -> bool {
        self.words.iter().any(|word| lowered.contains(word.as_str()))
    }
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CENSORED_WORDS.iter().copied())
    }
}

impl TextFilter for WordListFilter {
    fn check(&self, text: &str, mode: TextCheckMode) -> TextCheckResult {
        let lowered = text.to_lowercase();

        match mode {
            TextCheckMode::Chat => {
                if self.has_censored_word(&lowered) {
                    TextCheckResult::Censored
                } else {
                    TextCheckResult::Valid
                }
            }
            TextCheckMode::Nickname => {
                if lowered.is_empty() {
                    TextCheckResult::TooShort
                } else if self.has_censored_word(&lowered) {
                    TextCheckResult::Censored
                } else if !lowered.chars().all(is_nickname_char) {
                    TextCheckResult::InvalidCharacters
                } else {
                    TextCheckResult::Valid
                }
            }
        }
    }
}

/// Same set as the character class `[ ^0-9a-zA-Z가-힣ㄱ-ㅎㅏ-ㅣ!?,.\s]`
/// (the `^` there is literal since it does not open the class)
fn is_nickname_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '!' | '?' | ',' | '.' | '^')
        // Hangul syllables, consonants, vowels
        || ('가'..='힣').contains(&c)
        || ('ㄱ'..='ㅎ').contains(&c)
        || ('ㅏ'..='ㅣ').contains(&c)
}
