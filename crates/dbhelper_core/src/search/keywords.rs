//! Boolean search keywords and their localized spellings.

use std::collections::BTreeMap;

/// Search keyword recognized in canonical or translated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    And,
    Or,
    Not,
}

impl Keyword {
    pub const ALL: [Keyword; 3] = [Self::And, Self::Or, Self::Not];

    /// Canonical upper-case spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }
}

/// Provides the localized spelling of a search keyword.
pub trait KeywordTranslator {
    fn translate(&self, keyword: Keyword) -> String;

    /// Matches a token against the canonical and translated spellings.
    fn recognize(&self, token: &str) -> Option<Keyword> {
        Keyword::ALL
            .into_iter()
            .find(|keyword| token == keyword.as_str() || token == self.translate(*keyword))
    }
}

/// Uses the canonical spellings only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl KeywordTranslator for IdentityTranslator {
    fn translate(&self, keyword: Keyword) -> String {
        keyword.as_str().to_string()
    }
}

/// Table-driven translator; keywords without an entry keep their
/// canonical spelling.
#[derive(Debug, Clone, Default)]
pub struct KeywordMap {
    entries: BTreeMap<Keyword, String>,
}

impl KeywordMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, keyword: Keyword, translation: impl Into<String>) -> Self {
        self.entries.insert(keyword, translation.into());
        self
    }
}

impl KeywordTranslator for KeywordMap {
    fn translate(&self, keyword: Keyword) -> String {
        self.entries
            .get(&keyword)
            .cloned()
            .unwrap_or_else(|| keyword.as_str().to_string())
    }
}
