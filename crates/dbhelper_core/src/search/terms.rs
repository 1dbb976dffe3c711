//! Search string tokenization and `LIKE` expression folding.

use super::keywords::{Keyword, KeywordTranslator};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Terms shorter than this many characters are ignored.
pub const MIN_TERM_LENGTH: usize = 2;

static QUOTED_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid quoted literal regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchToken {
    Term(String),
    Connector(Connector),
    /// Negates the next term.
    Not,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedSearch {
    pub tokens: Vec<SearchToken>,
    /// Terms dropped for being too short.
    pub ignored: Vec<String>,
}

/// Splits `search` into terms and keywords.
///
/// Quoted phrases are extracted first so their inner spaces survive the
/// whitespace split; a phrase is always a term, even when it spells a
/// keyword or is a single character.
pub fn tokenize_search(search: &str, translator: &dyn KeywordTranslator) -> TokenizedSearch {
    let mut literals: Vec<String> = Vec::new();
    let masked = QUOTED_LITERAL_RE.replace_all(search, |caps: &Captures<'_>| {
        let marker = literal_marker(literals.len());
        literals.push(caps[1].to_string());
        marker
    });

    let mut result = TokenizedSearch::default();
    for raw in masked.split_whitespace() {
        if let Some(literal) = literals
            .iter()
            .enumerate()
            .find_map(|(index, literal)| (literal_marker(index) == raw).then_some(literal))
        {
            result.tokens.push(SearchToken::Term(literal.clone()));
            continue;
        }

        match translator.recognize(raw) {
            Some(Keyword::And) => result.tokens.push(SearchToken::Connector(Connector::And)),
            Some(Keyword::Or) => result.tokens.push(SearchToken::Connector(Connector::Or)),
            Some(Keyword::Not) => result.tokens.push(SearchToken::Not),
            None if raw.chars().count() < MIN_TERM_LENGTH => result.ignored.push(raw.to_string()),
            None => result.tokens.push(SearchToken::Term(raw.to_string())),
        }
    }

    result
}

fn literal_marker(index: usize) -> String {
    format!("_LIT{index}_")
}

/// Escapes `LIKE` wildcards so the term matches literally with
/// `ESCAPE '\'`.
pub fn escape_like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchExpression {
    /// Folded condition, `None` when no term survived.
    pub sql: Option<String>,
    pub warnings: Vec<String>,
}

/// Folds tokens into one condition across `fields`.
///
/// `placeholder` receives each `%term%` pattern and returns the
/// placeholder name to bind it to. Terms without an explicit connector
/// between them are joined with `AND`.
pub fn fold_search_tokens(
    tokens: &[SearchToken],
    fields: &[String],
    mut placeholder: impl FnMut(String) -> String,
) -> SearchExpression {
    let mut expression = SearchExpression::default();
    if fields.is_empty() {
        return expression;
    }

    let mut parts: Vec<String> = Vec::new();
    let mut pending: Option<Connector> = None;
    let mut negate = false;
    let mut clauses = 0usize;

    for token in tokens {
        match token {
            SearchToken::Not => negate = true,
            SearchToken::Connector(connector) => {
                if parts.is_empty() {
                    push_warning(
                        &mut expression.warnings,
                        "The search terms may not start with a logical operator.",
                    );
                } else if pending.is_some() || negate {
                    push_warning(
                        &mut expression.warnings,
                        "The search terms may not contain consecutive logical operators.",
                    );
                } else {
                    pending = Some(*connector);
                }
            }
            SearchToken::Term(term) => {
                if !parts.is_empty() {
                    let connector = pending.take().unwrap_or(Connector::And);
                    parts.push(connector.as_sql().to_string());
                }

                let name = placeholder(format!("%{}%", escape_like_pattern(term)));
                let (operator, joiner) = if negate {
                    ("NOT LIKE", " AND ")
                } else {
                    ("LIKE", " OR ")
                };
                let field_tokens = fields
                    .iter()
                    .map(|field| format!("{field} {operator} {name} ESCAPE '\\'"))
                    .collect::<Vec<_>>();
                parts.push(format!("({})", field_tokens.join(joiner)));
                negate = false;
                clauses += 1;
            }
        }
    }

    if pending.is_some() {
        push_warning(
            &mut expression.warnings,
            "The search terms may not end with a logical operator.",
        );
    }

    expression.sql = match clauses {
        0 => None,
        1 => Some(parts.join(" ")),
        _ => Some(format!("({})", parts.join(" "))),
    };
    expression
}

fn push_warning(warnings: &mut Vec<String>, message: &str) {
    if !warnings.iter().any(|known| known == message) {
        warnings.push(message.to_string());
    }
}
