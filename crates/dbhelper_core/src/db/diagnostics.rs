//! Human-readable rendering of statements for error and debug output.
//!
//! # Invariants
//! - Nothing produced here is ever executed; execution always binds.

use super::value::{lookup_param, Params};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z0-9_]+)").expect("valid placeholder regex"));

/// Replaces every `:name` placeholder that has a value in `params` with
/// the quoted literal of that value. Unknown placeholders are kept.
pub fn format_query(sql: &str, params: &Params) -> String {
    PLACEHOLDER_RE
        .replace_all(sql, |caps: &Captures<'_>| match lookup_param(params, &caps[1]) {
            Some(value) => value.to_display_literal(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Distinct placeholder names (without `:`) in order of first appearance.
pub fn placeholder_names(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(sql) {
        let name = &caps[1];
        if !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Cross-checks the placeholders of `sql` against `params` in both
/// directions.
///
/// Returns one line per placeholder or unmatched value, and whether any
/// mismatch was found.
pub(crate) fn analyze_placeholders(sql: &str, params: &Params) -> (Vec<String>, bool) {
    let declared = placeholder_names(sql);
    let mut lines = Vec::with_capacity(declared.len());
    let mut inconsistent = false;

    for name in &declared {
        match lookup_param(params, name) {
            Some(value) => lines.push(format!(":{name} = {}", value.to_display_literal())),
            None => {
                inconsistent = true;
                lines.push(format!(":{name} = Placeholder not specified in values list"));
            }
        }
    }

    for key in params.keys() {
        let bare = key.trim_start_matches(':');
        if !declared.iter().any(|name| name == bare) {
            inconsistent = true;
            lines.push(format!(":{bare} = No matching placeholder in query"));
        }
    }

    (lines, inconsistent)
}
