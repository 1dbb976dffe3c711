//! SQL fragment builders shared by the dynamic CRUD helpers.
//!
//! Placeholders produced here are named after their column, so the data
//! map used to build a fragment can be bound as-is.

use super::value::Params;

/// Wraps an identifier in backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `` `a`=:a AND `b`=:b `` for the keys of `params`, or `1` when empty.
pub fn build_where_fields_statement(params: &Params) -> String {
    if params.is_empty() {
        return "1".to_string();
    }

    params
        .keys()
        .map(|key| column_assignment(key))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `` `a`=:a, `b`=:b `` for the keys of `data`.
pub fn build_set_statement(data: &Params) -> String {
    data.keys()
        .map(|key| column_assignment(key))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `LIMIT`/`OFFSET` clause, empty when both are zero.
///
/// A zero limit with an offset selects every row after the offset.
pub fn build_limit_statement(limit: usize, offset: usize) -> String {
    match (limit, offset) {
        (0, 0) => String::new(),
        (0, offset) => format!("LIMIT -1 OFFSET {offset}"),
        (limit, 0) => format!("LIMIT {limit}"),
        (limit, offset) => format!("LIMIT {limit} OFFSET {offset}"),
    }
}

fn column_assignment(key: &str) -> String {
    let column = key.trim_start_matches(':');
    format!("{}=:{column}", quote_identifier(column))
}
