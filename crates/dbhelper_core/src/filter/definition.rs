//! Table-specific configuration of a filter.

use super::criteria::FilterCriteria;
use crate::db::{quote_identifier, DbResult};

/// Template used by [`FilterDefinition::query_template`]. `{TABLE}` and
/// `{ALIAS}` are filled in from the definition; the remaining tokens are
/// replaced when the query is built.
pub const DEFAULT_QUERY_TEMPLATE: &str =
    "SELECT {WHAT} FROM {TABLE} AS {ALIAS} {JOINS} {WHERE} {GROUPBY} {ORDERBY} {LIMIT}";

/// Describes what a [`FilterCriteria`] selects from.
///
/// Templates must keep the `{WHAT}`, `{JOINS}`, `{WHERE}`, `{GROUPBY}`,
/// `{ORDERBY}` and `{LIMIT}` tokens.
pub trait FilterDefinition: Sized {
    fn table_name(&self) -> &str;

    fn table_alias(&self) -> &str;

    /// Columns for item queries. Must not be empty.
    fn select_fields(&self, criteria: &FilterCriteria<Self>) -> Vec<String>;

    /// Columns searched by [`FilterCriteria::set_search`].
    fn search_fields(&self, criteria: &FilterCriteria<Self>) -> Vec<String>;

    /// Column counted by count queries.
    fn count_column(&self) -> String {
        "*".to_string()
    }

    fn query_template(&self, _criteria: &FilterCriteria<Self>) -> String {
        DEFAULT_QUERY_TEMPLATE
            .replace("{TABLE}", &quote_identifier(self.table_name()))
            .replace("{ALIAS}", self.table_alias())
    }

    /// Called once when a criteria instance is created.
    fn init(&self, _criteria: &mut FilterCriteria<Self>) {}

    /// Called before every build; add joins and conditions here.
    fn prepare_query(&self, _criteria: &mut FilterCriteria<Self>) -> DbResult<()> {
        Ok(())
    }
}
