//! Filter criteria state and query building.

use super::definition::FilterDefinition;
use crate::db::{
    build_limit_statement, format_query, DbError, DbHelper, DbResult, DbValue, Params, Row,
};
use crate::search::{
    escape_like_pattern, fold_search_tokens, tokenize_search, IdentityTranslator,
    KeywordTranslator, SearchToken, MIN_TERM_LENGTH,
};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::str::FromStr;

static SELECT_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SELECT\s*DISTINCT|SELECT").expect("valid select keyword regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(DbError::InvalidSortingOrder(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warning,
}

/// Non-fatal notice collected while interpreting a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMessage {
    pub kind: MessageKind,
    pub text: String,
}

/// Mutable SELECT builder bound to one [`FilterDefinition`].
pub struct FilterCriteria<D: FilterDefinition> {
    definition: Rc<D>,
    translator: Rc<dyn KeywordTranslator>,
    wheres: Vec<String>,
    joins: Vec<String>,
    group_by: Vec<String>,
    havings: Vec<String>,
    order_field: Option<String>,
    order_dir: SortOrder,
    limit: usize,
    offset: usize,
    distinct: bool,
    search: Option<String>,
    placeholders: Params,
    generated: HashMap<String, String>,
    placeholder_counter: usize,
    column_selects: Vec<String>,
    select_alias: Option<String>,
    criteria_values: BTreeMap<String, Vec<DbValue>>,
    messages: Vec<FilterMessage>,
    queries: Vec<(String, Params)>,
    total_unfiltered: Option<i64>,
    dump_query: bool,
    is_count: bool,
}

impl<D: FilterDefinition> FilterCriteria<D> {
    pub fn new(definition: D) -> Self {
        Self::from_shared(Rc::new(definition))
    }

    /// Creates a criteria instance sharing an existing definition.
    pub fn from_shared(definition: Rc<D>) -> Self {
        let mut criteria = Self {
            definition: Rc::clone(&definition),
            translator: Rc::new(IdentityTranslator),
            wheres: Vec::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            havings: Vec::new(),
            order_field: None,
            order_dir: SortOrder::Asc,
            limit: 0,
            offset: 0,
            distinct: false,
            search: None,
            placeholders: Params::new(),
            generated: HashMap::new(),
            placeholder_counter: 0,
            column_selects: Vec::new(),
            select_alias: None,
            criteria_values: BTreeMap::new(),
            messages: Vec::new(),
            queries: Vec::new(),
            total_unfiltered: None,
            dump_query: false,
            is_count: false,
        };
        definition.init(&mut criteria);
        criteria
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn table_name(&self) -> &str {
        self.definition.table_name()
    }

    pub fn table_alias(&self) -> &str {
        self.definition.table_alias()
    }

    /// Localizes the `AND`/`OR`/`NOT` search keywords.
    pub fn set_translator(&mut self, translator: Rc<dyn KeywordTranslator>) -> &mut Self {
        self.translator = translator;
        self
    }

    // ---- ordering and paging ----

    pub fn order_ascending(&mut self) -> &mut Self {
        self.order_dir = SortOrder::Asc;
        self
    }

    pub fn order_descending(&mut self) -> &mut Self {
        self.order_dir = SortOrder::Desc;
        self
    }

    /// Accepts `ASC` or `DESC`.
    ///
    /// # Errors
    /// - [`DbError::InvalidSortingOrder`] for anything else.
    pub fn set_sort_order(&mut self, order: &str) -> DbResult<&mut Self> {
        self.order_dir = order.parse()?;
        Ok(self)
    }

    pub fn sort_order(&self) -> SortOrder {
        self.order_dir
    }

    pub fn set_order_by(&mut self, field: impl Into<String>, order: SortOrder) -> &mut Self {
        self.order_field = Some(field.into());
        self.order_dir = order;
        self
    }

    pub fn order_field(&self) -> Option<&str> {
        self.order_field.as_deref()
    }

    /// `limit` 0 means no limit.
    pub fn set_limit(&mut self, offset: usize, limit: usize) -> &mut Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Blank strings leave the current search untouched.
    pub fn set_search(&mut self, search: &str) -> &mut Self {
        let trimmed = search.trim();
        if !trimmed.is_empty() {
            self.search = Some(trimmed.to_string());
        }
        self
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    // ---- conditions ----

    /// Adds a raw condition; identical conditions are kept once.
    ///
    /// # Errors
    /// - [`DbError::InvalidWhereStatement`] for empty or `()` conditions.
    pub fn add_where(&mut self, statement: &str) -> DbResult<&mut Self> {
        if statement.trim().is_empty() || statement.trim() == "()" {
            return Err(DbError::InvalidWhereStatement(statement.to_string()));
        }

        if !self.wheres.iter().any(|known| known == statement) {
            self.wheres.push(statement.to_string());
        }
        Ok(self)
    }

    pub fn add_where_column_is_null(&mut self, column: &str) -> DbResult<&mut Self> {
        self.add_where(&format!("{column} IS NULL"))
    }

    pub fn add_where_column_not_null(&mut self, column: &str) -> DbResult<&mut Self> {
        self.add_where(&format!("{column} IS NOT NULL"))
    }

    /// No-op for an empty value list.
    pub fn add_where_column_in<I, V>(&mut self, column: &str, values: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.add_where_column_membership(column, values, "IN")
    }

    pub fn add_where_column_not_in<I, V>(&mut self, column: &str, values: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        self.add_where_column_membership(column, values, "NOT IN")
    }

    fn add_where_column_membership<I, V>(
        &mut self,
        column: &str,
        values: I,
        operator: &str,
    ) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        let names = values
            .into_iter()
            .map(|value| self.generate_placeholder(value.into()))
            .collect::<Vec<_>>();
        if names.is_empty() {
            return Ok(self);
        }

        self.add_where(&format!("{column} {operator}({})", names.join(",")))
    }

    /// `column LIKE %value%`, with wildcards in `value` matched literally.
    pub fn add_where_column_like(&mut self, column: &str, value: &str) -> DbResult<&mut Self> {
        let column = if column.contains('`') || column.contains('.') {
            column.to_string()
        } else {
            format!("`{column}`")
        };
        let name =
            self.generate_placeholder(DbValue::Text(format!("%{}%", escape_like_pattern(value))));
        self.add_where(&format!("{column} LIKE {name} ESCAPE '\\'"))
    }

    pub fn add_where_column_equals(
        &mut self,
        column: &str,
        value: impl Into<DbValue>,
    ) -> DbResult<&mut Self> {
        let name = self.generate_placeholder(value.into());
        self.add_where(&format!("{column} = {name}"))
    }

    pub fn add_join(&mut self, statement: &str) -> &mut Self {
        push_unique(&mut self.joins, statement);
        self
    }

    pub fn add_having(&mut self, statement: &str) -> &mut Self {
        push_unique(&mut self.havings, statement);
        self
    }

    pub fn add_group_by(&mut self, column: &str) -> &mut Self {
        push_unique(&mut self.group_by, column);
        self
    }

    pub fn add_group_bys(&mut self, columns: &[&str]) -> &mut Self {
        for column in columns {
            self.add_group_by(column);
        }
        self
    }

    /// Extra column for item queries, added after the definition's fields.
    pub fn add_select_column(&mut self, column: &str) -> &mut Self {
        self.column_selects.push(column.to_string());
        self
    }

    /// Alias used to qualify the order column.
    pub fn set_select_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.select_alias = Some(alias.into());
        self
    }

    pub fn select_alias(&self) -> Option<&str> {
        self.select_alias.as_deref()
    }

    pub fn make_distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Binds a named value; `name` may omit the leading `:`.
    pub fn add_placeholder(&mut self, name: &str, value: impl Into<DbValue>) -> &mut Self {
        let name = if name.starts_with(':') {
            name.to_string()
        } else {
            format!(":{name}")
        };
        self.placeholders.insert(name, value.into());
        self
    }

    /// Every value bound by the next query.
    pub fn query_variables(&self) -> &Params {
        &self.placeholders
    }

    /// Returns the placeholder bound to `value`, creating one if needed.
    /// Equal values share a placeholder for the lifetime of the instance.
    pub fn generate_placeholder(&mut self, value: DbValue) -> String {
        let key = value.content_key();
        if let Some(name) = self.generated.get(&key) {
            return name.clone();
        }

        self.placeholder_counter += 1;
        let name = format!(":PH{:04}", self.placeholder_counter);
        self.generated.insert(key, name.clone());
        self.placeholders.insert(name.clone(), value);
        name
    }

    // ---- criteria values ----

    /// Stores a value under `kind` for later use in `prepare_query`.
    /// `NULL` and empty strings are ignored, duplicates are kept once.
    pub fn select_criteria_value(&mut self, kind: &str, value: impl Into<DbValue>) -> &mut Self {
        let value = value.into();
        if value.is_null() || value.as_text().is_some_and(|text| text.is_empty()) {
            return self;
        }

        let values = self.criteria_values.entry(kind.to_string()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
        self
    }

    pub fn select_criteria_values<I, V>(&mut self, kind: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DbValue>,
    {
        for value in values {
            self.select_criteria_value(kind, value);
        }
        self
    }

    pub fn criteria_values(&self, kind: &str) -> &[DbValue] {
        self.criteria_values
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // ---- messages and debugging ----

    pub fn messages(&self) -> &[FilterMessage] {
        &self.messages
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    fn add_message(&mut self, kind: MessageKind, text: String) {
        let exists = self
            .messages
            .iter()
            .any(|message| message.kind == kind && message.text == text);
        if !exists {
            self.messages.push(FilterMessage { kind, text });
        }
    }

    /// Echoes this builder's item queries through the helper's debug sink.
    pub fn debug_query(&mut self, enable: bool) -> &mut Self {
        self.dump_query = enable;
        self
    }

    /// Executed queries with simulated values.
    pub fn get_queries(&self) -> Vec<String> {
        self.queries
            .iter()
            .map(|(sql, params)| format_query(sql, params))
            .collect()
    }

    /// Parsed search terms; records an info message for every ignored term.
    pub fn search_terms(&mut self) -> Vec<SearchToken> {
        let Some(search) = self.search.clone() else {
            return Vec::new();
        };

        let tokenized = tokenize_search(&search, self.translator.as_ref());
        for ignored in tokenized.ignored {
            self.add_message(
                MessageKind::Info,
                format!(
                    "The term \"{ignored}\" was ignored, search terms must be at least {MIN_TERM_LENGTH} characters long."
                ),
            );
        }
        tokenized.tokens
    }

    // ---- execution ----

    /// Runs the item query.
    pub fn get_items(&mut self, db: &mut DbHelper) -> DbResult<Vec<Row>> {
        let sql = self.build_query(false)?;
        let vars = self.placeholders.clone();
        self.queries.push((sql.clone(), vars.clone()));

        let debugging = db.is_debugging_enabled();
        if self.dump_query {
            db.enable_debugging(true);
        }
        let result = db.fetch_all(&sql, &vars);
        if self.dump_query {
            db.enable_debugging(debugging);
        }

        let rows = result?;
        debug!(
            "event=filter_items module=filter status=ok table={} rows={}",
            self.table_name(),
            rows.len()
        );
        Ok(rows)
    }

    /// Runs the count query and sums the `count` column over all rows.
    pub fn count_items(&mut self, db: &mut DbHelper) -> DbResult<i64> {
        let sql = self.build_query(true)?;
        let vars = self.placeholders.clone();
        let rows = db.fetch_all(&sql, &vars)?;
        self.queries.push((sql, vars));

        Ok(rows
            .iter()
            .filter_map(|row| row.get("count").and_then(DbValue::as_i64))
            .sum())
    }

    /// Count of a fresh instance of this filter; computed once.
    pub fn count_unfiltered(&mut self, db: &mut DbHelper) -> DbResult<i64> {
        if let Some(total) = self.total_unfiltered {
            return Ok(total);
        }

        let mut pristine = self.create_pristine();
        let total = pristine.count_items(db)?;
        self.total_unfiltered = Some(total);
        Ok(total)
    }

    fn create_pristine(&self) -> Self {
        let mut pristine = Self::from_shared(Rc::clone(&self.definition));
        pristine.translator = Rc::clone(&self.translator);
        pristine
    }

    /// Renders the item (`is_count == false`) or count query.
    ///
    /// # Errors
    /// - [`DbError::EmptySelectFieldsList`] when the definition selects nothing.
    /// - [`DbError::MissingSelectKeyword`] when a distinct template has no `SELECT`.
    /// - Any error of the definition's `prepare_query` hook.
    pub fn build_query(&mut self, is_count: bool) -> DbResult<String> {
        self.is_count = is_count;

        let definition = Rc::clone(&self.definition);
        definition.prepare_query(self)?;

        let mut query = definition.query_template(self);
        if !is_count && self.distinct {
            query = inject_distinct(&query)?;
        }

        // Resolved per build, never stored in the condition list.
        let search_condition = match self.search {
            Some(_) => self.resolve_search(&definition),
            None => None,
        };

        // Distinct item queries group by every selected column.
        let (what, distinct_groups) = self.build_select(&definition)?;
        let replacements = [
            ("{WHAT}", what),
            ("{JOINS}", self.joins.join(" ")),
            ("{WHERE}", self.build_where(search_condition.as_deref())),
            ("{GROUPBY}", self.build_group_by(&distinct_groups)),
            ("{ORDERBY}", self.build_order_by()),
            ("{LIMIT}", self.build_limit()),
        ];
        for (token, value) in replacements {
            query = query.replace(token, &value);
        }

        debug!(
            "event=filter_build module=filter status=ok table={} count={is_count} conditions={}",
            definition.table_name(),
            self.wheres.len()
        );
        Ok(query)
    }

    fn resolve_search(&mut self, definition: &D) -> Option<String> {
        let fields = definition.search_fields(self);
        if fields.is_empty() {
            return None;
        }

        let tokens = self.search_terms();
        let expression = fold_search_tokens(&tokens, &fields, |pattern| {
            self.generate_placeholder(DbValue::Text(pattern))
        });
        for warning in expression.warnings {
            self.add_message(MessageKind::Warning, warning);
        }
        expression.sql
    }

    fn build_select(&self, definition: &D) -> DbResult<(String, Vec<String>)> {
        if self.is_count {
            let mut column = definition.count_column();
            if self.distinct && column == "*" {
                column = definition
                    .select_fields(self)
                    .into_iter()
                    .next()
                    .ok_or(DbError::EmptySelectFieldsList)?;
            }
            let distinct = if self.distinct { "DISTINCT " } else { "" };
            return Ok((format!("COUNT({distinct}{column}) AS `count`"), Vec::new()));
        }

        let mut selects = definition.select_fields(self);
        if selects.is_empty() {
            return Err(DbError::EmptySelectFieldsList);
        }
        selects.extend(self.column_selects.iter().cloned());
        if self.distinct {
            if let Some(field) = &self.order_field {
                selects.push(field.clone());
            }
        }

        let mut unique: Vec<String> = Vec::with_capacity(selects.len());
        for select in selects {
            push_unique(&mut unique, &select);
        }

        let groups = if self.distinct {
            unique.clone()
        } else {
            Vec::new()
        };
        Ok((unique.join(", "), groups))
    }

    fn build_where(&self, search: Option<&str>) -> String {
        let mut conditions = self.wheres.iter().map(String::as_str).collect::<Vec<_>>();
        if let Some(search) = search {
            if !conditions.contains(&search) {
                conditions.push(search);
            }
        }
        if conditions.is_empty() {
            return String::new();
        }
        format!("WHERE {}", conditions.join(" AND "))
    }

    fn build_group_by(&self, extra: &[String]) -> String {
        let mut groups = self.group_by.clone();
        for column in extra {
            push_unique(&mut groups, column);
        }
        if groups.is_empty() {
            return String::new();
        }

        let mut clause = format!("GROUP BY {}", groups.join(", "));
        if !self.havings.is_empty() {
            clause.push_str(" HAVING ");
            clause.push_str(&self.havings.join(" AND "));
        }
        clause
    }

    fn build_order_by(&self) -> String {
        let Some(field) = self.order_field.as_deref().filter(|_| !self.is_count) else {
            return String::new();
        };

        let field = if field.contains('.') {
            field.to_string()
        } else {
            let quoted = if field.starts_with('`') {
                field.to_string()
            } else {
                format!("`{field}`")
            };
            match &self.select_alias {
                Some(alias) => format!("{alias}.{quoted}"),
                None => quoted,
            }
        };

        format!("ORDER BY {field} {}", self.order_dir)
    }

    fn build_limit(&self) -> String {
        if self.is_count {
            return String::new();
        }
        build_limit_statement(self.limit, self.offset)
    }
}

/// Inserts `DISTINCT` after the first `SELECT` unless already present.
fn inject_distinct(query: &str) -> DbResult<String> {
    let found = SELECT_KEYWORD_RE
        .find(query)
        .ok_or_else(|| DbError::MissingSelectKeyword(query.to_string()))?;
    if found.as_str().contains("DISTINCT") {
        return Ok(query.to_string());
    }

    Ok(format!(
        "{} DISTINCT{}",
        &query[..found.end()],
        &query[found.end()..]
    ))
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|known| known == value) {
        list.push(value.to_string());
    }
}
