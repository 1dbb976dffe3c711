mod common;

use common::ProductFilter;
use dbhelper_core::{
    DbError, DbValue, FilterCriteria, Keyword, KeywordMap, MessageKind, Row, SortOrder,
};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

fn labels(rows: &[Row]) -> Vec<String> {
    rows.iter().map(|row| row["label"].to_string()).collect()
}

fn search(term: &str) -> Vec<String> {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_search(term);
    labels(&criteria.get_items(&mut db).unwrap())
}

#[test]
fn unfiltered_items_and_count() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);

    let items = criteria.get_items(&mut db).unwrap();
    assert_eq!(items.len(), common::PRODUCTS.len());
    assert_eq!(criteria.count_items(&mut db).unwrap(), 5);
}

#[test]
fn simple_search() {
    assert_eq!(search("two"), vec!["Product two"]);
    assert_eq!(search("foo"), vec!["Foo bar", "Foo"]);
}

#[test]
fn search_is_rebuilt_when_changed() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);

    criteria.set_search("two");
    assert_eq!(labels(&criteria.get_items(&mut db).unwrap()), vec!["Product two"]);
    assert_eq!(criteria.count_items(&mut db).unwrap(), 1);

    criteria.set_search("three");
    assert_eq!(labels(&criteria.get_items(&mut db).unwrap()), vec!["Product three"]);
    assert_eq!(criteria.count_items(&mut db).unwrap(), 1);
    assert!(!criteria.get_queries()[2].contains("%two%"));
}

#[test]
fn search_with_or() {
    assert_eq!(search("two OR three"), vec!["Product two", "Product three"]);
}

#[test]
fn search_with_and_requires_both_terms() {
    assert_eq!(search("foo AND bar"), vec!["Foo bar"]);
    assert_eq!(search("foo bar"), vec!["Foo bar"]);
}

#[test]
fn quoted_phrase_is_one_term() {
    assert_eq!(search("\"foo bar\""), vec!["Foo bar"]);
    assert!(search("\"bar foo\"").is_empty());
}

#[test]
fn negated_term_excludes_matches() {
    assert_eq!(
        search("NOT foo"),
        vec!["Product one", "Product two", "Product three"]
    );
}

#[test]
fn or_terms_stay_inside_other_conditions() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_search("two OR three");
    criteria
        .add_where_column_equals("prod.`price`", 300)
        .unwrap();

    assert_eq!(
        labels(&criteria.get_items(&mut db).unwrap()),
        vec!["Product three"]
    );
}

#[test]
fn short_terms_are_dropped_with_info_message() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_search("a two");

    assert_eq!(labels(&criteria.get_items(&mut db).unwrap()), vec!["Product two"]);
    assert_eq!(criteria.messages().len(), 1);
    assert_eq!(criteria.messages()[0].kind, MessageKind::Info);
    assert!(criteria.messages()[0].text.contains("\"a\""));
}

#[test]
fn leading_connector_is_dropped_with_warning() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_search("AND two");

    assert_eq!(labels(&criteria.get_items(&mut db).unwrap()), vec!["Product two"]);
    assert!(criteria
        .messages()
        .iter()
        .any(|message| message.kind == MessageKind::Warning
            && message.text == "The search terms may not start with a logical operator."));
}

#[test]
fn translated_keywords_are_understood() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_translator(Rc::new(
        KeywordMap::new()
            .with(Keyword::And, "UND")
            .with(Keyword::Or, "ODER"),
    ));
    criteria.set_search("two ODER three");
    assert_eq!(criteria.get_items(&mut db).unwrap().len(), 2);

    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_translator(Rc::new(KeywordMap::new().with(Keyword::And, "UND")));
    criteria.set_search("foo UND bar");
    assert_eq!(labels(&criteria.get_items(&mut db).unwrap()), vec!["Foo bar"]);
}

#[test]
fn limit_and_offset() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);

    criteria.set_limit(0, 2);
    assert_eq!(criteria.get_items(&mut db).unwrap().len(), 2);

    criteria.set_limit(4, 2);
    assert_eq!(labels(&criteria.get_items(&mut db).unwrap()), vec!["Foo"]);

    criteria.set_limit(2, 0);
    assert_eq!(criteria.get_items(&mut db).unwrap().len(), 3);

    assert_eq!(criteria.count_items(&mut db).unwrap(), 5);
}

#[test]
fn unfiltered_count_is_memoized() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_search("foo AND bar");

    assert_eq!(criteria.get_items(&mut db).unwrap().len(), 1);
    assert_eq!(criteria.count_items(&mut db).unwrap(), 1);
    assert_eq!(criteria.count_unfiltered(&mut db).unwrap(), 5);

    let count = db.query_count();
    criteria.get_items(&mut db).unwrap();
    assert_eq!(criteria.count_unfiltered(&mut db).unwrap(), 5);
    assert_eq!(db.query_count(), count + 1);

    let mut fresh = FilterCriteria::new(ProductFilter);
    assert_eq!(
        fresh.count_items(&mut db).unwrap(),
        criteria.count_unfiltered(&mut db).unwrap()
    );
}

#[test]
fn like_condition_matches_wildcards_literally() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.add_where_column_like("label", "o_e").unwrap();
    assert!(criteria.get_items(&mut db).unwrap().is_empty());

    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.add_where_column_like("prod.label", "duct").unwrap();
    assert_eq!(criteria.count_items(&mut db).unwrap(), 3);
}

#[test]
fn membership_conditions() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria
        .add_where_column_in("prod.`product_id`", [1, 3])
        .unwrap();
    assert_eq!(
        labels(&criteria.get_items(&mut db).unwrap()),
        vec!["Product one", "Product three"]
    );

    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria
        .add_where_column_not_in("prod.`product_id`", [1, 2, 3])
        .unwrap();
    assert_eq!(criteria.count_items(&mut db).unwrap(), 2);

    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria
        .add_where_column_not_null("prod.`released_at`")
        .unwrap();
    assert_eq!(criteria.count_items(&mut db).unwrap(), 0);
}

#[test]
fn ordering_and_distinct() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.set_order_by("price", SortOrder::Desc);
    criteria.set_select_alias("prod");

    let rows = criteria.get_items(&mut db).unwrap();
    assert_eq!(rows[0]["price"], DbValue::Integer(500));

    criteria.make_distinct();
    assert_eq!(criteria.get_items(&mut db).unwrap().len(), 5);
    assert_eq!(criteria.count_items(&mut db).unwrap(), 5);
}

#[test]
fn sort_order_validation() {
    let mut criteria = FilterCriteria::new(ProductFilter);
    assert_eq!(criteria.sort_order(), SortOrder::Asc);

    criteria.order_descending();
    assert_eq!(criteria.sort_order(), SortOrder::Desc);
    criteria.set_sort_order("ASC").unwrap();
    assert_eq!(criteria.sort_order(), SortOrder::Asc);

    assert!(matches!(
        criteria.set_sort_order("INVALID"),
        Err(DbError::InvalidSortingOrder(_))
    ));
}

#[test]
fn executed_queries_are_recorded_with_values() {
    let mut db = common::seeded_db();
    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria
        .add_where_column_equals("prod.`label`", "Foo")
        .unwrap();
    criteria.add_placeholder("min_price", 10);
    criteria.add_where("prod.`price` > :min_price").unwrap();

    assert_eq!(criteria.get_items(&mut db).unwrap().len(), 1);
    let queries = criteria.get_queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("prod.`label` = 'Foo'"));
    assert!(queries[0].contains("prod.`price` > '10'"));
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn debug_query_echoes_only_item_queries() {
    let mut db = common::seeded_db();
    let buffer = SharedBuffer::default();
    db.set_debug_output(buffer.clone());

    let mut criteria = FilterCriteria::new(ProductFilter);
    criteria.debug_query(true);
    criteria.get_items(&mut db).unwrap();
    criteria.count_items(&mut db).unwrap();

    let output = String::from_utf8_lossy(&buffer.0.borrow()).into_owned();
    assert!(output.contains("Result: 5 entries"));
    assert!(!output.contains("COUNT("));
    assert!(!db.is_debugging_enabled());
}
