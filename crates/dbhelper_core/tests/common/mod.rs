#![allow(dead_code)]

use dbhelper_core::{
    db_params, DbHelper, Entity, FilterCriteria, FilterDefinition, KeyChange, Record, RecordFilter,
};
use std::cell::RefCell;

pub const SCHEMA: &str = "
    CREATE TABLE products (
        product_id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT NOT NULL,
        price INTEGER NOT NULL DEFAULT 0,
        active TEXT NOT NULL DEFAULT 'yes',
        released_at TEXT
    );
    CREATE TABLE variants (
        variant_id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        label TEXT NOT NULL
    );
    CREATE TABLE ticket_ids (
        ticket_id INTEGER PRIMARY KEY AUTOINCREMENT
    );
    CREATE TABLE tickets (
        ticket_id INTEGER PRIMARY KEY,
        label TEXT NOT NULL
    );
";

pub const PRODUCTS: [(&str, i64); 5] = [
    ("Product one", 100),
    ("Product two", 200),
    ("Product three", 300),
    ("Foo bar", 400),
    ("Foo", 500),
];

/// In-memory helper with the schema but no rows.
pub fn empty_db() -> DbHelper {
    let mut db = DbHelper::new();
    db.add_connection("tests", ":memory:").unwrap();
    db.connection().unwrap().execute_batch(SCHEMA).unwrap();
    db
}

/// In-memory helper with the schema and the five products.
pub fn seeded_db() -> DbHelper {
    let mut db = empty_db();
    for (label, price) in PRODUCTS {
        db.insert_dynamic("products", &db_params! { "label" => label, "price" => price })
            .unwrap();
    }
    db
}

pub fn product_count(db: &mut DbHelper) -> i64 {
    db.fetch_count(
        "SELECT COUNT(*) AS `count` FROM `products`",
        &Default::default(),
    )
    .unwrap()
}

/// Plain filter over the products table.
pub struct ProductFilter;

impl FilterDefinition for ProductFilter {
    fn table_name(&self) -> &str {
        "products"
    }

    fn table_alias(&self) -> &str {
        "prod"
    }

    fn select_fields(&self, _criteria: &FilterCriteria<Self>) -> Vec<String> {
        vec![
            "prod.`product_id`".to_string(),
            "prod.`label`".to_string(),
            "prod.`price`".to_string(),
        ]
    }

    fn search_fields(&self, _criteria: &FilterCriteria<Self>) -> Vec<String> {
        vec!["prod.`label`".to_string()]
    }

    fn init(&self, criteria: &mut FilterCriteria<Self>) {
        criteria.set_order_by("prod.`product_id`", dbhelper_core::SortOrder::Asc);
    }
}

/// Products entity recording every hook call.
#[derive(Debug, Default)]
pub struct Products {
    pub events: RefCell<Vec<String>>,
    pub only_active: bool,
}

impl Entity for Products {
    fn table_name(&self) -> &str {
        "products"
    }

    fn primary_name(&self) -> &str {
        "product_id"
    }

    fn type_name(&self) -> &str {
        "product"
    }

    fn default_sort_key(&self) -> &str {
        "label"
    }

    fn searchable_columns(&self) -> Vec<(String, String)> {
        vec![("label".to_string(), "Label".to_string())]
    }

    fn collection_label(&self) -> String {
        "Products".to_string()
    }

    fn init_record(&self, record: &mut Record<Self>) {
        record.register_record_key("label", "Label", true);
    }

    fn on_registered_key_modified(&self, _record: &Record<Self>, change: &KeyChange) {
        self.events.borrow_mut().push(format!(
            "{}:{}->{}",
            change.name, change.old_value, change.new_value
        ));
    }

    fn on_created(
        &self,
        record: &mut Record<Self>,
        _db: &mut DbHelper,
    ) -> dbhelper_core::DbResult<()> {
        self.events
            .borrow_mut()
            .push(format!("created:{}", record.id().unwrap_or_default()));
        Ok(())
    }

    fn prepare_filter(
        &self,
        criteria: &mut FilterCriteria<RecordFilter<Self>>,
    ) -> dbhelper_core::DbResult<()> {
        if self.only_active {
            criteria.add_where_column_equals("`products`.`active`", "yes")?;
        }
        Ok(())
    }
}

/// Variants of one product.
pub struct Variants;

impl Entity for Variants {
    fn table_name(&self) -> &str {
        "variants"
    }

    fn primary_name(&self) -> &str {
        "variant_id"
    }

    fn type_name(&self) -> &str {
        "variant"
    }

    fn default_sort_key(&self) -> &str {
        "label"
    }

    fn searchable_columns(&self) -> Vec<(String, String)> {
        vec![("label".to_string(), "Label".to_string())]
    }

    fn parent_type(&self) -> Option<&str> {
        Some("product")
    }
}

/// Tickets take their ids from a separate table.
pub struct Tickets {
    pub id_table: &'static str,
}

impl Entity for Tickets {
    fn table_name(&self) -> &str {
        "tickets"
    }

    fn primary_name(&self) -> &str {
        "ticket_id"
    }

    fn type_name(&self) -> &str {
        "ticket"
    }

    fn default_sort_key(&self) -> &str {
        "ticket_id"
    }

    fn searchable_columns(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn id_table(&self) -> Option<&str> {
        Some(self.id_table)
    }
}
