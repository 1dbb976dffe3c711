mod common;

use chrono::NaiveDate;
use common::{Products, Tickets, Variants};
use dbhelper_core::{db_params, Collection, DbError, DbHelper, DbValue, Params, SortOrder};

fn add_variants(db: &mut DbHelper) {
    for (product_id, label) in [(1, "Small"), (1, "Large"), (2, "Blue")] {
        db.insert_dynamic(
            "variants",
            &db_params! { "product_id" => product_id, "label" => label },
        )
        .unwrap();
    }
}

#[test]
fn creating_a_record_requires_a_transaction() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());

    let err = products
        .create_new_record(&mut db, db_params! { "label" => "Widget" })
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::TransactionRequired { ref operation } if operation == "Create a new product"
    ));
    assert_eq!(common::product_count(&mut db), 5);
}

#[test]
fn created_record_is_loaded_and_announced() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());

    db.start_transaction().unwrap();
    let record = products
        .create_new_record(&mut db, db_params! { "label" => "Widget", "price" => 7 })
        .unwrap();
    assert_eq!(record.id(), Some(6));
    assert_eq!(record.record_string_key("label", ""), "Widget");
    assert_eq!(record.record_int_key("price", 0), 7);
    assert!(record.record_boolean_key("active", false));
    assert!(!record.is_modified());
    db.commit_transaction().unwrap();

    assert_eq!(
        products.entity().events.borrow().as_slice(),
        &["created:6".to_string()]
    );
    assert_eq!(common::product_count(&mut db), 6);
}

#[test]
fn records_are_cached_per_collection() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());

    products.get_by_id(&mut db, 1).unwrap();
    let count = db.query_count();
    let record = products.get_by_id(&mut db, 1).unwrap();
    assert_eq!(record.record_string_key("label", ""), "Product one");
    assert_eq!(db.query_count(), count);

    assert!(matches!(
        products.get_by_id(&mut db, 99),
        Err(DbError::RecordDoesNotExist { id: 99, .. })
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());
    let record = products.get_by_id(&mut db, 1).unwrap();

    match record.set_record_key("colour", "red") {
        Err(DbError::RecordKeyUnknown { key, available, .. }) => {
            assert_eq!(key, "colour");
            assert!(available.contains(&"label".to_string()));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(record.is_modified_key("colour").is_err());
}

#[test]
fn unchanged_values_do_not_mark_the_record() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());
    let record = products.get_by_id(&mut db, 1).unwrap();

    assert!(!record.set_record_key("label", "Product one").unwrap());
    assert!(!record.set_record_key("price", "100").unwrap());
    assert!(!record.is_modified());
    assert!(products.entity().events.borrow().is_empty());
}

#[test]
fn modified_record_is_saved_inside_a_transaction() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());
    let record = products.get_by_id(&mut db, 1).unwrap();

    assert!(record.set_record_key("label", "Renamed").unwrap());
    assert!(record.set_record_key("label", "Again").unwrap());
    assert!(record.set_record_key("price", 150).unwrap());
    assert!(record.is_modified_key("label").unwrap());
    assert_eq!(record.modified_keys(), &["label".to_string(), "price".to_string()]);

    assert!(matches!(
        record.save(&mut db),
        Err(DbError::TransactionRequired { ref operation }) if operation == "Save product record [1]"
    ));

    db.start_transaction().unwrap();
    assert!(record.save(&mut db).unwrap());
    assert!(!record.save(&mut db).unwrap());
    db.commit_transaction().unwrap();
    assert!(!record.is_modified());

    assert_eq!(
        products.entity().events.borrow().as_slice(),
        &["label:Product one->Renamed".to_string()]
    );

    let mut fresh = Collection::new(Products::default());
    let stored = fresh.get_by_id(&mut db, 1).unwrap();
    assert_eq!(stored.record_string_key("label", ""), "Again");
    assert_eq!(stored.record_int_key("price", 0), 150);
}

#[test]
fn boolean_and_date_keys() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());
    let record = products.get_by_id(&mut db, 2).unwrap();

    assert!(record.record_boolean_key("active", false));
    record.set_record_boolean_key("active", false, true).unwrap();
    assert_eq!(record.record_string_key("active", ""), "no");
    assert!(!record.record_boolean_key("active", true));

    assert_eq!(record.record_date_key("released_at", None), None);
    record.set_record_key("released_at", "2024-03-01").unwrap();
    assert_eq!(
        record.record_date_key("released_at", None),
        NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|date| date.and_hms_opt(0, 0, 0))
    );
    record
        .set_record_key("released_at", "2024-03-01 08:15:00")
        .unwrap();
    assert_eq!(
        record.record_date_key("released_at", None),
        NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|date| date.and_hms_opt(8, 15, 0))
    );
    assert_eq!(record.record_int_key("released_at", -1), -1);
}

#[test]
fn lookups_by_key_and_existence_checks() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());

    let found = products.get_by_key(&mut db, "label", "Foo").unwrap();
    assert_eq!(found.and_then(|record| record.id()), Some(5));
    assert!(products
        .get_by_key(&mut db, "label", "Nothing")
        .unwrap()
        .is_none());
    assert_eq!(
        products
            .get_by_key(&mut db, "product_id", 3)
            .unwrap()
            .and_then(|record| record.id()),
        Some(3)
    );

    assert!(products.id_exists(&mut db, 3).unwrap());
    assert!(!products.id_exists(&mut db, 42).unwrap());
    assert_eq!(
        products
            .record_key_value_exists(&mut db, "price", 400)
            .unwrap(),
        Some(4)
    );

    products.get_by_id(&mut db, 2).unwrap();
    assert!(products.delete_record(&mut db, 2).unwrap());
    assert!(!products.id_exists(&mut db, 2).unwrap());
}

#[test]
fn all_records_follow_the_default_sort() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());

    let labels = products
        .get_all(&mut db)
        .unwrap()
        .iter()
        .map(|record| record.record_string_key("label", ""))
        .collect::<Vec<_>>();
    assert_eq!(
        labels,
        vec!["Foo", "Foo bar", "Product one", "Product three", "Product two"]
    );
    assert_eq!(products.count_records(&mut db).unwrap(), 5);
}

#[test]
fn collection_filter_searches_and_sorts() {
    let mut db = common::seeded_db();
    let products = Collection::new(Products::default());

    let mut criteria = products.get_filter_criteria();
    criteria.set_search("foo");
    assert_eq!(criteria.get_ids(&mut db).unwrap(), vec![5, 4]);

    let mut criteria = products.get_filter_criteria();
    criteria.set_order_by("price", SortOrder::Desc).set_limit(0, 2);
    assert_eq!(criteria.get_ids(&mut db).unwrap(), vec![5, 4]);
}

#[test]
fn entity_can_narrow_its_filters() {
    let mut db = common::seeded_db();
    db.update(
        "UPDATE products SET active = 'no' WHERE product_id = :id",
        &db_params! { "id" => 1 },
    )
    .unwrap();

    let mut active = Collection::new(Products {
        only_active: true,
        ..Products::default()
    });
    assert_eq!(active.count_records(&mut db).unwrap(), 4);
    assert_eq!(active.get_all(&mut db).unwrap().len(), 4);
}

#[test]
fn subcollection_needs_a_parent() {
    let mut db = common::seeded_db();
    add_variants(&mut db);
    let mut variants = Collection::new(Variants);

    assert!(matches!(
        variants.get_all(&mut db),
        Err(DbError::NoParentRecordBound { ref collection }) if collection == "variant"
    ));
    assert!(matches!(
        variants.get_by_id(&mut db, 1),
        Err(DbError::NoParentRecordBound { .. })
    ));
    assert_eq!(variants.parent_type().unwrap(), "product");
}

#[test]
fn bound_subcollection_is_scoped_to_its_parent() {
    let mut db = common::seeded_db();
    add_variants(&mut db);
    let mut products = Collection::new(Products::default());
    let mut variants = Collection::new(Variants);

    let product = products.get_by_id(&mut db, 1).unwrap();
    variants.bind_parent_record(product).unwrap();
    assert_eq!(variants.foreign_keys().get("product_id"), Some(&DbValue::Integer(1)));
    assert_eq!(
        variants.parent_record().map(|parent| parent.id),
        Some(1)
    );

    let labels = variants
        .get_all(&mut db)
        .unwrap()
        .iter()
        .map(|record| record.record_string_key("label", ""))
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["Large", "Small"]);
    assert_eq!(variants.count_records(&mut db).unwrap(), 2);

    assert!(matches!(
        variants.get_by_id(&mut db, 3),
        Err(DbError::RecordDoesNotExist { .. })
    ));
    let small = variants.get_by_id(&mut db, 1).unwrap();
    assert_eq!(small.parent_record().map(|parent| parent.type_name.as_str()), Some("product"));

    db.start_transaction().unwrap();
    let created = variants
        .create_new_record(&mut db, db_params! { "label" => "Medium" })
        .unwrap();
    assert_eq!(created.record_int_key("product_id", 0), 1);
    db.commit_transaction().unwrap();
}

#[test]
fn scoping_columns_cannot_be_changed_through_a_record() {
    let mut db = common::seeded_db();
    add_variants(&mut db);
    let mut products = Collection::new(Products::default());
    let mut variants = Collection::new(Variants);

    let product = products.get_by_id(&mut db, 1).unwrap();
    variants.bind_parent_record(product).unwrap();
    let small = variants.get_by_id(&mut db, 1).unwrap();

    assert!(!small.set_record_key("product_id", 1).unwrap());
    assert!(matches!(
        small.set_record_key("product_id", 2),
        Err(DbError::ForeignKeyReadOnly { ref key, .. }) if key == "product_id"
    ));
    assert_eq!(small.record_int_key("product_id", 0), 1);
    assert!(!small.is_modified());

    assert!(small.set_record_key("label", "Tiny").unwrap());
    db.start_transaction().unwrap();
    assert!(small.save(&mut db).unwrap());
    db.commit_transaction().unwrap();

    let stored = db
        .fetch_data("variants", &db_params! { "variant_id" => 1 }, &["product_id", "label"])
        .unwrap()
        .unwrap();
    assert_eq!(stored["product_id"].as_i64(), Some(1));
    assert_eq!(stored["label"].to_string(), "Tiny");
}

#[test]
fn parent_binding_rules() {
    let mut db = common::seeded_db();
    let mut products = Collection::new(Products::default());
    let mut variants = Collection::new(Variants);
    let mut other_products = Collection::new(Products::default());

    let first = products.get_by_id(&mut db, 1).unwrap();
    variants.bind_parent_record(first).unwrap();
    assert!(matches!(
        other_products.bind_parent_record(first),
        Err(DbError::BindingNotAllowed { .. })
    ));
    assert!(matches!(
        other_products.parent_type(),
        Err(DbError::CollectionHasNoParent { .. })
    ));

    let second = products.get_by_id(&mut db, 2).unwrap();
    assert!(matches!(
        variants.bind_parent_record(second),
        Err(DbError::CollectionAlreadyHasParent { .. })
    ));

    let mut unbound = Collection::new(Variants);
    let template = products.create_dummy_record().unwrap();
    assert!(matches!(
        unbound.bind_parent_record(template),
        Err(DbError::BindingNotAllowed { .. })
    ));
}

#[test]
fn ids_can_come_from_a_separate_table() {
    let mut db = common::empty_db();
    let mut tickets = Collection::new(Tickets {
        id_table: "ticket_ids",
    });

    db.start_transaction().unwrap();
    let first = tickets
        .create_new_record(&mut db, db_params! { "label" => "First" })
        .unwrap()
        .id();
    let second = tickets
        .create_new_record(&mut db, db_params! { "label" => "Second" })
        .unwrap()
        .id();
    db.commit_transaction().unwrap();

    assert_eq!(first, Some(1));
    assert_eq!(second, Some(2));
    assert_eq!(
        db.fetch_count("SELECT COUNT(*) AS `count` FROM `ticket_ids`", &Params::new())
            .unwrap(),
        2
    );
}

#[test]
fn id_table_must_differ_from_record_table() {
    let mut db = common::empty_db();
    let mut tickets = Collection::new(Tickets { id_table: "tickets" });

    assert!(matches!(
        tickets.create_dummy_record(),
        Err(DbError::IdTableSameAsRecordTable { ref table, .. }) if table == "tickets"
    ));

    db.start_transaction().unwrap();
    assert!(matches!(
        tickets.create_new_record(&mut db, db_params! { "label" => "x" }),
        Err(DbError::IdTableSameAsRecordTable { .. })
    ));
    db.rollback_transaction().unwrap();
}

#[test]
fn dummy_record_exposes_metadata_only() {
    let mut products = Collection::new(Products::default());
    let describe = products.describe();
    assert_eq!(describe.type_name, "product");
    assert_eq!(describe.collection_label, "Products");
    assert_eq!(describe.record_label, "product");
    assert_eq!(describe.parent_type, None);
    assert_eq!(Collection::new(Variants).describe().parent_type.as_deref(), Some("product"));

    let dummy = products.create_dummy_record().unwrap();
    assert!(dummy.is_dummy());
    assert_eq!(dummy.id(), None);
    assert_eq!(dummy.record_keys(), vec!["product_id"]);
    assert_eq!(dummy.record_table(), "products");
    assert!(!dummy.is_modified());
}
