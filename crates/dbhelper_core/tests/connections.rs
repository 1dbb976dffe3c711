mod common;

use dbhelper_core::db::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USERNAME};
use dbhelper_core::{db_params, ConnectionSettings, DbError, DbHelper, DbOptions, EventKind};
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn duplicate_connection_id_is_rejected() {
    let mut db = DbHelper::new();
    db.add_connection("main", ":memory:").unwrap();

    let err = db.add_connection("main", ":memory:").unwrap_err();
    assert!(matches!(err, DbError::DuplicateConnectionId(ref id) if id == "main"));
}

#[test]
fn selecting_unknown_connection_lists_known_ids() {
    let mut db = DbHelper::new();
    db.add_connection("main", ":memory:").unwrap();
    db.add_connection("archive", ":memory:").unwrap();

    match db.select_connection("missing") {
        Err(DbError::UnknownConnection { id, available }) => {
            assert_eq!(id, "missing");
            assert_eq!(available, vec!["main".to_string(), "archive".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn descriptor_defaults_match_mysql_conventions() {
    let mut db = DbHelper::new();
    let descriptor = db.add_connection("main", ":memory:").unwrap();
    assert_eq!(descriptor.host(), DEFAULT_HOST);
    assert_eq!(descriptor.port(), DEFAULT_PORT);
    assert_eq!(descriptor.username(), DEFAULT_USERNAME);
    assert_eq!(descriptor.init_command(), "");
}

#[test]
fn connection_is_lazy_and_reconnects_after_disconnect() {
    let mut db = DbHelper::new();
    db.add_connection("main", ":memory:").unwrap();
    assert!(!db.is_connected());

    db.init().unwrap();
    assert!(db.is_connected());

    db.disconnect().unwrap();
    assert!(!db.is_connected());

    db.fetch("SELECT 1 AS one", &Default::default()).unwrap();
    assert!(db.is_connected());
}

#[test]
fn init_observers_fire_once() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);

    let mut db = DbHelper::new();
    db.add_connection("main", ":memory:").unwrap();
    db.on_init(move || counter.set(counter.get() + 1));

    db.init().unwrap();
    db.init().unwrap();
    db.fetch("SELECT 1 AS one", &Default::default()).unwrap();

    assert!(db.is_initialized());
    assert_eq!(calls.get(), 1);
}

#[test]
fn init_command_runs_on_connect() {
    let mut db = DbHelper::new();
    db.add_connection("main", ":memory:")
        .unwrap()
        .set_init_command("CREATE TABLE boot (id INTEGER)");

    assert!(db.table_exists("boot").unwrap());
}

#[test]
fn connection_failure_keeps_password_out_of_the_message() {
    let mut db = DbHelper::new();
    db.add_connection("main", "/definitely/not/here/db.sqlite")
        .unwrap()
        .set_host("db.internal")
        .set_port(3307)
        .set_credentials("shop", "s3cret-pass");

    let err = db.init().unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, DbError::Connection { .. }));
    assert!(message.contains("shop"));
    assert!(message.contains("db.internal"));
    assert!(message.contains("3307"));
    assert!(!message.contains("s3cret-pass"));
    assert!(!db.is_initialized());
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: ConnectionSettings =
        serde_json::from_str(r#"{ "name": ":memory:", "password": "hunter2" }"#).unwrap();
    assert_eq!(settings.host, DEFAULT_HOST);
    assert_eq!(settings.port, DEFAULT_PORT);
    assert_eq!(settings.username, DEFAULT_USERNAME);
    assert!(!format!("{settings:?}").contains("hunter2"));

    let mut db = DbHelper::new();
    let descriptor = db.add_connection_from_settings("main", settings).unwrap();
    assert_eq!(descriptor.describe(), "root@:memory: on localhost");
    db.init().unwrap();
}

#[test]
fn options_deserialize_and_apply() {
    let options: DbOptions =
        serde_json::from_str(r#"{ "track-queries": true, "debugging": false }"#).unwrap();
    assert!(serde_json::from_str::<DbOptions>(r#"{ "verbose": true }"#).is_err());

    let mut db = DbHelper::new();
    db.apply_options(options);
    assert!(db.is_query_tracking_enabled());
    assert!(!db.is_query_logging_enabled());

    assert!(matches!(
        db.set_option("verbose", true),
        Err(DbError::UnknownConfigOption(_))
    ));
    db.set_option("log-queries", true).unwrap();
    assert_eq!(db.option("log-queries"), Some(true));
}

#[test]
fn file_database_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.sqlite");

    let mut db = DbHelper::new();
    db.add_connection("file", path.to_str().unwrap()).unwrap();
    db.connection()
        .unwrap()
        .execute_batch(common::SCHEMA)
        .unwrap();
    let id = db
        .insert_dynamic("products", &db_params! { "label" => "Stored", "price" => 5 })
        .unwrap();

    db.disconnect().unwrap();

    let row = db
        .fetch_data("products", &db_params! { "product_id" => id }, &["label"])
        .unwrap()
        .unwrap();
    assert_eq!(row["label"].to_string(), "Stored");
}

#[test]
fn reset_forgets_connections_and_listeners() {
    let mut db = common::seeded_db();
    db.on_init(|| {});
    db.reset();

    assert!(db.connection_ids().is_empty());
    assert!(!db.has_listener(EventKind::Init));
    assert!(matches!(db.init(), Err(DbError::NoConnectionsAdded)));
}
