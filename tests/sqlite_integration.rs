#![cfg(feature = "sqlite")]

use dbal::query::ReplaceOutcome;
use dbal::schema::{ColumnInfo, ColumnType, IndexInfo, TableInfo};
use dbal::{Adapter, Backend, Config, DatabaseError, Value};
use pretty_assertions::assert_eq;

fn memory_db() -> Adapter {
    Adapter::factory(Backend::Sqlite, Config::new().file(":memory:"))
        .expect("in-memory database should open")
}

fn names(db: &mut Adapter, table: &str) -> Vec<(String, String)> {
    let mut select = db.select(&["*"], Some(table));
    select.order = vec!["username ASC".to_string()];
    select
        .run(db, &[])
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.get_text("username").unwrap(),
                row.get_text("name").unwrap(),
            )
        })
        .collect()
}

#[test_log::test]
fn crud_scenario() {
    let mut db = memory_db();

    let mut create = db.create_table("test1");
    create.field("username", ColumnType::Varchar(40), None, true, None);
    create.field("name", ColumnType::Varchar(100), None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut insert = db.insert(&[("username", ":username"), ("name", ":name")], "test1");
    let affected = insert
        .run(
            &mut db,
            &[
                (":username", Value::from("lie2815")),
                (":name", Value::from("Franz")),
            ],
        )
        .unwrap();
    assert_eq!(affected, 1);
    let affected = insert
        .run(
            &mut db,
            &[
                (":username", Value::from("reines")),
                (":name", Value::from("Jamie")),
            ],
        )
        .unwrap();
    assert_eq!(affected, 1);

    let mut update = db.update(&[("name", ":name")], "test1");
    update.where_clause = "username = :username".to_string();
    let params = [
        (":username", Value::from("lie2815")),
        (":name", Value::from("Franz Liedke")),
    ];
    assert_eq!(update.run(&mut db, &params).unwrap(), 1);
    // Re-running with the same parameter set still reports the matched row.
    assert_eq!(update.run(&mut db, &params).unwrap(), 1);

    assert_eq!(
        names(&mut db, "test1"),
        vec![
            ("lie2815".to_string(), "Franz Liedke".to_string()),
            ("reines".to_string(), "Jamie".to_string()),
        ]
    );

    let mut delete = db.delete("test1");
    delete.where_clause = "username = :username".to_string();
    assert_eq!(
        delete
            .run(&mut db, &[(":username", Value::from("lie2815"))])
            .unwrap(),
        1
    );
    assert_eq!(
        delete
            .run(&mut db, &[(":username", Value::from("reines"))])
            .unwrap(),
        1
    );

    assert!(db.drop_table("test1").run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn replace_inserts_then_updates() {
    let mut db = memory_db();

    let mut create = db.create_table("test2");
    create.field("username", ColumnType::Varchar(40), None, true, None);
    create.field("name", ColumnType::Varchar(100), None, true, None);
    create.index("PRIMARY", &["username"], false);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut insert = db.insert(&[("username", ":username"), ("name", ":name")], "test2");
    assert_eq!(
        insert
            .run(
                &mut db,
                &[
                    (":username", Value::from("reines")),
                    (":name", Value::from("Jamie")),
                ],
            )
            .unwrap(),
        1
    );

    let mut replace = db.replace(&[("name", ":name")], "test2", &[("username", ":username")]);
    let outcome = replace
        .run(
            &mut db,
            &[
                (":username", Value::from("lie2815")),
                (":name", Value::from("Franz")),
            ],
        )
        .unwrap();
    assert_eq!(outcome, ReplaceOutcome::Inserted);

    let mut replace = db.replace(&[("name", ":name")], "test2", &[("username", ":username")]);
    let outcome = replace
        .run(
            &mut db,
            &[
                (":username", Value::from("lie2815")),
                (":name", Value::from("Franz Liedke")),
            ],
        )
        .unwrap();
    assert_eq!(outcome, ReplaceOutcome::Updated);

    // Same key again: still an update, never a duplicate row.
    let mut replace = db.replace(&[("name", ":name")], "test2", &[("username", ":username")]);
    assert_eq!(
        replace
            .run(
                &mut db,
                &[
                    (":username", Value::from("lie2815")),
                    (":name", Value::from("Franz Liedke")),
                ],
            )
            .unwrap(),
        ReplaceOutcome::Updated
    );

    assert_eq!(
        names(&mut db, "test2"),
        vec![
            ("lie2815".to_string(), "Franz Liedke".to_string()),
            ("reines".to_string(), "Jamie".to_string()),
        ]
    );
}

#[test_log::test]
fn create_and_remove_table() {
    let mut db = memory_db();

    let mut create = db.create_table("test1");
    create.field("id", ColumnType::Serial, None, true, None);
    create.index("PRIMARY", &["id"], false);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut exists = db.table_exists("test1");
    assert!(exists.run(&mut db, &[]).unwrap());

    assert!(db.drop_table("test1").run(&mut db, &[]).unwrap());

    // The probe re-runs with empty parameters and sees the drop.
    assert!(!exists.run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn fill_and_empty_table() {
    let mut db = memory_db();

    let mut create = db.create_table("test2");
    create.field("id", ColumnType::Serial, None, true, None);
    create.field("number", ColumnType::Int, None, true, None);
    create.index("PRIMARY", &["id"], false);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut insert = db.insert(&[("number", ":num")], "test2");
    assert_eq!(insert.run(&mut db, &[(":num", Value::from(4_i64))]).unwrap(), 1);
    assert!(db.insert_id().unwrap() > 0);

    let mut select = db.select(&["number"], Some("test2"));
    let rows = select.run(&mut db, &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i64("number"), Some(4));

    assert!(db.truncate("test2").run(&mut db, &[]).unwrap());

    assert!(select.run(&mut db, &[]).unwrap().is_empty());
}

#[test_log::test]
fn complex_table_info() {
    let mut db = memory_db();

    let mut create = db.create_table("test3");
    create.field("id", ColumnType::Serial, None, true, None);
    create.field("number", ColumnType::Int, None, true, None);
    create.index("PRIMARY", &["id"], false);
    create.index("number_idx", &["number"], true);
    assert!(create.run(&mut db, &[]).unwrap());

    let info = db.table_info("test3").run(&mut db, &[]).unwrap();

    let expected = TableInfo {
        columns: vec![
            (
                "id".to_string(),
                ColumnInfo {
                    type_name: "INTEGER".to_string(),
                    default: None,
                    allow_null: false,
                },
            ),
            (
                "number".to_string(),
                ColumnInfo {
                    type_name: "INTEGER".to_string(),
                    default: None,
                    allow_null: true,
                },
            ),
        ],
        primary_key: vec!["id".to_string()],
        unique: vec![vec!["number".to_string()]],
        indices: vec![(
            "number_idx".to_string(),
            IndexInfo {
                fields: vec!["number".to_string()],
                unique: true,
            },
        )],
    };
    assert_eq!(info, expected);
}

#[test_log::test]
fn default_values_round_trip() {
    let mut db = memory_db();

    let mut create = db.create_table("test4");
    create.field("id", ColumnType::Serial, None, true, None);
    create.field(
        "default_null",
        ColumnType::Varchar(255),
        Some(Value::from("abc")),
        true,
        None,
    );
    create.field(
        "default_not_null",
        ColumnType::Varchar(255),
        Some(Value::from("abc")),
        false,
        None,
    );
    create.field("no_default_null", ColumnType::Varchar(255), None, true, None);
    create.field(
        "no_default_not_null",
        ColumnType::Varchar(255),
        None,
        false,
        None,
    );
    create.index("PRIMARY", &["id"], false);
    assert!(create.run(&mut db, &[]).unwrap());

    let info = db.table_info("test4").run(&mut db, &[]).unwrap();

    let default_null = info.column("default_null").unwrap();
    assert_eq!(default_null.default.as_deref(), Some("abc"));
    assert!(default_null.allow_null);

    let default_not_null = info.column("default_not_null").unwrap();
    assert_eq!(default_not_null.default.as_deref(), Some("abc"));
    assert!(!default_not_null.allow_null);

    assert_eq!(info.column("no_default_null").unwrap().default, None);
    assert_eq!(info.column("no_default_not_null").unwrap().default, None);
    assert!(!info.column("no_default_not_null").unwrap().allow_null);
}

#[test_log::test]
fn drop_field_reattaches_surviving_indices() {
    let mut db = memory_db();

    let mut create = db.create_table("test5");
    create.field("id", ColumnType::Serial, None, true, None);
    create.field("number", ColumnType::Int, None, true, None);
    create.field("other", ColumnType::Int, None, true, None);
    create.index("PRIMARY", &["id"], false);
    create.index("number_idx", &["number"], false);
    create.index("other_idx", &["other"], false);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut insert = db.insert(&[("number", ":n"), ("other", ":o")], "test5");
    assert_eq!(
        insert
            .run(&mut db, &[(":n", Value::from(1_i64)), (":o", Value::from(2_i64))])
            .unwrap(),
        1
    );

    assert!(db.drop_field("test5", "number").run(&mut db, &[]).unwrap());

    assert!(!db.field_exists("test5", "number").run(&mut db, &[]).unwrap());
    assert!(db.field_exists("test5", "other").run(&mut db, &[]).unwrap());

    let info = db.table_info("test5").run(&mut db, &[]).unwrap();
    assert!(info.index("number_idx").is_none());
    assert_eq!(
        info.index("other_idx"),
        Some(&IndexInfo {
            fields: vec!["other".to_string()],
            unique: false,
        })
    );
    assert_eq!(info.primary_key, vec!["id".to_string()]);

    // Data survived the rebuild.
    let mut select = db.select(&["*"], Some("test5"));
    let rows = select.run(&mut db, &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i64("other"), Some(2));

    // Existence probes still agree with the catalog.
    assert!(db.index_exists("test5", "other_idx").run(&mut db, &[]).unwrap());
    assert!(!db.index_exists("test5", "number_idx").run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn offset_without_limit_returns_remaining_rows() {
    let mut db = memory_db();

    let mut create = db.create_table("numbers");
    create.field("n", ColumnType::Int, None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut insert = db.insert(&[("n", ":n")], "numbers");
    for n in 1_i64..=3 {
        assert_eq!(insert.run(&mut db, &[(":n", Value::from(n))]).unwrap(), 1);
    }

    let mut select = db.select(&["n"], Some("numbers"));
    select.order = vec!["n ASC".to_string()];
    select.offset = 1;
    let rows = select.run(&mut db, &[]).unwrap();
    assert_eq!(
        rows.iter().map(|r| r.get_i64("n").unwrap()).collect::<Vec<_>>(),
        vec![2, 3]
    );
}

#[test_log::test]
fn select_requires_fields() {
    let mut db = memory_db();
    let mut select = db.select(&[], Some("anything"));
    assert!(matches!(
        select.run(&mut db, &[]),
        Err(DatabaseError::Compile(_))
    ));
}

#[test_log::test]
fn run_once_rejects_fresh_parameters() {
    let mut db = memory_db();

    let mut create = db.create_table("test6");
    create.field("id", ColumnType::Serial, None, true, None);
    create.index("PRIMARY", &["id"], false);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut truncate = db.truncate("test6");
    assert!(truncate.run(&mut db, &[]).unwrap());
    assert!(matches!(
        truncate.run(&mut db, &[(":x", Value::from(1_i64))]),
        Err(DatabaseError::Usage(_))
    ));
}

#[test_log::test]
fn existence_probes_are_idempotent() {
    let mut db = memory_db();

    let mut create = db.create_table("test7");
    create.field("id", ColumnType::Int, None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut table_exists = db.table_exists("test7");
    let mut missing = db.table_exists("nope");
    let mut field_exists = db.field_exists("test7", "id");
    for _ in 0..3 {
        assert!(table_exists.run(&mut db, &[]).unwrap());
        assert!(!missing.run(&mut db, &[]).unwrap());
        assert!(field_exists.run(&mut db, &[]).unwrap());
    }
}

#[test_log::test]
fn ddl_soft_failure_reports_false() {
    let mut db = memory_db();
    assert!(!db.drop_table("never_created").run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn table_prefix_applies_everywhere() {
    let mut db = Adapter::factory(
        Backend::Sqlite,
        Config::new().file(":memory:").prefix("app_"),
    )
    .expect("in-memory database should open");

    let mut create = db.create_table("users");
    create.field("username", ColumnType::Varchar(40), None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    assert!(db.table_exists("users").run(&mut db, &[]).unwrap());

    // The physical name carries the prefix.
    let result = db
        .direct("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'app_users'")
        .run(&mut db, &[])
        .unwrap();
    assert_eq!(result.rows.len(), 1);

    let mut add_index = db.add_index("users", "name_idx");
    add_index.fields = vec!["username".to_string()];
    assert!(add_index.run(&mut db, &[]).unwrap());

    assert!(db.index_exists("users", "name_idx").run(&mut db, &[]).unwrap());

    // And introspection strips it back off.
    let info = db.table_info("users").run(&mut db, &[]).unwrap();
    assert!(info.index("name_idx").is_some());

    // Opting out of the prefix resolves the bare name.
    let mut unprefixed = db.table_exists("app_users");
    unprefixed.use_prefix = false;
    assert!(unprefixed.run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn array_parameters_expand_per_execution() {
    let mut db = memory_db();

    let mut create = db.create_table("test8");
    create.field("id", ColumnType::Int, None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut insert = db.insert(&[("id", ":id")], "test8");
    for id in 1_i64..=4 {
        assert_eq!(insert.run(&mut db, &[(":id", Value::from(id))]).unwrap(), 1);
    }

    let mut select = db.select(&["id"], Some("test8"));
    select.where_clause = "id IN :ids".to_string();
    select.order = vec!["id ASC".to_string()];

    let rows = select
        .run(&mut db, &[(":ids", Value::from(vec![1_i64, 3]))])
        .unwrap();
    assert_eq!(
        rows.iter().map(|r| r.get_i64("id").unwrap()).collect::<Vec<_>>(),
        vec![1, 3]
    );

    // A different list size re-expands from the original statement.
    let rows = select
        .run(&mut db, &[(":ids", Value::from(vec![2_i64, 3, 4]))])
        .unwrap();
    assert_eq!(
        rows.iter().map(|r| r.get_i64("id").unwrap()).collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
}

#[test_log::test]
fn transactions_pass_through() {
    let mut db = memory_db();

    let mut create = db.create_table("test9");
    create.field("id", ColumnType::Int, None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    assert!(!db.in_transaction());
    db.start_transaction().unwrap();
    assert!(db.in_transaction());

    let mut insert = db.insert(&[("id", ":id")], "test9");
    insert.run(&mut db, &[(":id", Value::from(1_i64))]).unwrap();
    db.rollback_transaction().unwrap();

    let mut select = db.select(&["id"], Some("test9"));
    assert!(select.run(&mut db, &[]).unwrap().is_empty());

    db.start_transaction().unwrap();
    insert.run(&mut db, &[(":id", Value::from(2_i64))]).unwrap();
    db.commit_transaction().unwrap();
    assert!(!db.in_transaction());

    assert_eq!(select.run(&mut db, &[]).unwrap().len(), 1);

    assert!(matches!(
        db.commit_transaction(),
        Err(DatabaseError::Usage(_))
    ));
}

#[test_log::test]
fn rename_table_moves_the_catalog_entry() {
    let mut db = memory_db();

    let mut create = db.create_table("before");
    create.field("id", ColumnType::Int, None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    assert!(db.rename_table("before", "after").run(&mut db, &[]).unwrap());

    assert!(!db.table_exists("before").run(&mut db, &[]).unwrap());
    assert!(db.table_exists("after").run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn add_field_appears_in_introspection() {
    let mut db = memory_db();

    let mut create = db.create_table("test10");
    create.field("id", ColumnType::Int, None, true, None);
    assert!(create.run(&mut db, &[]).unwrap());

    let mut add = db.add_field("test10");
    add.field("flag", ColumnType::Bool, Some(Value::from(false)), true, None);
    assert!(add.run(&mut db, &[]).unwrap());

    let info = db.table_info("test10").run(&mut db, &[]).unwrap();
    let flag = info.column("flag").unwrap();
    assert_eq!(flag.type_name, "BOOLEAN");
    assert_eq!(flag.default.as_deref(), Some("0"));

    // SQLite treats column type changes as a no-op.
    let mut alter = db.alter_field("test10");
    alter.field("flag", ColumnType::Int, None, true, None);
    assert!(alter.run(&mut db, &[]).unwrap());
}

#[test_log::test]
fn version_and_query_log() {
    let mut db = memory_db();
    assert!(db.version().starts_with("sqlite "));

    let mut select = db.select(&["1"], None);
    select.run(&mut db, &[]).unwrap();
    assert!(!db.debug_queries().is_empty());
}
