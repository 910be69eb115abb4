//! Fetch modes as seen through the proxy.
//!
//! Primitive modes must shape rows exactly as the driver does when called
//! directly. `Class` and `Into` are rebuilt on the caller side.

use std::sync::Arc;

use dbrelay::client::{shared, Entity, EntityClass, FetchArgument, FetchModeSpec, Fetched, StdObject};
use dbrelay::driver::{Driver, DriverConnection, DriverStatement, SqliteDriver};
use dbrelay::error::{DbError, UsageError};
use dbrelay::types::{ConnectParams, CursorOrientation, FetchMode};
use dbrelay::value::Value;
use dbrelay::{Connection, ConnectionFactory};

const SEED: &str = "CREATE TABLE people(id INTEGER PRIMARY KEY, name TEXT);
                    INSERT INTO people VALUES (1, 'ada'), (2, 'grace');";

async fn seeded() -> Connection {
    let conn = ConnectionFactory::in_process()
        .connect(ConnectParams::new("sqlite::memory:"))
        .await
        .unwrap();
    conn.exec(SEED).await.unwrap();
    conn
}

/// Records every call so hydration order can be checked.
#[derive(Debug, Default)]
struct Person {
    id: Option<i64>,
    name: Option<String>,
    calls: Vec<String>,
}

impl Entity for Person {
    fn set_field(&mut self, name: &str, value: Value) {
        self.calls.push(format!("set {name}"));
        match name {
            "id" => self.id = value.as_i64(),
            "name" => self.name = value.as_str().map(str::to_string),
            _ => {}
        }
    }

    fn construct(&mut self, args: &[Value]) {
        let args: Vec<String> = args.iter().map(Value::to_string).collect();
        self.calls.push(format!("construct({})", args.join(", ")));
    }
}

// ============================================================================
// Primitive modes
// ============================================================================

async fn assert_mode_matches_direct(sql: &str, mode: FetchMode) {
    let conn = seeded().await;
    let mut direct = SqliteDriver.open(&ConnectParams::new("sqlite::memory:")).unwrap();
    direct.exec(SEED).unwrap();

    let proxy = conn.query(sql, None).await.unwrap().unwrap();
    let mut local = direct.query(sql).unwrap().unwrap();

    loop {
        let remote = proxy
            .fetch(Some(mode), CursorOrientation::Next, 0)
            .await
            .unwrap()
            .and_then(Fetched::into_row);
        let expected = local
            .fetch(&mut direct, Some(mode), CursorOrientation::Next, 0)
            .unwrap();
        assert_eq!(remote, expected, "{mode} rows differ for {sql}");
        if expected.is_none() {
            break;
        }
    }
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_primitive_modes_match_direct_driver() {
    let sql = "SELECT id, name FROM people ORDER BY id";
    for mode in [FetchMode::Assoc, FetchMode::Both, FetchMode::Named, FetchMode::Num, FetchMode::Obj] {
        assert_mode_matches_direct(sql, mode).await;
    }
}

#[tokio::test]
async fn test_duplicate_column_names_match_direct_driver() {
    let sql = "SELECT 1 AS a, 2 AS a";
    for mode in [FetchMode::Assoc, FetchMode::Both, FetchMode::Named] {
        assert_mode_matches_direct(sql, mode).await;
    }
}

#[tokio::test]
async fn test_named_mode_collects_duplicates() {
    let conn = seeded().await;
    let stmt = conn.query("SELECT 1 AS a, 2 AS a", None).await.unwrap().unwrap();
    let row = stmt
        .fetch(Some(FetchMode::Named), CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_row)
        .unwrap();

    let record = row.as_record().unwrap();
    assert_eq!(record.get("a"), Some(&Value::List(vec![Value::Int(1), Value::Int(2)])));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_default_mode_is_both() {
    let conn = seeded().await;
    let stmt = conn.query("SELECT id FROM people ORDER BY id", None).await.unwrap().unwrap();
    let row = stmt
        .fetch(None, CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_row)
        .unwrap();

    let record = row.as_record().unwrap();
    assert_eq!(record.get("id"), Some(&Value::Int(1)));
    assert_eq!(record.get(0usize), Some(&Value::Int(1)));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_statement_default_mode_is_used() {
    let conn = seeded().await;
    let mut stmt = conn.query("SELECT id FROM people ORDER BY id", None).await.unwrap().unwrap();
    stmt.set_fetch_mode(FetchMode::Num, None, None).unwrap();
    assert_eq!(stmt.fetch_state().mode(), Some(FetchMode::Num));

    let rows: Vec<Value> = stmt
        .fetch_all(None, None, None)
        .await
        .unwrap()
        .into_iter()
        .filter_map(Fetched::into_row)
        .collect();
    assert_eq!(
        rows,
        vec![Value::List(vec![Value::Int(1)]), Value::List(vec![Value::Int(2)])]
    );
    conn.close().await.unwrap();
}

// ============================================================================
// Class
// ============================================================================

#[tokio::test]
async fn test_class_mode_sets_fields_before_constructor() {
    let conn = seeded().await;
    let mut stmt = conn
        .query("SELECT id, name FROM people ORDER BY id", None)
        .await
        .unwrap()
        .unwrap();
    stmt.set_fetch_mode(
        FetchMode::Class,
        Some(FetchArgument::Class(EntityClass::of::<Person>())),
        Some(vec![Value::from("hi")]),
    )
    .unwrap();

    let entity = stmt
        .fetch(None, CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_entity)
        .unwrap();
    let person = entity.downcast_ref::<Person>().unwrap();
    assert_eq!(person.id, Some(1));
    assert_eq!(person.name.as_deref(), Some("ada"));
    assert_eq!(person.calls, vec!["set id", "set name", "construct(hi)"]);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_fetch_all_with_class() {
    let conn = seeded().await;
    let stmt = conn
        .query("SELECT id, name FROM people ORDER BY id", None)
        .await
        .unwrap()
        .unwrap();

    let people = stmt
        .fetch_all(
            Some(FetchMode::Class),
            Some(FetchArgument::Class(EntityClass::of::<Person>())),
            None,
        )
        .await
        .unwrap();
    let names: Vec<String> = people
        .into_iter()
        .filter_map(Fetched::into_entity)
        .filter_map(|entity| entity.downcast_ref::<Person>().and_then(|p| p.name.clone()))
        .collect();
    assert_eq!(names, vec!["ada", "grace"]);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_class_mode_needs_it_as_default() {
    let conn = seeded().await;
    let stmt = conn.query("SELECT id FROM people", None).await.unwrap().unwrap();

    let err = stmt
        .fetch(Some(FetchMode::Class), CursorOrientation::Next, 0)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DbError::Usage(UsageError::DefaultModeRequired(FetchMode::Class))));

    // Nothing was consumed remotely.
    assert_eq!(stmt.fetch_column(0).await.unwrap(), Some(Value::Int(1)));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_query_with_fetch_mode_spec() {
    let conn = seeded().await;
    let spec = FetchModeSpec::class(EntityClass::of::<Person>(), Vec::new());
    let stmt = conn
        .query("SELECT id, name FROM people ORDER BY id DESC", Some(spec))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stmt.fetch_state().mode(), Some(FetchMode::Class));

    let entity = stmt
        .fetch(None, CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_entity)
        .unwrap();
    assert_eq!(entity.downcast_ref::<Person>().unwrap().name.as_deref(), Some("grace"));
    conn.close().await.unwrap();
}

// ============================================================================
// Into
// ============================================================================

#[tokio::test]
async fn test_into_mode_populates_the_same_instance() {
    let conn = seeded().await;
    let target = shared(Person::default());
    let mut stmt = conn
        .query("SELECT id, name FROM people ORDER BY id", None)
        .await
        .unwrap()
        .unwrap();
    stmt.set_fetch_mode(FetchMode::Into, Some(FetchArgument::Instance(target.clone())), None)
        .unwrap();

    let fetched = stmt
        .fetch(None, CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_shared)
        .unwrap();
    assert!(Arc::ptr_eq(&fetched, &target));

    stmt.fetch(None, CursorOrientation::Next, 0).await.unwrap().unwrap();
    {
        let guard = target.lock().await;
        let person = guard.downcast_ref::<Person>().unwrap();
        assert_eq!(person.name.as_deref(), Some("grace"));
        assert!(!person.calls.iter().any(|call| call.starts_with("construct")));
    }

    assert!(stmt.fetch(None, CursorOrientation::Next, 0).await.unwrap().is_none());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_fetch_all_refuses_into() {
    let conn = seeded().await;
    let stmt = conn.query("SELECT id FROM people", None).await.unwrap().unwrap();

    let err = stmt
        .fetch_all(Some(FetchMode::Into), Some(FetchArgument::Instance(shared(Person::default()))), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Usage(UsageError::UnsupportedFetchMode(FetchMode::Into))));
    conn.close().await.unwrap();
}

// ============================================================================
// Objects and refusals
// ============================================================================

#[tokio::test]
async fn test_fetch_object_defaults_to_std_object() {
    let conn = seeded().await;
    let stmt = conn
        .query("SELECT name, id FROM people ORDER BY id", None)
        .await
        .unwrap()
        .unwrap();

    let object = stmt.fetch_object(None, Vec::new()).await.unwrap().unwrap();
    let object = object.downcast_ref::<StdObject>().unwrap();
    let keys: Vec<String> = object.fields().keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["name", "id"]);
    assert_eq!(object.get("name"), Some(&Value::from("ada")));

    stmt.fetch_object(Some(EntityClass::of::<Person>()), Vec::new())
        .await
        .unwrap()
        .unwrap();
    assert!(stmt.fetch_object(None, Vec::new()).await.unwrap().is_none());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_unsupported_modes_are_usage_errors() {
    let conn = seeded().await;
    let mut stmt = conn.query("SELECT id FROM people", None).await.unwrap().unwrap();

    for mode in [FetchMode::Lazy, FetchMode::Bound] {
        let err = stmt.set_fetch_mode(mode, None, None).unwrap_err();
        assert!(matches!(err, DbError::Usage(UsageError::UnsupportedFetchMode(m)) if m == mode));
        let err = stmt.fetch(Some(mode), CursorOrientation::Next, 0).await.err().unwrap();
        assert!(!err.is_fatal());
    }

    let err = stmt
        .set_fetch_mode(FetchMode::Class, None, None)
        .unwrap_err();
    assert_eq!(err.to_string(), "The class fetch mode requires an entity class.");
    assert_eq!(stmt.fetch_state().mode(), None);
    conn.close().await.unwrap();
}
