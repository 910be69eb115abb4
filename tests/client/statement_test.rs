//! Integration tests for the statement proxy.

use dbrelay::client::Fetched;
use dbrelay::driver::{Driver, DriverConnection, DriverStatement, SqliteDriver};
use dbrelay::error::{DbError, UsageError};
use dbrelay::types::{Attribute, ConnectParams, CursorOrientation, FetchMode, ParamType, Params};
use dbrelay::value::Value;
use dbrelay::{Connection, ConnectionFactory};

const SEED: &str = "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT, note TEXT);
                    INSERT INTO t VALUES (1, 'a', NULL), (2, 'b', 'second');";

async fn seeded() -> Connection {
    let conn = ConnectionFactory::in_process()
        .connect(ConnectParams::new("sqlite::memory:"))
        .await
        .unwrap();
    conn.exec(SEED).await.unwrap();
    conn
}

fn seeded_direct() -> dbrelay::driver::sqlite::SqliteConnection {
    let mut conn = SqliteDriver.open(&ConnectParams::new("sqlite::memory:")).unwrap();
    conn.exec(SEED).unwrap();
    conn
}

async fn next_num(stmt: &dbrelay::Statement) -> Option<Value> {
    stmt.fetch(Some(FetchMode::Num), CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_row)
}

// ============================================================================
// Parameters
// ============================================================================

#[tokio::test]
async fn test_execute_with_positional_params() {
    let conn = seeded().await;
    let stmt = conn.prepare("SELECT name FROM t WHERE id = ?").await.unwrap().unwrap();

    assert!(stmt.execute(Some(Params::Positional(vec![Value::Int(2)]))).await.unwrap());
    assert_eq!(next_num(&stmt).await, Some(Value::List(vec![Value::from("b")])));
    assert_eq!(next_num(&stmt).await, None);

    // Re-execution starts a fresh cursor.
    stmt.execute(Some(Params::Positional(vec![Value::Int(1)]))).await.unwrap();
    assert_eq!(next_num(&stmt).await, Some(Value::List(vec![Value::from("a")])));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_with_named_params() {
    let conn = seeded().await;
    let stmt = conn
        .prepare("SELECT id FROM t WHERE name = :name")
        .await
        .unwrap()
        .unwrap();

    let params = vec![("name".to_string(), Value::from("b"))];
    stmt.execute(Some(Params::Named(params))).await.unwrap();
    assert_eq!(stmt.fetch_column(0).await.unwrap(), Some(Value::Int(2)));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_bind_value_then_execute() {
    let conn = seeded().await;
    let stmt = conn.prepare("INSERT INTO t(name) VALUES (?)").await.unwrap().unwrap();

    assert!(stmt.bind_value(1usize, "c", ParamType::Str).await.unwrap());
    stmt.execute(None).await.unwrap();
    assert_eq!(stmt.row_count().await.unwrap(), 1);
    assert_eq!(conn.last_insert_id(None).await.unwrap(), "3");

    let err = stmt.bind_value(5usize, 1, ParamType::Int).await.unwrap_err();
    assert_eq!(err.sqlstate(), Some("HY093"));
    assert_eq!(stmt.error_code().await.unwrap().as_deref(), Some("HY093"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_by_reference_binding_is_refused_locally() {
    let conn = seeded().await;
    let stmt = conn.prepare("SELECT ?").await.unwrap().unwrap();
    let mut variable = Value::Int(1);

    let err = stmt.bind_param(1usize, &mut variable, ParamType::Int).unwrap_err();
    assert!(matches!(err, DbError::Usage(UsageError::BindByReference("bind_param"))));
    let err = stmt.bind_column(1usize, &mut variable).unwrap_err();
    assert!(matches!(err, DbError::Usage(UsageError::BindByReference("bind_column"))));

    // The session is untouched.
    stmt.execute(Some(Params::Positional(vec![Value::Int(7)]))).await.unwrap();
    assert_eq!(stmt.fetch_column(0).await.unwrap(), Some(Value::Int(7)));
    conn.close().await.unwrap();
}

// ============================================================================
// Cursor
// ============================================================================

#[tokio::test]
async fn test_fetch_column_null_and_exhaustion() {
    let conn = seeded().await;
    let stmt = conn
        .query("SELECT note FROM t ORDER BY id", None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stmt.fetch_column(0).await.unwrap(), Some(Value::Null));
    assert_eq!(stmt.fetch_column(0).await.unwrap(), Some(Value::from("second")));
    assert_eq!(stmt.fetch_column(0).await.unwrap(), None);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_close_cursor_discards_rows() {
    let conn = seeded().await;
    let stmt = conn.query("SELECT id FROM t", None).await.unwrap().unwrap();

    assert!(stmt.close_cursor().await.unwrap());
    assert_eq!(next_num(&stmt).await, None);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_metadata_matches_direct_driver() {
    let conn = seeded().await;
    let mut direct = seeded_direct();
    let sql = "SELECT id, name, note FROM t ORDER BY id";

    let proxy = conn.prepare(sql).await.unwrap().unwrap();
    let mut local = direct.prepare(sql).unwrap().unwrap();
    assert_eq!(proxy.column_count().await.unwrap(), 0);
    assert_eq!(local.column_count(), 0);

    proxy.execute(None).await.unwrap();
    local.execute(&mut direct, None).unwrap();
    next_num(&proxy).await;
    local.fetch(&mut direct, Some(FetchMode::Num), CursorOrientation::Next, 0).unwrap();

    assert_eq!(proxy.column_count().await.unwrap(), local.column_count());
    assert_eq!(proxy.row_count().await.unwrap(), local.row_count());
    for index in 0..4 {
        assert_eq!(
            proxy.get_column_meta(index).await.unwrap(),
            local.get_column_meta(index).unwrap()
        );
    }
    assert!(proxy.get_column_meta(3).await.unwrap().is_none());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_query_string_and_param_dump_match_direct_driver() {
    let conn = seeded().await;
    let mut direct = seeded_direct();
    let sql = "SELECT * FROM t WHERE id = :id AND name = ?";

    let proxy = conn.prepare(sql).await.unwrap().unwrap();
    let mut local = direct.prepare(sql).unwrap().unwrap();

    proxy.bind_value(":id", 1, ParamType::Int).await.unwrap();
    local
        .bind_value(":id".into(), Value::Int(1), ParamType::Int)
        .unwrap();
    proxy.bind_value(2usize, "a", ParamType::Str).await.unwrap();
    local
        .bind_value(2usize.into(), Value::from("a"), ParamType::Str)
        .unwrap();

    assert_eq!(proxy.query_string().await.unwrap(), local.query_string());
    assert_eq!(proxy.debug_dump_params().await.unwrap(), local.debug_dump_params());
    conn.close().await.unwrap();
}

// ============================================================================
// Driver-level refusals
// ============================================================================

#[tokio::test]
async fn test_unsupported_statement_features_are_im001() {
    let conn = seeded().await;
    let stmt = conn.query("SELECT 1", None).await.unwrap().unwrap();

    let err = stmt.next_rowset().await.unwrap_err();
    assert_eq!(err.sqlstate(), Some("IM001"));
    let err = stmt.get_attribute(Attribute::Case).await.unwrap_err();
    assert_eq!(err.sqlstate(), Some("IM001"));
    let err = stmt.set_attribute(Attribute::Case, "lower").await.unwrap_err();
    assert_eq!(err.sqlstate(), Some("IM001"));

    assert_eq!(next_num(&stmt).await, Some(Value::List(vec![Value::Int(1)])));
    conn.close().await.unwrap();
}

// ============================================================================
// Handles
// ============================================================================

#[tokio::test]
async fn test_handles_are_unique_and_increasing() {
    let conn = seeded().await;

    let first = conn.prepare("SELECT 1").await.unwrap().unwrap();
    let second = conn.prepare("SELECT 2").await.unwrap().unwrap();
    assert!(first.handle() > 0);
    assert!(second.handle() > first.handle());

    let released = first.handle();
    first.close().await.unwrap();
    let third = conn.prepare("SELECT 3").await.unwrap().unwrap();
    assert!(third.handle() > second.handle());
    assert_ne!(third.handle(), released);

    third.close().await.unwrap();
    second.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_dropped_statement_releases_in_background() {
    let conn = seeded().await;

    {
        let stmt = conn.query("SELECT id FROM t", None).await.unwrap().unwrap();
        assert_eq!(stmt.column_count().await.unwrap(), 1);
    }

    // The scheduled release and later calls share the session in order.
    let stmt = conn.query("SELECT name FROM t ORDER BY id", None).await.unwrap().unwrap();
    assert_eq!(stmt.fetch_column(0).await.unwrap(), Some(Value::from("a")));
    drop(stmt);
    assert_eq!(conn.exec("DELETE FROM t").await.unwrap(), 2);
    conn.close().await.unwrap();
}
