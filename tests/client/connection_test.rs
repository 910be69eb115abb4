//! Integration tests for the connection proxy.
//!
//! Every test talks to a worker running on its own thread through the
//! in-process factory, and where it matters compares the answer with the
//! same operation run directly on the SQLite driver.

use dbrelay::client::Fetched;
use dbrelay::driver::{Driver, DriverConnection, DriverStatement, SqliteDriver};
use dbrelay::error::{DbError, ProtocolError};
use dbrelay::types::{Attribute, ConnectParams, CursorOrientation, FetchMode, ParamType};
use dbrelay::value::Value;
use dbrelay::worker::WorkerError;
use dbrelay::{Connection, ConnectionFactory};

async fn memory() -> Connection {
    ConnectionFactory::in_process()
        .connect(ConnectParams::new("sqlite::memory:"))
        .await
        .expect("in-process connect")
}

fn rows(fetched: Vec<Fetched>) -> Vec<Value> {
    fetched.into_iter().filter_map(Fetched::into_row).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_memory_scenario() {
    let conn = memory().await;

    conn.exec("CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)").await.unwrap();
    assert_eq!(conn.exec("INSERT INTO t VALUES (NULL,'a')").await.unwrap(), 1);
    assert_eq!(conn.last_insert_id(None).await.unwrap(), "1");

    let stmt = conn.query("SELECT * FROM t", None).await.unwrap().unwrap();
    let all = rows(stmt.fetch_all(Some(FetchMode::Num), None, None).await.unwrap());
    assert_eq!(all, vec![Value::List(vec![Value::Int(1), Value::from("a")])]);

    stmt.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_rollback_is_invisible_to_second_connection() {
    let dir = tempfile::tempdir().unwrap();
    let dsn = format!("sqlite:{}", dir.path().join("shared.db").display());
    let factory = ConnectionFactory::in_process();

    let writer = factory.connect(ConnectParams::new(dsn.clone())).await.unwrap();
    let reader = factory.connect(ConnectParams::new(dsn)).await.unwrap();

    writer.exec("CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)").await.unwrap();
    writer.exec("INSERT INTO t VALUES (NULL,'a')").await.unwrap();

    async fn count(conn: &Connection) -> Value {
        let stmt = conn.query("SELECT COUNT(*) FROM t", None).await.unwrap().unwrap();
        let value = stmt.fetch_column(0).await.unwrap().unwrap();
        stmt.close().await.unwrap();
        value
    }
    assert_eq!(count(&reader).await, Value::Int(1));

    assert!(writer.begin_transaction().await.unwrap());
    assert!(writer.in_transaction().await.unwrap());
    writer.exec("INSERT INTO t VALUES (NULL,'b')").await.unwrap();
    assert_eq!(count(&reader).await, Value::Int(1));

    assert!(writer.roll_back().await.unwrap());
    assert!(!writer.in_transaction().await.unwrap());
    assert_eq!(count(&writer).await, Value::Int(1));
    assert_eq!(count(&reader).await, Value::Int(1));

    reader.close().await.unwrap();
    writer.close().await.unwrap();
}

// ============================================================================
// One-shot operations
// ============================================================================

#[tokio::test]
async fn test_round_trip_matches_direct_driver() {
    let conn = memory().await;
    let mut direct = SqliteDriver.open(&ConnectParams::new("sqlite::memory:")).unwrap();

    let setup = [
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT, score REAL)",
        "INSERT INTO t(name, score) VALUES ('a', 1.5), ('b', NULL), ('c', 3.0)",
        "UPDATE t SET score = 0 WHERE score IS NULL",
    ];
    for sql in setup {
        assert_eq!(conn.exec(sql).await.unwrap(), direct.exec(sql).unwrap());
    }

    assert_eq!(conn.last_insert_id(None).await.unwrap(), direct.last_insert_id(None).unwrap());
    assert_eq!(conn.error_code().await.unwrap(), direct.error_code());
    assert_eq!(conn.error_info().await.unwrap(), direct.error_info());
    assert_eq!(
        conn.quote("it's", ParamType::Str).await.unwrap(),
        direct.quote("it's", ParamType::Str).unwrap()
    );
    assert_eq!(
        conn.get_attribute(Attribute::DriverName).await.unwrap(),
        direct.get_attribute(Attribute::DriverName).unwrap()
    );

    let sql = "SELECT id, name, score FROM t ORDER BY id";
    let proxy = conn.query(sql, None).await.unwrap().unwrap();
    let mut local = direct.query(sql).unwrap().unwrap();

    assert_eq!(proxy.column_count().await.unwrap(), local.column_count());
    assert_eq!(proxy.row_count().await.unwrap(), local.row_count());
    assert_eq!(proxy.query_string().await.unwrap(), local.query_string());
    for index in 0..3 {
        assert_eq!(
            proxy.get_column_meta(index).await.unwrap(),
            local.get_column_meta(index).unwrap()
        );
    }

    loop {
        let remote = proxy
            .fetch(Some(FetchMode::Assoc), CursorOrientation::Next, 0)
            .await
            .unwrap()
            .and_then(Fetched::into_row);
        let expected = local
            .fetch(&mut direct, Some(FetchMode::Assoc), CursorOrientation::Next, 0)
            .unwrap();
        assert_eq!(remote, expected);
        if expected.is_none() {
            break;
        }
    }

    proxy.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_error_state_before_first_operation() {
    let conn = memory().await;
    assert_eq!(conn.error_code().await.unwrap(), None);

    conn.exec("CREATE TABLE t(id INTEGER)").await.unwrap();
    assert_eq!(conn.error_code().await.unwrap().as_deref(), Some("00000"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_transaction_misuse_is_generic_error() {
    let conn = memory().await;

    let err = conn.commit().await.unwrap_err();
    assert!(matches!(err, DbError::Generic { code: 0, .. }));
    assert_eq!(err.to_string(), "There is no active transaction");

    conn.begin_transaction().await.unwrap();
    let err = conn.begin_transaction().await.unwrap_err();
    assert_eq!(err.to_string(), "There is already an active transaction");
    assert!(conn.commit().await.unwrap());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_attributes_apply_remotely() {
    let conn = memory().await;
    conn.exec("CREATE TABLE t(Name TEXT)").await.unwrap();
    conn.exec("INSERT INTO t VALUES ('a')").await.unwrap();

    assert!(conn.set_attribute(Attribute::Case, "upper").await.unwrap());
    assert_eq!(conn.get_attribute(Attribute::Case).await.unwrap(), Value::from("upper"));

    let stmt = conn.query("SELECT Name FROM t", None).await.unwrap().unwrap();
    let row = stmt
        .fetch(Some(FetchMode::Assoc), CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_row)
        .unwrap();
    assert!(row.as_record().unwrap().contains_key("NAME"));

    stmt.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_options_are_applied() {
    let params = ConnectParams::new("sqlite::memory:").with_option(Attribute::DefaultFetchMode, FetchMode::Num);
    let conn = ConnectionFactory::in_process().connect(params).await.unwrap();

    let stmt = conn.query("SELECT 1 AS one", None).await.unwrap().unwrap();
    let row = stmt
        .fetch(None, CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_row);
    assert_eq!(row, Some(Value::List(vec![Value::Int(1)])));

    stmt.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_sql_yields_no_statement() {
    let conn = memory().await;
    assert!(conn.prepare("").await.unwrap().is_none());
    assert!(conn.query("   ", None).await.unwrap().is_none());
    conn.close().await.unwrap();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_statement_after_close_fails_fatally() {
    let conn = memory().await;
    let stmt = conn.prepare("SELECT 1").await.unwrap().unwrap();
    conn.close().await.unwrap();

    let err = stmt.execute(None).await.unwrap_err();
    assert!(matches!(err, DbError::Protocol(ProtocolError::SessionClosed)));
    assert!(err.is_fatal());

    // Nothing is sent for a closed session.
    stmt.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_driver_is_driver_side_failure() {
    let err = ConnectionFactory::in_process()
        .connect(ConnectParams::new("mysql:host=localhost"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DbError::Generic { .. }));
    assert_eq!(err.to_string(), "could not find driver");
}

#[tokio::test]
async fn test_missing_worker_binary_is_spawn_failure() {
    let settings = dbrelay::config::WorkerSettings {
        path: Some("/nonexistent/dbrelay-worker".to_string()),
        ..Default::default()
    };
    let err = ConnectionFactory::new(settings)
        .connect(ConnectParams::new("sqlite::memory:"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DbError::Worker(WorkerError::SpawnFailed(_))));
    assert!(!err.is_driver());
}
