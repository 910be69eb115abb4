//! Session behaviour under cancellation, dropped proxies and misbehaving
//! peers.
//!
//! The worker side runs as a task on the test's current-thread runtime, so
//! it only makes progress while the test awaits. That makes the ordering
//! of abandoned calls deterministic.

use dbrelay::channel::{pair, Channel, MemoryChannel, StreamChannel};
use dbrelay::driver::{Driver, DriverConnection, DriverStatement, SqliteDriver};
use dbrelay::error::{DbError, ProtocolError};
use dbrelay::protocol::{Request, Response};
use dbrelay::service::{Dispatcher, ServiceError};
use dbrelay::client::Fetched;
use dbrelay::types::{ConnectParams, CursorOrientation, FetchMode};
use dbrelay::value::Value;
use dbrelay::Connection;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type ServerEnd = MemoryChannel<Response, Request>;

async fn connect_to(client: MemoryChannel<Request, Response>) -> Connection {
    Connection::connect(Box::new(client), ConnectParams::new("sqlite::memory:"), Handle::current())
        .await
        .unwrap()
}

/// A real dispatcher serving one session on a task.
async fn served() -> (Connection, JoinHandle<Result<(), ServiceError>>) {
    let (client, mut server) = pair::<Request, Response>();
    let worker = tokio::spawn(async move {
        let mut dispatcher = Dispatcher::new(SqliteDriver::new());
        dispatcher.serve(&mut server).await
    });
    (connect_to(client).await, worker)
}

/// The same, but over NDJSON as a worker process would see it.
async fn served_over_ndjson() -> (Connection, JoinHandle<Result<(), ServiceError>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (read, write) = tokio::io::split(server);
    let worker = tokio::spawn(async move {
        let mut channel: StreamChannel<_, _, Response, Request> = StreamChannel::new(read, write);
        let mut dispatcher = Dispatcher::new(SqliteDriver::new());
        dispatcher.serve(&mut channel).await
    });

    let (read, write) = tokio::io::split(client);
    let channel: StreamChannel<_, _, Request, Response> = StreamChannel::new(read, write);
    let conn = Connection::connect(Box::new(channel), ConnectParams::new("sqlite::memory:"), Handle::current())
        .await
        .unwrap();
    (conn, worker)
}

/// Accept the `connect` handshake by hand and return the server end.
async fn scripted() -> (Connection, ServerEnd) {
    let (client, mut server) = pair::<Request, Response>();
    let handshake = tokio::spawn(async move {
        let request = server.read().await.unwrap().unwrap();
        assert_eq!(request.method, "connect");
        server.write(Response::value(true)).await.unwrap();
        server
    });
    let conn = connect_to(client).await;
    (conn, handshake.await.unwrap())
}

async fn count(conn: &Connection) -> Value {
    let stmt = conn.query("SELECT COUNT(*) FROM t", None).await.unwrap().unwrap();
    let value = stmt.fetch_column(0).await.unwrap().unwrap();
    stmt.close().await.unwrap();
    value
}

#[tokio::test]
async fn test_abandoned_call_is_drained_before_the_next() {
    let (conn, worker) = served().await;
    conn.exec("CREATE TABLE t(id INTEGER)").await.unwrap();

    // Polled once: the request goes out, the answer is never read.
    let abandoned = conn.exec("INSERT INTO t VALUES (1)").now_or_never();
    assert!(abandoned.is_none());

    // The stale `1` is discarded, not mistaken for this call's answer.
    assert_eq!(count(&conn).await, Value::Int(1));
    assert!(!conn.session().is_poisoned());

    conn.close().await.unwrap();
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dropped_connection_disconnects_in_background() {
    let (conn, worker) = served().await;
    conn.exec("CREATE TABLE t(id INTEGER)").await.unwrap();
    let stmt = conn.prepare("SELECT id FROM t").await.unwrap().unwrap();

    drop(stmt);
    drop(conn);

    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_statement_keeps_a_dropped_connection_alive() {
    let (conn, worker) = served().await;
    let stmt = conn.query("SELECT 1 AS one", None).await.unwrap().unwrap();
    let session = conn.session().clone();

    drop(conn);
    tokio::task::yield_now().await;
    assert!(!session.is_closed());

    let row = stmt
        .fetch(Some(FetchMode::Num), CursorOrientation::Next, 0)
        .await
        .unwrap()
        .and_then(Fetched::into_row);
    assert_eq!(row, Some(Value::List(vec![Value::Int(1)])));

    // The statement was the last holder: its release is followed by
    // `disconnect`, which ends the worker loop.
    drop(session);
    drop(stmt);
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_non_finite_floats_cross_ndjson() {
    let (conn, worker) = served_over_ndjson().await;
    let mut direct = SqliteDriver.open(&ConnectParams::new("sqlite::memory:")).unwrap();

    for sql in ["SELECT 1e999", "SELECT -1e999", "SELECT 0.25"] {
        let stmt = conn.query(sql, None).await.unwrap().unwrap();
        let remote = stmt.fetch_column(0).await.unwrap();
        let expected = direct.query(sql).unwrap().unwrap().fetch_column(0).unwrap();
        assert_eq!(remote, expected, "{sql}");
        stmt.close().await.unwrap();
    }
    assert!(!conn.session().is_poisoned());

    conn.close().await.unwrap();
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_close_ends_the_worker_loop() {
    let (conn, worker) = served().await;
    assert!(conn.is_open());
    let session = conn.session().clone();

    conn.close().await.unwrap();
    assert!(session.is_closed());
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_peer_gone_mid_call_is_fatal() {
    let (conn, server) = scripted().await;
    drop(server);

    let err = conn.exec("SELECT 1").await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        DbError::Protocol(ProtocolError::ClosedMidRequest(_)) | DbError::Protocol(ProtocolError::Channel(_))
    ));
    assert!(conn.session().is_poisoned());
}

#[tokio::test]
async fn test_wrong_response_shape_poisons_the_session() {
    let (conn, mut server) = scripted().await;
    let peer = tokio::spawn(async move {
        let request = server.read().await.unwrap().unwrap();
        assert_eq!(request.method, "exec");
        server.write(Response::NewStatement { handle: 9 }).await.unwrap();
        server
    });

    let err = conn.exec("DELETE FROM t").await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Protocol(ProtocolError::UnexpectedResponse { ref method, got: "new_statement" }) if method == "exec"
    ));
    let _server = peer.await.unwrap();

    let err = conn.in_transaction().await.unwrap_err();
    assert!(matches!(err, DbError::Protocol(ProtocolError::Poisoned)));
}

#[tokio::test]
async fn test_undecodable_payload_poisons_the_session() {
    let (conn, mut server) = scripted().await;
    let peer = tokio::spawn(async move {
        server.read().await.unwrap().unwrap();
        server.write(Response::value("many")).await.unwrap();
        server
    });

    let err = conn.exec("DELETE FROM t").await.unwrap_err();
    assert!(err.is_fatal());
    assert!(conn.session().is_poisoned());
    let _server = peer.await.unwrap();
}
