//! Caller-side stand-in for the remote connection object.

use std::sync::Arc;

use tokio::runtime::Handle as RuntimeHandle;
use tracing::info;

use super::fetch::FetchModeSpec;
use super::session::Session;
use super::statement::Statement;
use crate::channel::ClientChannel;
use crate::error::{DbResult, ProtocolError};
use crate::protocol::{ConnectionOp, Response};
use crate::types::{Attribute, ConnectParams, ErrorInfo, ParamType};
use crate::value::{FromValue, Value};

/// A database connection living in a worker.
///
/// Every method is one round trip. Call [`Connection::close`] when done.
/// Statements keep the connection alive: if it is dropped instead, the
/// `disconnect` is scheduled once the last of its statements is gone too.
pub struct Connection {
    session: Arc<Session>,
}

impl Connection {
    /// Run the `connect` handshake over `channel`.
    ///
    /// On failure the channel is closed and the worker is left to notice.
    pub async fn connect(channel: ClientChannel, params: ConnectParams, runtime: RuntimeHandle) -> DbResult<Self> {
        let dsn = params.dsn.clone();
        let session = Arc::new(Session::new(channel, runtime));
        match session.invoke::<bool>(ConnectionOp::Connect(params).into_request()).await {
            Ok(_) => {
                info!(dsn = %dsn, "connected");
                Ok(Self { session })
            }
            Err(err) => {
                session.abandon().await;
                Err(err)
            }
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// True until the connection is closed or the worker goes away.
    pub fn is_open(&self) -> bool {
        !self.session.is_closed()
    }

    async fn invoke<T: FromValue>(&self, op: ConnectionOp) -> DbResult<T> {
        self.session.invoke(op.into_request()).await
    }

    /// Answer to `prepare`/`query`: a new statement or nothing.
    async fn statement(&self, op: ConnectionOp) -> DbResult<Option<Statement>> {
        match self.session.call(op.into_request()).await? {
            Response::NewStatement { handle } => Ok(Some(Statement::new(Arc::clone(&self.session), handle))),
            Response::Value { payload: Value::Null } => Ok(None),
            Response::Value { payload } => Err(self
                .session
                .fail(ProtocolError::unexpected_payload("statement", &payload))),
            Response::Error(envelope) => Err(envelope.into()),
        }
    }

    /// `None` when the SQL holds no statement.
    pub async fn prepare(&self, sql: &str) -> DbResult<Option<Statement>> {
        self.statement(ConnectionOp::Prepare { sql: sql.to_string() }).await
    }

    /// Prepare and execute. A given fetch mode is applied to the statement
    /// afterwards, on this side.
    pub async fn query(&self, sql: &str, mode: Option<FetchModeSpec>) -> DbResult<Option<Statement>> {
        let Some(mut statement) = self.statement(ConnectionOp::Query { sql: sql.to_string() }).await? else {
            return Ok(None);
        };
        if let Some(spec) = mode {
            statement.set_fetch_mode(spec.mode, spec.argument, spec.ctor_args)?;
        }
        Ok(Some(statement))
    }

    /// Number of affected rows.
    pub async fn exec(&self, sql: &str) -> DbResult<u64> {
        self.invoke(ConnectionOp::Exec { sql: sql.to_string() }).await
    }

    pub async fn begin_transaction(&self) -> DbResult<bool> {
        self.invoke(ConnectionOp::BeginTransaction).await
    }

    pub async fn commit(&self) -> DbResult<bool> {
        self.invoke(ConnectionOp::Commit).await
    }

    pub async fn roll_back(&self) -> DbResult<bool> {
        self.invoke(ConnectionOp::RollBack).await
    }

    pub async fn in_transaction(&self) -> DbResult<bool> {
        self.invoke(ConnectionOp::InTransaction).await
    }

    pub async fn last_insert_id(&self, name: Option<&str>) -> DbResult<String> {
        self.invoke(ConnectionOp::LastInsertId {
            name: name.map(str::to_string),
        })
        .await
    }

    /// SQLSTATE of the last operation; `None` before the first one.
    pub async fn error_code(&self) -> DbResult<Option<String>> {
        self.invoke(ConnectionOp::ErrorCode).await
    }

    pub async fn error_info(&self) -> DbResult<ErrorInfo> {
        self.invoke(ConnectionOp::ErrorInfo).await
    }

    pub async fn quote(&self, string: &str, param_type: ParamType) -> DbResult<String> {
        self.invoke(ConnectionOp::Quote {
            string: string.to_string(),
            param_type,
        })
        .await
    }

    pub async fn get_attribute(&self, attribute: Attribute) -> DbResult<Value> {
        self.invoke(ConnectionOp::GetAttribute(attribute)).await
    }

    pub async fn set_attribute(&self, attribute: Attribute, value: impl Into<Value>) -> DbResult<bool> {
        self.invoke(ConnectionOp::SetAttribute(attribute, value.into())).await
    }

    /// Send `disconnect` and close the channel.
    ///
    /// Statements still alive afterwards fail with a protocol error.
    pub async fn close(self) -> DbResult<()> {
        self.session.shutdown().await
    }
}
