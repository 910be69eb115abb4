//! The worker-side request loop.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::HandleTable;
use crate::channel::{Channel, ChannelError};
use crate::driver::{Driver, DriverConnection, DriverError, DriverResult, DriverStatement};
use crate::error::ProtocolError;
use crate::protocol::{ConnectionOp, ErrorEnvelope, Handle, Request, Response, StatementOp, CONNECTION_HANDLE};
use crate::types::ErrorInfo;
use crate::value::Value;

/// Why the serve loop stopped without a clean disconnect.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The peer closed the channel while the connection was still live.
    #[error("peer closed the channel before disconnecting")]
    PeerClosed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Result of a connection operation before it is put on the wire.
enum Outcome<S> {
    Value(Value),
    Statement(Option<S>),
}

/// Resolves requests against a handle table and runs them on a driver.
pub struct Dispatcher<D: Driver> {
    driver: D,
    table: HandleTable<D::Connection>,
}

impl<D: Driver> Dispatcher<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            table: HandleTable::new(),
        }
    }

    /// True until `disconnect` has evicted the connection handle.
    pub fn is_live(&self) -> bool {
        self.table.is_live()
    }

    pub fn table(&self) -> &HandleTable<D::Connection> {
        &self.table
    }

    /// Run one request.
    ///
    /// `Ok(None)` for notifications. An `Err` means the session is
    /// desynchronised and must end.
    pub fn dispatch(&mut self, request: Request) -> Result<Option<Response>, ProtocolError> {
        let Request { handle, method, args } = request;
        debug!(handle, method = %method, "dispatch");

        if !self.table.is_live() {
            return Err(ProtocolError::UnknownHandle(handle));
        }

        if handle == CONNECTION_HANDLE {
            match ConnectionOp::decode(&method, args) {
                Ok(op) => Ok(self.connection_call(op)),
                Err(err) => Ok(Some(Response::Error(ErrorEnvelope::generic(err.to_string(), 0)))),
            }
        } else {
            if !self.table.was_issued(handle) {
                return Err(ProtocolError::UnknownHandle(handle));
            }
            match StatementOp::decode(&method, args) {
                Ok(op) => self.statement_call(handle, op),
                Err(err) => Ok(Some(Response::Error(ErrorEnvelope::generic(err.to_string(), 0)))),
            }
        }
    }

    /// Serve requests until the connection handle is evicted, then close
    /// the channel from this side.
    pub async fn serve<C>(&mut self, channel: &mut C) -> Result<(), ServiceError>
    where
        C: Channel<Response, Request> + ?Sized,
    {
        while self.table.is_live() {
            let Some(request) = channel.read().await? else {
                warn!(statements = self.table.len(), "peer closed the channel without disconnecting");
                return Err(ServiceError::PeerClosed);
            };

            match self.dispatch(request) {
                Ok(Some(response)) => channel.write(response).await?,
                Ok(None) => {}
                Err(err) => {
                    error!(error = %err, "fatal protocol error, ending session");
                    return Err(err.into());
                }
            }
        }

        channel.close().await?;
        Ok(())
    }

    fn connection_call(&mut self, op: ConnectionOp) -> Option<Response> {
        match op {
            ConnectionOp::Connect(params) => {
                if self.table.is_connected() {
                    return Some(Response::Error(ErrorEnvelope::generic("Connection is already established", 0)));
                }
                let response = match self.driver.open(&params) {
                    Ok(conn) => match self.table.install(conn) {
                        Ok(()) => {
                            info!(dsn = %params.dsn, driver = self.driver.name(), "connected");
                            Response::value(true)
                        }
                        Err(_) => Response::Error(ErrorEnvelope::generic("Connection is already established", 0)),
                    },
                    Err(err) => error_response(err),
                };
                Some(response)
            }
            ConnectionOp::Disconnect => {
                let released = self.table.evict_all();
                info!(released, "disconnected");
                None
            }
            op => {
                let Some(conn) = self.table.connection_mut() else {
                    return Some(error_response(DriverError::sql(
                        "08003",
                        None,
                        "Connection has not been established.",
                    )));
                };
                let response = match call_connection(conn, op) {
                    Ok(Outcome::Value(value)) => Response::value(value),
                    Ok(Outcome::Statement(Some(statement))) => Response::NewStatement {
                        handle: self.table.insert(statement),
                    },
                    Ok(Outcome::Statement(None)) => Response::value(Value::Null),
                    Err(err) => error_response(err),
                };
                Some(response)
            }
        }
    }

    fn statement_call(&mut self, handle: Handle, op: StatementOp) -> Result<Option<Response>, ProtocolError> {
        if op.is_notification() {
            if self.table.release(handle).is_none() {
                warn!(handle, "ignoring release of a statement that is already gone");
            }
            return Ok(None);
        }

        let (conn, statement) = self
            .table
            .statement_mut(handle)
            .ok_or(ProtocolError::UnknownHandle(handle))?;
        let response = match call_statement(conn, statement, op) {
            Ok(value) => Response::value(value),
            Err(err) => error_response(err),
        };
        Ok(Some(response))
    }
}

fn call_connection<C: DriverConnection>(conn: &mut C, op: ConnectionOp) -> DriverResult<Outcome<C::Statement>> {
    let value = match op {
        ConnectionOp::Prepare { sql } => return conn.prepare(&sql).map(Outcome::Statement),
        ConnectionOp::Query { sql } => return conn.query(&sql).map(Outcome::Statement),
        ConnectionOp::Exec { sql } => Value::from(conn.exec(&sql)?),
        ConnectionOp::BeginTransaction => conn.begin_transaction()?.into(),
        ConnectionOp::Commit => conn.commit()?.into(),
        ConnectionOp::RollBack => conn.roll_back()?.into(),
        ConnectionOp::InTransaction => conn.in_transaction().into(),
        ConnectionOp::LastInsertId { name } => conn.last_insert_id(name.as_deref())?.into(),
        ConnectionOp::ErrorCode => conn.error_code().into(),
        ConnectionOp::ErrorInfo => conn.error_info().into(),
        ConnectionOp::Quote { string, param_type } => conn.quote(&string, param_type)?.into(),
        ConnectionOp::GetAttribute(attribute) => conn.get_attribute(attribute)?,
        ConnectionOp::SetAttribute(attribute, value) => conn.set_attribute(attribute, value)?.into(),
        // Lifecycle operations are handled by the dispatcher itself.
        ConnectionOp::Connect(_) | ConnectionOp::Disconnect => Value::Null,
    };
    Ok(Outcome::Value(value))
}

/// Exhausted cursors answer `false`, like the synchronous API does.
const EXHAUSTED: Value = Value::Bool(false);

fn call_statement<S: DriverStatement>(conn: &mut S::Connection, statement: &mut S, op: StatementOp) -> DriverResult<Value> {
    let value = match op {
        StatementOp::Execute { params } => statement.execute(conn, params)?.into(),
        StatementOp::BindValue {
            param,
            value,
            param_type,
        } => statement.bind_value(param, value, param_type)?.into(),
        StatementOp::Fetch {
            mode,
            orientation,
            offset,
        } => statement.fetch(conn, mode, orientation, offset)?.unwrap_or(EXHAUSTED),
        StatementOp::FetchAll { mode } => Value::List(statement.fetch_all(conn, mode)?),
        StatementOp::FetchColumn { index } => statement.fetch_column(index)?.unwrap_or(EXHAUSTED),
        StatementOp::ColumnCount => Value::Int(statement.column_count()),
        StatementOp::RowCount => statement.row_count().into(),
        StatementOp::GetColumnMeta { index } => statement.get_column_meta(index)?.map_or(EXHAUSTED, Value::from),
        StatementOp::NextRowset => statement.next_rowset()?.into(),
        StatementOp::CloseCursor => statement.close_cursor()?.into(),
        StatementOp::GetAttribute(attribute) => statement.get_attribute(attribute)?,
        StatementOp::SetAttribute(attribute, value) => statement.set_attribute(attribute, value)?.into(),
        StatementOp::ErrorCode => statement.error_code().into(),
        StatementOp::ErrorInfo => statement.error_info().into(),
        StatementOp::QueryString => statement.query_string().into(),
        StatementOp::DebugDumpParams => Value::Text(statement.debug_dump_params()),
        // Notification, handled by the dispatcher itself.
        StatementOp::Release => Value::Null,
    };
    Ok(value)
}

/// Flatten a driver error into an error response.
pub fn error_response(err: DriverError) -> Response {
    let message = err.to_string();
    let envelope = match err {
        DriverError::Sql {
            sqlstate,
            native_code,
            message: detail,
        } => ErrorEnvelope::driver(message, ErrorInfo::new(sqlstate, native_code, Some(detail))),
        DriverError::Generic { code, .. } => ErrorEnvelope::generic(message, code),
    };
    Response::Error(envelope)
}
