//! Caller-side stand-in for a remote statement.

use std::sync::Arc;

use tracing::debug;

use super::entity::{hydrate, Entity, EntityClass};
use super::fetch::{FetchArgument, FetchPlan, FetchState, Fetched};
use super::session::Session;
use crate::error::{DbResult, ProtocolError, UsageError};
use crate::protocol::{Handle, StatementOp};
use crate::types::{Attribute, ColumnMeta, CursorOrientation, ErrorInfo, FetchMode, Param, ParamType, Params};
use crate::value::{FromValue, Record, Value};

/// A prepared statement living in a worker.
///
/// Keeps its session, and so the remote connection, alive even after the
/// [`Connection`](super::Connection) itself is dropped.
/// [`Statement::close`] releases the remote handle; dropping an unclosed
/// statement schedules the release instead.
pub struct Statement {
    session: Arc<Session>,
    handle: Handle,
    fetch_state: FetchState,
    released: bool,
}

impl Statement {
    pub(crate) fn new(session: Arc<Session>, handle: Handle) -> Self {
        Self {
            session,
            handle,
            fetch_state: FetchState::default(),
            released: false,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn fetch_state(&self) -> &FetchState {
        &self.fetch_state
    }

    async fn invoke<T: FromValue>(&self, op: StatementOp) -> DbResult<T> {
        self.session.invoke(op.into_request(self.handle)).await
    }

    pub async fn execute(&self, params: Option<Params>) -> DbResult<bool> {
        self.invoke(StatementOp::Execute { params }).await
    }

    pub async fn bind_value(
        &self,
        param: impl Into<Param>,
        value: impl Into<Value>,
        param_type: ParamType,
    ) -> DbResult<bool> {
        self.invoke(StatementOp::BindValue {
            param: param.into(),
            value: value.into(),
            param_type,
        })
        .await
    }

    /// Always fails: a variable cannot be bound by reference across a
    /// process boundary. Use [`Statement::bind_value`].
    pub fn bind_param(&self, _param: impl Into<Param>, _variable: &mut Value, _param_type: ParamType) -> DbResult<bool> {
        Err(UsageError::BindByReference("bind_param").into())
    }

    /// Always fails, like [`Statement::bind_param`].
    pub fn bind_column(&self, _column: impl Into<Param>, _variable: &mut Value) -> DbResult<bool> {
        Err(UsageError::BindByReference("bind_column").into())
    }

    /// Set the default fetch mode. Local only; nothing is sent.
    pub fn set_fetch_mode(
        &mut self,
        mode: FetchMode,
        argument: Option<FetchArgument>,
        ctor_args: Option<Vec<Value>>,
    ) -> DbResult<()> {
        self.fetch_state.set(mode, argument, ctor_args)?;
        Ok(())
    }

    /// Next row, or `None` once the result set is exhausted.
    pub async fn fetch(
        &self,
        mode: Option<FetchMode>,
        orientation: CursorOrientation,
        offset: i64,
    ) -> DbResult<Option<Fetched>> {
        match self.fetch_state.plan(mode)? {
            FetchPlan::Remote(mode) => {
                let row: Option<Value> = self
                    .invoke(StatementOp::Fetch {
                        mode,
                        orientation,
                        offset,
                    })
                    .await?;
                Ok(row.map(Fetched::Row))
            }
            FetchPlan::Hydrate { class, ctor_args } => {
                let Some(row) = self.fetch_record(orientation, offset).await? else {
                    return Ok(None);
                };
                let mut entity = class.instantiate();
                hydrate(entity.as_mut(), row, Some(ctor_args.as_slice()));
                Ok(Some(Fetched::Entity(entity)))
            }
            FetchPlan::Populate(instance) => {
                let Some(row) = self.fetch_record(orientation, offset).await? else {
                    return Ok(None);
                };
                hydrate(&mut *instance.lock().await, row, None);
                Ok(Some(Fetched::Into(instance)))
            }
        }
    }

    /// Every remaining row.
    pub async fn fetch_all(
        &self,
        mode: Option<FetchMode>,
        argument: Option<FetchArgument>,
        ctor_args: Option<Vec<Value>>,
    ) -> DbResult<Vec<Fetched>> {
        match self.fetch_state.plan_all(mode, argument, ctor_args)? {
            FetchPlan::Remote(mode) => {
                let rows: Vec<Value> = self.invoke(StatementOp::FetchAll { mode }).await?;
                Ok(rows.into_iter().map(Fetched::Row).collect())
            }
            FetchPlan::Hydrate { class, ctor_args } => {
                let mut entities = Vec::new();
                while let Some(row) = self.fetch_record(CursorOrientation::Next, 0).await? {
                    let mut entity = class.instantiate();
                    hydrate(entity.as_mut(), row, Some(ctor_args.as_slice()));
                    entities.push(Fetched::Entity(entity));
                }
                Ok(entities)
            }
            FetchPlan::Populate(_) => Err(UsageError::UnsupportedFetchMode(FetchMode::Into).into()),
        }
    }

    /// Next row as a new instance of `class` (a [`StdObject`] by default).
    ///
    /// [`StdObject`]: super::entity::StdObject
    pub async fn fetch_object(
        &self,
        class: Option<EntityClass>,
        ctor_args: Vec<Value>,
    ) -> DbResult<Option<Box<dyn Entity>>> {
        let Some(row) = self.fetch_record(CursorOrientation::Next, 0).await? else {
            return Ok(None);
        };
        let mut entity = class.unwrap_or_else(EntityClass::std_object).instantiate();
        hydrate(entity.as_mut(), row, Some(ctor_args.as_slice()));
        Ok(Some(entity))
    }

    /// One associative row, the raw material for hydration.
    async fn fetch_record(&self, orientation: CursorOrientation, offset: i64) -> DbResult<Option<Record>> {
        let row: Option<Value> = self
            .invoke(StatementOp::Fetch {
                mode: Some(FetchMode::Assoc),
                orientation,
                offset,
            })
            .await?;
        match row {
            None => Ok(None),
            Some(Value::Record(record)) => Ok(Some(record)),
            Some(other) => Err(self
                .session
                .fail(ProtocolError::unexpected_payload("associative row", &other))),
        }
    }

    /// Column `index` of the next row; `None` once exhausted.
    ///
    /// A SQL `NULL` comes back as `Some(Value::Null)`.
    pub async fn fetch_column(&self, index: usize) -> DbResult<Option<Value>> {
        let value: Value = self.invoke(StatementOp::FetchColumn { index }).await?;
        Ok(match value {
            Value::Bool(false) => None,
            value => Some(value),
        })
    }

    pub async fn column_count(&self) -> DbResult<i64> {
        self.invoke(StatementOp::ColumnCount).await
    }

    pub async fn row_count(&self) -> DbResult<u64> {
        self.invoke(StatementOp::RowCount).await
    }

    pub async fn get_column_meta(&self, index: usize) -> DbResult<Option<ColumnMeta>> {
        self.invoke(StatementOp::GetColumnMeta { index }).await
    }

    pub async fn next_rowset(&self) -> DbResult<bool> {
        self.invoke(StatementOp::NextRowset).await
    }

    pub async fn close_cursor(&self) -> DbResult<bool> {
        self.invoke(StatementOp::CloseCursor).await
    }

    pub async fn get_attribute(&self, attribute: Attribute) -> DbResult<Value> {
        self.invoke(StatementOp::GetAttribute(attribute)).await
    }

    pub async fn set_attribute(&self, attribute: Attribute, value: impl Into<Value>) -> DbResult<bool> {
        self.invoke(StatementOp::SetAttribute(attribute, value.into())).await
    }

    pub async fn error_code(&self) -> DbResult<Option<String>> {
        self.invoke(StatementOp::ErrorCode).await
    }

    pub async fn error_info(&self) -> DbResult<ErrorInfo> {
        self.invoke(StatementOp::ErrorInfo).await
    }

    pub async fn query_string(&self) -> DbResult<String> {
        self.invoke(StatementOp::QueryString).await
    }

    pub async fn debug_dump_params(&self) -> DbResult<String> {
        self.invoke(StatementOp::DebugDumpParams).await
    }

    /// Release the remote handle. Nothing is sent once the session is
    /// closed.
    pub async fn close(mut self) -> DbResult<()> {
        let released = std::mem::replace(&mut self.released, true);
        if released || self.session.is_closed() {
            return Ok(());
        }
        self.session.notify(StatementOp::Release.into_request(self.handle)).await
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if self.released || self.session.is_closed() {
            return;
        }
        self.released = true;
        let session = Arc::clone(&self.session);
        let request = StatementOp::Release.into_request(self.handle);
        self.session.runtime().spawn(async move {
            if let Err(err) = session.notify(request).await {
                debug!(error = %err, "background release failed");
            }
        });
    }
}
