use std::collections::VecDeque;
use std::fmt::Write as _;

use super::convert::{from_sql, native_type, param_type_code, param_type_of, to_sql};
use super::{map_error, SqliteConnection};
use crate::driver::{ensure_primitive, shape_row, DriverError, DriverResult, DriverStatement};
use crate::types::{Attribute, ColumnMeta, CursorOrientation, ErrorInfo, FetchMode, Param, ParamType, Params};
use crate::value::Value;

/// A value bound to a placeholder.
#[derive(Debug, Clone)]
struct Binding {
    param: Param,
    /// 1-based placeholder index.
    index: usize,
    value: Value,
    param_type: ParamType,
}

/// A prepared SQLite statement.
///
/// rusqlite statements borrow their connection, so the statement keeps its
/// SQL and shape and re-prepares through the connection's statement cache
/// on each execution. Result rows are read in full on execution and served
/// from a buffer; the cursor is forward-only.
#[derive(Debug)]
pub struct SqliteStatement {
    sql: String,
    columns: Vec<String>,
    decl_types: Vec<Option<String>>,
    param_names: Vec<Option<String>>,
    bindings: Vec<Binding>,
    rows: VecDeque<Vec<Value>>,
    /// Last row handed out, for column metadata.
    current: Option<Vec<Value>>,
    executed: bool,
    row_count: u64,
    last_error: Option<ErrorInfo>,
}

impl SqliteStatement {
    pub(super) fn prepare(conn: &rusqlite::Connection, sql: &str) -> DriverResult<Option<Self>> {
        if sql.trim().is_empty() {
            return Ok(None);
        }

        let stmt = conn.prepare(sql).map_err(map_error)?;
        let (columns, decl_types): (Vec<String>, Vec<Option<String>>) = stmt
            .columns()
            .iter()
            .map(|column| (column.name().to_string(), column.decl_type().map(str::to_string)))
            .unzip();
        let param_names: Vec<Option<String>> = (1..=stmt.parameter_count())
            .map(|i| stmt.parameter_name(i).map(str::to_string))
            .collect();

        Ok(Some(Self {
            sql: sql.to_string(),
            columns,
            decl_types,
            param_names,
            bindings: Vec::new(),
            rows: VecDeque::new(),
            current: None,
            executed: false,
            row_count: 0,
            last_error: None,
        }))
    }

    fn track<T>(&mut self, result: DriverResult<T>) -> DriverResult<T> {
        self.last_error = Some(match &result {
            Ok(_) => ErrorInfo::success(),
            Err(err) => err.info(),
        });
        result
    }

    /// 1-based index of a placeholder.
    fn resolve(&self, param: &Param) -> DriverResult<usize> {
        let index = match param {
            Param::Position(position) => Some(*position).filter(|p| (1..=self.param_names.len()).contains(p)),
            Param::Name(name) => {
                let wanted = if name.starts_with([':', '@', '$']) {
                    name.clone()
                } else {
                    format!(":{name}")
                };
                self.param_names
                    .iter()
                    .position(|candidate| candidate.as_deref() == Some(wanted.as_str()))
                    .map(|i| i + 1)
            }
        };
        index.ok_or_else(|| DriverError::invalid_parameter("parameter was not defined"))
    }

    fn bind(&mut self, param: Param, value: Value, param_type: ParamType) -> DriverResult<()> {
        let index = self.resolve(&param)?;
        let binding = Binding {
            param,
            index,
            value,
            param_type,
        };
        match self.bindings.iter_mut().find(|b| b.index == index) {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
        Ok(())
    }

    fn run(&mut self, conn: &mut SqliteConnection, params: Option<Params>) -> DriverResult<bool> {
        if let Some(params) = params {
            self.bindings.clear();
            for (param, value) in params.into_bindings() {
                self.bind(param, value, ParamType::Str)?;
            }
        }

        let width = self.columns.len();
        let mut rows = VecDeque::new();
        {
            let mut stmt = conn.conn.prepare_cached(&self.sql).map_err(map_error)?;
            for binding in &self.bindings {
                stmt.raw_bind_parameter(binding.index, to_sql(&binding.value, binding.param_type)?)
                    .map_err(map_error)?;
            }

            let mut cursor = stmt.raw_query();
            while let Some(row) = cursor.next().map_err(map_error)? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_sql(row.get_ref(i).map_err(map_error)?));
                }
                rows.push_back(values);
            }
        }

        self.rows = rows;
        self.current = None;
        self.executed = true;
        self.row_count = if width == 0 { conn.conn.changes() as u64 } else { 0 };
        Ok(true)
    }

    fn next_row(&mut self) -> Option<Vec<Value>> {
        let row = self.rows.pop_front();
        self.current = row.clone();
        row
    }
}

impl DriverStatement for SqliteStatement {
    type Connection = SqliteConnection;

    fn execute(&mut self, conn: &mut SqliteConnection, params: Option<Params>) -> DriverResult<bool> {
        let result = self.run(conn, params);
        self.track(result)
    }

    fn bind_value(&mut self, param: Param, value: Value, param_type: ParamType) -> DriverResult<bool> {
        let result = self.bind(param, value, param_type).map(|()| true);
        self.track(result)
    }

    fn fetch(
        &mut self,
        conn: &mut SqliteConnection,
        mode: Option<FetchMode>,
        _orientation: CursorOrientation,
        _offset: i64,
    ) -> DriverResult<Option<Value>> {
        let mode = mode.unwrap_or(conn.default_fetch_mode);
        ensure_primitive(mode)?;
        match self.next_row() {
            Some(values) => shape_row(&self.columns, values, mode, conn.case).map(Some),
            None => Ok(None),
        }
    }

    fn fetch_all(&mut self, conn: &mut SqliteConnection, mode: Option<FetchMode>) -> DriverResult<Vec<Value>> {
        let mode = mode.unwrap_or(conn.default_fetch_mode);
        ensure_primitive(mode)?;
        self.current = None;
        self.rows
            .drain(..)
            .map(|values| shape_row(&self.columns, values, mode, conn.case))
            .collect()
    }

    fn fetch_column(&mut self, index: usize) -> DriverResult<Option<Value>> {
        if index >= self.columns.len() {
            return Err(DriverError::generic("Invalid column index"));
        }
        Ok(self.next_row().map(|mut values| values.swap_remove(index)))
    }

    fn column_count(&self) -> i64 {
        if self.executed {
            self.columns.len() as i64
        } else {
            0
        }
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn get_column_meta(&mut self, index: usize) -> DriverResult<Option<ColumnMeta>> {
        let Some(name) = self.columns.get(index) else {
            return Ok(None);
        };
        let sample = self
            .current
            .as_ref()
            .or(self.rows.front())
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or(Value::Null);

        Ok(Some(ColumnMeta {
            name: name.clone(),
            native_type: Some(native_type(&sample).to_string()),
            decl_type: self.decl_types.get(index).cloned().flatten(),
            len: -1,
            precision: 0,
            param_type: param_type_of(&sample),
        }))
    }

    fn next_rowset(&mut self) -> DriverResult<bool> {
        let result = Err(DriverError::unsupported("driver does not support multiple rowsets"));
        self.track(result)
    }

    fn close_cursor(&mut self) -> DriverResult<bool> {
        self.rows.clear();
        self.current = None;
        Ok(true)
    }

    fn get_attribute(&mut self, _attribute: Attribute) -> DriverResult<Value> {
        let result = Err(DriverError::unsupported("This driver doesn't support getting attributes"));
        self.track(result)
    }

    fn set_attribute(&mut self, _attribute: Attribute, _value: Value) -> DriverResult<bool> {
        let result = Err(DriverError::unsupported("This driver doesn't support setting attributes"));
        self.track(result)
    }

    fn error_code(&self) -> Option<String> {
        self.last_error.as_ref().map(|info| info.sqlstate.clone())
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error
            .clone()
            .unwrap_or_else(|| ErrorInfo::new("", None, None))
    }

    fn query_string(&self) -> &str {
        &self.sql
    }

    fn debug_dump_params(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SQL: [{}] {}", self.sql.len(), self.sql);
        let _ = writeln!(out, "Params:  {}", self.bindings.len());
        for binding in &self.bindings {
            match &binding.param {
                Param::Position(_) => {
                    let _ = writeln!(out, "Key: Position #{}:", binding.index - 1);
                    let _ = writeln!(out, "paramno={}", binding.index - 1);
                    let _ = writeln!(out, "name=[0] \"\"");
                }
                Param::Name(_) => {
                    let name = self
                        .param_names
                        .get(binding.index - 1)
                        .cloned()
                        .flatten()
                        .unwrap_or_default();
                    let _ = writeln!(out, "Key: Name: [{}] {name}", name.len());
                    let _ = writeln!(out, "paramno=-1");
                    let _ = writeln!(out, "name=[{}] \"{name}\"", name.len());
                }
            }
            let _ = writeln!(out, "is_param=1");
            let _ = writeln!(out, "param_type={}", param_type_code(binding.param_type));
        }
        out
    }
}
