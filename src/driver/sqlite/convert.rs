//! Conversions between wire values and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::driver::{DriverError, DriverResult};
use crate::types::ParamType;
use crate::value::Value;

/// Value to bind for `value` under the `param_type` hint.
///
/// Values keep their own type unless the hint asks for a coercion: `Null`
/// binds NULL, `Bool` binds 0 or 1, `Int` parses numeric text, and `Lob`
/// binds text as a blob.
pub(super) fn to_sql(value: &Value, param_type: ParamType) -> DriverResult<SqlValue> {
    let converted = match (param_type, value) {
        (ParamType::Null, _) | (_, Value::Null) => SqlValue::Null,
        (ParamType::Bool, value) => SqlValue::Integer(i64::from(truthy(value))),
        (ParamType::Int, Value::Text(text)) => match text.trim().parse::<i64>() {
            Ok(i) => SqlValue::Integer(i),
            Err(_) => SqlValue::Text(text.clone()),
        },
        (ParamType::Lob, Value::Text(text)) => SqlValue::Blob(text.clone().into_bytes()),
        (_, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (_, Value::Int(i)) => SqlValue::Integer(*i),
        (_, Value::Float(f)) => SqlValue::Real(*f),
        (_, Value::Text(text)) => SqlValue::Text(text.clone()),
        (_, Value::Blob(bytes)) => SqlValue::Blob(bytes.clone()),
        (_, other) => {
            return Err(DriverError::generic(format!(
                "Cannot bind a value of type {}",
                other.type_name()
            )))
        }
    };
    Ok(converted)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(text) => !text.is_empty() && text != "0",
        Value::Blob(bytes) => !bytes.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Record(record) | Value::Object(record) => !record.is_empty(),
    }
}

pub(super) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Storage class name reported as a column's native type.
pub(super) fn native_type(value: &Value) -> &'static str {
    match value {
        Value::Int(_) | Value::Bool(_) => "integer",
        Value::Float(_) => "double",
        Value::Blob(_) => "blob",
        Value::Null => "null",
        _ => "string",
    }
}

/// Parameter type a column value would bind as.
pub(super) fn param_type_of(value: &Value) -> ParamType {
    match value {
        Value::Null => ParamType::Null,
        Value::Int(_) | Value::Bool(_) => ParamType::Int,
        Value::Blob(_) => ParamType::Lob,
        _ => ParamType::Str,
    }
}

/// Numeric code of a parameter type as shown by `debug_dump_params`.
pub(super) fn param_type_code(param_type: ParamType) -> u8 {
    match param_type {
        ParamType::Null => 0,
        ParamType::Int => 1,
        ParamType::Str => 2,
        ParamType::Lob => 3,
        ParamType::Bool => 5,
    }
}
