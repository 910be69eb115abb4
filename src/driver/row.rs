//! Shaping a raw row into one of the primitive fetch modes.

use super::{DriverError, DriverResult};
use crate::types::{CaseMode, FetchMode};
use crate::value::{Key, Record, Value};

/// Shape `values` (one per column, in column order) according to `mode`.
///
/// Duplicate column names follow associative-array rules: the later value
/// wins and keeps the position of the first occurrence, except in `Named`
/// mode where every value is kept, collected in a list.
pub fn shape_row(names: &[String], values: Vec<Value>, mode: FetchMode, case: CaseMode) -> DriverResult<Value> {
    let shaped = match mode {
        FetchMode::Num => Value::List(values),
        FetchMode::Assoc => Value::Record(assoc(names, values, case)),
        FetchMode::Obj => Value::Object(assoc(names, values, case)),
        FetchMode::Both => {
            let mut record = Record::with_capacity(values.len() * 2);
            for (index, (name, value)) in names.iter().zip(values).enumerate() {
                record.insert(case.apply(name), value.clone());
                record.insert(index, value);
            }
            Value::Record(record)
        }
        FetchMode::Named => {
            let mut record = Record::with_capacity(values.len());
            for (name, value) in names.iter().zip(values) {
                let key = Key::Name(case.apply(name));
                match record.get_mut(key.clone()) {
                    Some(Value::List(existing)) => existing.push(value),
                    Some(existing) => {
                        let first = std::mem::replace(existing, Value::Null);
                        *existing = Value::List(vec![first, value]);
                    }
                    None => record.insert(key, value),
                }
            }
            Value::Record(record)
        }
        other => return Err(not_primitive(other)),
    };
    Ok(shaped)
}

/// Only the primitive modes can be answered without caller-side types.
pub fn ensure_primitive(mode: FetchMode) -> DriverResult<()> {
    if mode.is_primitive() {
        Ok(())
    } else {
        Err(not_primitive(mode))
    }
}

fn not_primitive(mode: FetchMode) -> DriverError {
    DriverError::generic(format!("The {mode} fetch mode cannot be served by the driver"))
}

fn assoc(names: &[String], values: Vec<Value>, case: CaseMode) -> Record {
    let mut record = Record::with_capacity(values.len());
    for (name, value) in names.iter().zip(values) {
        record.insert(case.apply(name), value);
    }
    record
}
