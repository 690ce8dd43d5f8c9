//! Conversion of PostgreSQL rows into JSON values.

use crate::db::Row;
use crate::error::{AskDbError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgHasArrayType, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::{Column, Decode, Postgres, Row as _, Type, TypeInfo, ValueRef};

/// Text of a sqlx error as the engine reported it.
pub fn engine_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

pub fn row_to_json(row: &PgRow) -> Result<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for column in row.columns() {
        let value = column_to_json(row, column.ordinal(), column.type_info())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn column_to_json(row: &PgRow, idx: usize, type_info: &PgTypeInfo) -> Result<Value> {
    let raw = row
        .try_get_raw(idx)
        .map_err(|e| AskDbError::ExecutionFailed(e.to_string()))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_info.name() {
        "BOOL" => Value::Bool(get::<bool>(row, idx)?),
        "INT2" => Value::from(get::<i16>(row, idx)?),
        "INT4" => Value::from(get::<i32>(row, idx)?),
        "INT8" => Value::from(get::<i64>(row, idx)?),
        "FLOAT4" => float_value(get::<f32>(row, idx)? as f64),
        "FLOAT8" => float_value(get::<f64>(row, idx)?),
        "NUMERIC" => decimal_value(get::<Decimal>(row, idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => {
            Value::String(get::<String>(row, idx)?)
        }
        "UUID" => uuid_value(get(row, idx)?),
        "DATE" => date_value(get(row, idx)?),
        "TIME" => time_value(get(row, idx)?),
        "TIMESTAMP" => timestamp_value(get(row, idx)?),
        "TIMESTAMPTZ" => timestamptz_value(get(row, idx)?),
        "INTERVAL" => Value::String(interval_text(&get::<PgInterval>(row, idx)?)),
        "JSON" | "JSONB" => get::<Value>(row, idx)?,
        "BYTEA" => Value::String(hex(&get::<Vec<u8>>(row, idx)?)),
        "BOOL[]" => array(row, idx, Value::Bool)?,
        "INT2[]" => array(row, idx, |v: i16| Value::from(v))?,
        "INT4[]" => array(row, idx, |v: i32| Value::from(v))?,
        "INT8[]" => array(row, idx, |v: i64| Value::from(v))?,
        "FLOAT4[]" => array(row, idx, |v: f32| float_value(v as f64))?,
        "FLOAT8[]" => array(row, idx, float_value)?,
        "NUMERIC[]" => array(row, idx, decimal_value)?,
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => array(row, idx, Value::String)?,
        "UUID[]" => array(row, idx, uuid_value)?,
        "DATE[]" => array(row, idx, date_value)?,
        "TIME[]" => array(row, idx, time_value)?,
        "TIMESTAMP[]" => array(row, idx, timestamp_value)?,
        "TIMESTAMPTZ[]" => array(row, idx, timestamptz_value)?,
        "INTERVAL[]" => array(row, idx, |v: PgInterval| Value::String(interval_text(&v)))?,
        "JSON[]" | "JSONB[]" => array(row, idx, |v: Value| v)?,
        // Enum labels are sent as plain text in the binary format as well.
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => {
            Value::String(row.try_get_unchecked::<String, _>(idx).map_err(|e| {
                AskDbError::ExecutionFailed(format!("failed to decode column '{}': {}", column_name(row, idx), e))
            })?)
        }
        other => {
            return Err(AskDbError::ExecutionFailed(format!(
                "unsupported column type {} for column '{}'",
                other,
                column_name(row, idx)
            )))
        }
    };

    Ok(value)
}

fn column_name(row: &PgRow, idx: usize) -> &str {
    row.columns().get(idx).map(|c| c.name()).unwrap_or("?")
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<T, _>(idx).map_err(|e| {
        AskDbError::ExecutionFailed(format!("failed to decode column '{}': {}", column_name(row, idx), e))
    })
}

/// One-dimensional array; NULL elements stay `null`.
fn array<T, F>(row: &PgRow, idx: usize, convert: F) -> Result<Value>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres> + PgHasArrayType,
    F: Fn(T) -> Value,
{
    let items = get::<Vec<Option<T>>>(row, idx)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map(&convert).unwrap_or(Value::Null))
            .collect(),
    ))
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Numerics become JSON numbers only when no digits are lost, strings otherwise.
pub fn decimal_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    d.to_f64()
        .filter(|f| Decimal::from_f64(*f) == Some(d))
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

fn uuid_value(v: uuid::Uuid) -> Value {
    Value::String(v.to_string())
}

fn date_value(v: chrono::NaiveDate) -> Value {
    Value::String(v.to_string())
}

fn time_value(v: chrono::NaiveTime) -> Value {
    Value::String(v.to_string())
}

fn timestamp_value(v: chrono::NaiveDateTime) -> Value {
    Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn timestamptz_value(v: chrono::DateTime<chrono::Utc>) -> Value {
    Value::String(v.to_rfc3339())
}

/// ISO 8601 duration in the form PostgreSQL's `iso_8601` interval style prints,
/// e.g. `P1Y2M3DT4H5M6.5S`. Each component keeps its own sign.
pub fn interval_text(interval: &PgInterval) -> String {
    let years = interval.months / 12;
    let months = interval.months % 12;

    let mut out = String::from("P");
    if years != 0 {
        out.push_str(&format!("{}Y", years));
    }
    if months != 0 {
        out.push_str(&format!("{}M", months));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    if interval.microseconds != 0 {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let hours = total / 3_600_000_000;
        let minutes = (total / 60_000_000) % 60;
        let seconds = (total / 1_000_000) % 60;
        let micros = total % 1_000_000;

        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{}{}H", sign, hours));
        }
        if minutes != 0 {
            out.push_str(&format!("{}{}M", sign, minutes));
        }
        if seconds != 0 || micros != 0 {
            if micros == 0 {
                out.push_str(&format!("{}{}S", sign, seconds));
            } else {
                let fraction = format!("{:06}", micros);
                out.push_str(&format!("{}{}.{}S", sign, seconds, fraction.trim_end_matches('0')));
            }
        }
    }

    if out.len() == 1 {
        out.push_str("T0S");
    }
    out
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
