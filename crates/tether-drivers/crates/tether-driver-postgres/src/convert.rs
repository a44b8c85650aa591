//! JSON values to PostgreSQL parameters and back

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_types::{FromSql, IsNull, ToSql, Type};
use tether_core::{Result, TetherError, Value};
use tokio_postgres::Row as PgRow;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// A parameter bound to the type the prepared statement declared.
///
/// tokio-postgres writes the binary width of the Rust type, so integers must
/// be narrowed to the column width before binding.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParam {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

fn out_of_range(value: &serde_json::Number, ty: &Type) -> TetherError {
    TetherError::QueryFailed(format!("parameter {} is out of range for {}", value, ty))
}

impl PgParam {
    pub(crate) fn from_json(value: &Value, ty: &Type) -> Result<Self> {
        let param = match value {
            Value::Null => PgParam::Null,
            Value::Bool(b) => PgParam::Bool(*b),
            Value::Number(n) => Self::from_number(n, ty)?,
            Value::String(s) => Self::from_text(s, ty),
            Value::Array(_) | Value::Object(_) => PgParam::Json(value.clone()),
        };
        Ok(param)
    }

    fn from_number(n: &serde_json::Number, ty: &Type) -> Result<Self> {
        let param = match *ty {
            Type::INT2 => PgParam::Int16(
                n.as_i64()
                    .and_then(|v| i16::try_from(v).ok())
                    .ok_or_else(|| out_of_range(n, ty))?,
            ),
            Type::INT4 => PgParam::Int32(
                n.as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| out_of_range(n, ty))?,
            ),
            Type::INT8 => PgParam::Int64(n.as_i64().ok_or_else(|| out_of_range(n, ty))?),
            Type::FLOAT4 => PgParam::Float32(n.as_f64().unwrap_or_default() as f32),
            Type::FLOAT8 => PgParam::Float64(n.as_f64().unwrap_or_default()),
            Type::JSON | Type::JSONB => PgParam::Json(Value::Number(n.clone())),
            Type::TEXT | Type::VARCHAR => PgParam::Text(n.to_string()),
            _ => match n.as_i64() {
                Some(v) => PgParam::Int64(v),
                None => PgParam::Float64(n.as_f64().unwrap_or_default()),
            },
        };
        Ok(param)
    }

    /// Strings are coerced when the declared type is structured; anything
    /// that does not parse is sent as text and left to the server to reject.
    fn from_text(s: &str, ty: &Type) -> Self {
        let text = || PgParam::Text(s.to_string());
        match *ty {
            Type::JSON | Type::JSONB => serde_json::from_str(s)
                .map(PgParam::Json)
                .unwrap_or_else(|_| PgParam::Json(Value::String(s.to_string()))),
            Type::UUID => uuid::Uuid::parse_str(s).map(PgParam::Uuid).unwrap_or_else(|_| text()),
            Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(PgParam::Date)
                .unwrap_or_else(|_| text()),
            Type::TIMESTAMP => parse_naive_timestamp(s)
                .map(PgParam::Timestamp)
                .unwrap_or_else(text),
            Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(s)
                .map(|ts| ts.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    parse_naive_timestamp(s).map(|ts| DateTime::from_naive_utc_and_offset(ts, Utc))
                })
                .map(PgParam::TimestampTz)
                .unwrap_or_else(text),
            _ => text(),
        }
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl ToSql for PgParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            PgParam::Null => Ok(IsNull::Yes),
            PgParam::Bool(v) => v.to_sql(ty, out),
            PgParam::Int16(v) => v.to_sql(ty, out),
            PgParam::Int32(v) => v.to_sql(ty, out),
            PgParam::Int64(v) => v.to_sql(ty, out),
            PgParam::Float32(v) => v.to_sql(ty, out),
            PgParam::Float64(v) => v.to_sql(ty, out),
            PgParam::Text(v) => v.to_sql(ty, out),
            PgParam::Json(v) => v.to_sql(ty, out),
            PgParam::Uuid(v) => v.to_sql(ty, out),
            PgParam::Date(v) => v.to_sql(ty, out),
            PgParam::Timestamp(v) => v.to_sql(ty, out),
            PgParam::TimestampTz(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Decimal text of a binary NUMERIC payload
#[derive(Debug)]
struct NumericText(String);

impl NumericText {
    fn decode(raw: &[u8]) -> std::result::Result<String, BoxError> {
        let header = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }
        let ndigits = header(0) as usize;
        let weight = header(2) as i16 as i32;
        let sign = header(4);
        let dscale = header(6) as usize;

        if sign == 0xC000 {
            return Ok("NaN".to_string());
        }
        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        let groups: Vec<u16> = (0..ndigits).map(|i| header(8 + i * 2)).collect();

        // Group k holds the base-10000 digit at position `weight - k`
        let group_at = |position: i32| -> u16 {
            let index = weight - position;
            if index < 0 {
                return 0;
            }
            groups.get(index as usize).copied().unwrap_or(0)
        };

        let mut integer = String::new();
        for position in (0..=weight.max(0)).rev() {
            let group = group_at(position);
            if integer.is_empty() {
                if group != 0 || position == 0 {
                    integer.push_str(&group.to_string());
                }
            } else {
                integer.push_str(&format!("{:04}", group));
            }
        }

        let mut fraction = String::new();
        let mut position = -1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group_at(position)));
            position -= 1;
        }
        fraction.truncate(dscale);

        let mut text = String::new();
        if sign == 0x4000 {
            text.push('-');
        }
        text.push_str(&integer);
        if !fraction.is_empty() {
            text.push('.');
            text.push_str(&fraction);
        }
        Ok(text)
    }
}

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Self(Self::decode(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw UTF-8 payload, for enums and other text-like custom types
#[derive(Debug)]
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

fn float(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Convert one column of a result row to JSON. NULLs and values that fail to
/// decode become `null`.
pub(crate) fn column_to_value(row: &PgRow, idx: usize) -> Value {
    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::BOOL => get::<bool>(row, idx).map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx).map(Value::from),
        Type::INT4 => get::<i32>(row, idx).map(Value::from),
        Type::INT8 => get::<i64>(row, idx).map(Value::from),
        Type::OID => get::<u32>(row, idx).map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx).map(|v| float(v as f64)),
        Type::FLOAT8 => get::<f64>(row, idx).map(float),
        Type::NUMERIC => get::<NumericText>(row, idx).map(|v| Value::String(v.0)),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx),
        Type::UUID => get::<uuid::Uuid>(row, idx).map(|v| Value::String(v.to_string())),
        Type::DATE => get::<NaiveDate>(row, idx).map(|v| Value::String(v.to_string())),
        Type::TIME => get::<NaiveTime>(row, idx).map(|v| Value::String(v.to_string())),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(|v| Value::String(v.to_rfc3339())),
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(Value::from),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => get::<Vec<String>>(row, idx).map(Value::from),
        Type::INT4_ARRAY => get::<Vec<i32>>(row, idx).map(Value::from),
        Type::INT8_ARRAY => get::<Vec<i64>>(row, idx).map(Value::from),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx).map(Value::String)
        }
        _ => get::<RawText>(row, idx).map(|v| Value::String(v.0)),
    };
    value.unwrap_or(Value::Null)
}
