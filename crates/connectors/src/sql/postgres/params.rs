use crate::sql::postgres::range::encode_range;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use model::core::{data_type::ColumnType, value::Value};
use rust_decimal::Decimal;
use std::{error::Error, str::FromStr};
use tokio_postgres::types::{IsNull, Json as PgJson, ToSql, Type, to_sql_checked};

/// A [`Value`] bound as a statement parameter.
///
/// The encoding is chosen from the parameter type the server inferred for
/// the placeholder, so the same value binds to BIGINT, FLOAT, NUMERIC or
/// TEXT columns alike.
#[derive(Debug)]
pub struct PgParam(Value);

impl PgParam {
    pub fn from_value(value: Value) -> Self {
        PgParam(value)
    }
}

fn mismatch(value: &Value, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {value} as {ty}").into()
}

impl ToSql for PgParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        let value = &self.0;
        if value.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::BOOL => value.as_bool().ok_or_else(|| mismatch(value, ty))?.to_sql(ty, out),
            Type::INT2 => {
                let v = value.as_i64().ok_or_else(|| mismatch(value, ty))?;
                i16::try_from(v)?.to_sql(ty, out)
            }
            Type::INT4 => {
                let v = value.as_i64().ok_or_else(|| mismatch(value, ty))?;
                i32::try_from(v)?.to_sql(ty, out)
            }
            Type::INT8 => value.as_i64().ok_or_else(|| mismatch(value, ty))?.to_sql(ty, out),
            Type::FLOAT4 => {
                let v = value.as_f64().ok_or_else(|| mismatch(value, ty))?;
                (v as f32).to_sql(ty, out)
            }
            Type::FLOAT8 => value.as_f64().ok_or_else(|| mismatch(value, ty))?.to_sql(ty, out),
            Type::NUMERIC => {
                let decimal = match value {
                    Value::Int(v) => Decimal::from(*v),
                    Value::Float(v) => Decimal::from_str(&v.to_string())?,
                    other => {
                        let text = other.as_text().ok_or_else(|| mismatch(value, ty))?;
                        Decimal::from_str(&text)?
                    }
                };
                decimal.to_sql(ty, out)
            }
            Type::TIMESTAMP => match value.coerce_to(ColumnType::Timestamp) {
                Some(Value::Timestamp(ts)) => ts.to_sql(ty, out),
                _ => Err(mismatch(value, ty)),
            },
            Type::TIMESTAMPTZ => match value.coerce_to(ColumnType::Timestamp) {
                Some(Value::Timestamp(ts)) => {
                    DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc).to_sql(ty, out)
                }
                _ => Err(mismatch(value, ty)),
            },
            Type::DATE => match value.coerce_to(ColumnType::Timestamp) {
                Some(Value::Timestamp(ts)) => ts.date().to_sql(ty, out),
                _ => Err(mismatch(value, ty)),
            },
            Type::JSON | Type::JSONB => match value {
                Value::Json(v) => PgJson(v).to_sql(ty, out),
                other => PgJson(serde_json::to_value(other.as_text())?).to_sql(ty, out),
            },
            Type::TS_RANGE | Type::TSTZ_RANGE => match value {
                Value::Range(range) => encode_range(range, out),
                _ => Err(mismatch(value, ty)),
            },
            _ => value
                .as_text()
                .ok_or_else(|| mismatch(value, ty))?
                .to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            params: values.into_iter().map(PgParam::from_value).collect(),
        }
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect::<Vec<_>>()
    }
}
