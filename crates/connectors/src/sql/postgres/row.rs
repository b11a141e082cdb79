use crate::sql::{base::error::DbError, postgres::range::PgRange};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use model::{
    core::value::Value,
    records::row::{FieldValue, RowData},
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{error::Error, net::IpAddr};
use tokio_postgres::{
    Row,
    types::{FromSql, FromSqlOwned, Kind, Type},
};
use uuid::Uuid;

/// A value whose binary wire form is its UTF-8 text: enum labels, xml,
/// citext and the string types.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLike(pub String);

impl<'a> FromSql<'a> for TextLike {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(TextLike(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_)) || *ty == Type::XML || <String as FromSql<'_>>::accepts(ty)
    }
}

fn get<T: FromSqlOwned>(row: &Row, idx: usize) -> Result<Option<T>, DbError> {
    row.try_get::<_, Option<T>>(idx).map_err(|err| {
        DbError::Decode(format!("column \"{}\": {err}", row.columns()[idx].name()))
    })
}

/// Decodes column `idx` into a [`Value`] according to its wire type.
pub fn column_value(row: &Row, idx: usize) -> Result<Value, DbError> {
    let ty = row.columns()[idx].type_().clone();

    let value = match ty {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Boolean),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Value::Int),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Value::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Value::Float),
        Type::NUMERIC => get::<Decimal>(row, idx)?
            .and_then(|d| d.to_f64())
            .map(Value::Float),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx)?.map(Value::String)
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx)?
            .map(|ts| Value::Timestamp(ts.naive_utc())),
        Type::DATE => get::<NaiveDate>(row, idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        Type::TS_RANGE | Type::TSTZ_RANGE => get::<PgRange>(row, idx)?
            .and_then(|r| r.0)
            .map(Value::Range),
        Type::UUID => get::<Uuid>(row, idx)?.map(|v| Value::String(v.to_string())),
        Type::TIME => get::<NaiveTime>(row, idx)?
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string())),
        Type::INET => get::<IpAddr>(row, idx)?.map(|ip| Value::String(ip.to_string())),
        _ if TextLike::accepts(&ty) => get::<TextLike>(row, idx)?.map(|t| Value::String(t.0)),
        _ => {
            return Err(DbError::Decode(format!(
                "column \"{}\" has unsupported type {ty}",
                row.columns()[idx].name()
            )));
        }
    };

    Ok(value.unwrap_or(Value::Null))
}

pub fn to_row_data(table: &str, row: &Row) -> Result<RowData, DbError> {
    let fields = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| -> Result<FieldValue, DbError> {
            Ok(FieldValue {
                name: column.name().to_string(),
                value: column_value(row, idx)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RowData::new(table, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mood() -> Type {
        Type::new(
            "mood".to_string(),
            90_001,
            Kind::Enum(vec!["happy".to_string(), "sad".to_string()]),
            "public".to_string(),
        )
    }

    #[test]
    fn test_text_like_types() {
        assert!(TextLike::accepts(&mood()));
        assert!(TextLike::accepts(&Type::XML));
        assert!(TextLike::accepts(&Type::TEXT));
        assert!(!TextLike::accepts(&Type::INTERVAL));
        assert!(!TextLike::accepts(&Type::INT4_ARRAY));

        let label = TextLike::from_sql(&mood(), b"happy").unwrap();
        assert_eq!(label, TextLike("happy".to_string()));
        assert!(TextLike::from_sql(&Type::XML, &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_uuid_wire_value() {
        let raw = [
            0x67, 0xe5, 0x50, 0x44, 0x10, 0xb1, 0x42, 0x6f, 0x92, 0x47, 0xbb, 0x68, 0x0e, 0x5f, 0xe0,
            0xc8,
        ];
        let id = Uuid::from_sql(&Type::UUID, &raw).unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }
}
