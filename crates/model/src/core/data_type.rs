use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// The closed set of column types the sync engine infers and maintains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Timestamp,
    Range,
    Json,
    Text,
}

lazy_static! {
    static ref POSTGRES_TYPE_MAP: HashMap<&'static str, ColumnType> = build_postgres_type_map();
}

impl ColumnType {
    /// Maps a Postgres `information_schema.columns.data_type` (or `udt_name`)
    /// onto the engine's type set. Unknown types yield `None`.
    pub fn from_postgres_type(type_name: &str) -> Option<Self> {
        let normalized = type_name.trim().to_lowercase();
        let base = normalized
            .split('(')
            .next()
            .unwrap_or(normalized.as_str())
            .trim();
        POSTGRES_TYPE_MAP.get(base).copied()
    }

    pub fn postgres_name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Range => "TSRANGE",
            ColumnType::Json => "JSON",
            ColumnType::Text => "TEXT",
        }
    }

    /// The only promotion the engine performs is INTEGER -> FLOAT.
    pub fn widens_to(&self, other: ColumnType) -> bool {
        matches!((self, other), (ColumnType::Integer, ColumnType::Float))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Range => "RANGE",
            ColumnType::Json => "JSON",
            ColumnType::Text => "TEXT",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BOOLEAN" => Ok(ColumnType::Boolean),
            "INTEGER" => Ok(ColumnType::Integer),
            "FLOAT" => Ok(ColumnType::Float),
            "TIMESTAMP" => Ok(ColumnType::Timestamp),
            "RANGE" => Ok(ColumnType::Range),
            "JSON" => Ok(ColumnType::Json),
            "TEXT" => Ok(ColumnType::Text),
            other => ColumnType::from_postgres_type(other)
                .ok_or_else(|| format!("Unknown column type: {s}")),
        }
    }
}

fn build_postgres_type_map() -> HashMap<&'static str, ColumnType> {
    HashMap::from([
        ("boolean", ColumnType::Boolean),
        ("bool", ColumnType::Boolean),
        ("smallint", ColumnType::Integer),
        ("integer", ColumnType::Integer),
        ("bigint", ColumnType::Integer),
        ("int", ColumnType::Integer),
        ("int2", ColumnType::Integer),
        ("int4", ColumnType::Integer),
        ("int8", ColumnType::Integer),
        ("smallserial", ColumnType::Integer),
        ("serial", ColumnType::Integer),
        ("bigserial", ColumnType::Integer),
        ("double precision", ColumnType::Float),
        ("float", ColumnType::Float),
        ("float4", ColumnType::Float),
        ("float8", ColumnType::Float),
        ("real", ColumnType::Float),
        ("numeric", ColumnType::Float),
        ("decimal", ColumnType::Float),
        ("timestamp", ColumnType::Timestamp),
        ("timestamp without time zone", ColumnType::Timestamp),
        ("timestamp with time zone", ColumnType::Timestamp),
        ("timestamptz", ColumnType::Timestamp),
        ("date", ColumnType::Timestamp),
        ("tsrange", ColumnType::Range),
        ("tstzrange", ColumnType::Range),
        ("json", ColumnType::Json),
        ("jsonb", ColumnType::Json),
        ("text", ColumnType::Text),
        ("character varying", ColumnType::Text),
        ("varchar", ColumnType::Text),
        ("character", ColumnType::Text),
        ("char", ColumnType::Text),
        ("bpchar", ColumnType::Text),
        ("name", ColumnType::Text),
        ("uuid", ColumnType::Text),
    ])
}
