use model::core::data_type::ColumnType;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any Postgres driver error.
    #[error("SQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// The table (relation) does not exist.
    #[error("relation \"{0}\" does not exist")]
    MissingRelation(String),

    /// The column does not exist on an existing table.
    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    MissingColumn { table: String, column: String },

    /// A value cannot be stored in the column it is addressed to.
    #[error("cannot store {value} in column \"{column}\" of type {column_type} on \"{table}\"")]
    Coercion {
        table: String,
        column: String,
        column_type: ColumnType,
        value: String,
    },

    /// The adapter has no live transport.
    #[error("not connected")]
    NotConnected,

    /// Writing rows to the database failed at the application level.
    #[error("Write error: {0}")]
    Write(String),

    /// A row returned by the store could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl DbError {
    /// "relation does not exist": expected absence, not a failure.
    pub fn is_missing_relation(&self) -> bool {
        match self {
            DbError::MissingRelation(_) => true,
            DbError::Postgres(err) => err.code() == Some(&SqlState::UNDEFINED_TABLE),
            _ => false,
        }
    }

    pub fn is_missing_column(&self) -> bool {
        match self {
            DbError::MissingColumn { .. } => true,
            DbError::Postgres(err) => err.code() == Some(&SqlState::UNDEFINED_COLUMN),
            _ => false,
        }
    }
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Postgres connection failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}
