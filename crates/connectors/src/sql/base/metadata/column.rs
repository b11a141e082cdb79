use model::core::data_type::ColumnType;
use serde::Serialize;

/// A column as reported by the store's catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Native type name, e.g. `bigint` or `timestamp without time zone`.
    pub data_type: String,
    /// Portable type; `None` for native types outside the portable set.
    pub column_type: Option<ColumnType>,
    pub is_nullable: bool,
    pub char_max_length: Option<usize>,
    pub ordinal: usize,
}

impl ColumnMetadata {
    pub fn new(name: &str, data_type: &str, ordinal: usize) -> Self {
        ColumnMetadata {
            name: name.to_string(),
            data_type: data_type.to_string(),
            column_type: ColumnType::from_postgres_type(data_type),
            is_nullable: true,
            char_max_length: None,
            ordinal,
        }
    }

    /// The type writes are coerced to. Unknown native types take text.
    pub fn storage_type(&self) -> ColumnType {
        self.column_type.unwrap_or(ColumnType::Text)
    }
}

/// Orders column names primary key first, then lexically.
pub fn order_column_names(names: impl IntoIterator<Item = String>, primary_key: &str) -> Vec<String> {
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort_by(|a, b| (a != primary_key, a).cmp(&(b != primary_key, b)));
    names.dedup();
    names
}
