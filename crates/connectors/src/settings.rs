use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_PRIMARY_KEY: &str = "id";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_WATERMARK_COLUMN: &str = "updated_at";

/// One named entry of the connections map: `{ "type": "pg", "connectionString": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "connectionString")]
    pub connection_string: String,
}

impl ConnectionConfig {
    pub fn new(kind: &str, connection_string: &str) -> Self {
        ConnectionConfig {
            kind: kind.to_string(),
            connection_string: connection_string.to_string(),
        }
    }
}

/// Per-connector tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorSettings {
    /// Rows per read window.
    pub chunk_size: usize,
    pub primary_key: String,
    /// Relational schema the connector lists and writes tables in.
    pub schema: String,
    pub pool_size: usize,
    /// Rows buffered by the CSV reader before it pauses for the handler.
    pub csv_batch_size: usize,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        ConnectorSettings {
            chunk_size: DEFAULT_CHUNK_SIZE,
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            pool_size: 4,
            csv_batch_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ConnectorSettings {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_csv_batch_size(mut self, batch_size: usize) -> Self {
        self.csv_batch_size = batch_size.max(1);
        self
    }

    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_wire_names() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{ "type": "pg", "connectionString": "postgres://localhost/db" }"#)
                .unwrap();
        assert_eq!(config, ConnectionConfig::new("pg", "postgres://localhost/db"));
    }

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings: ConnectorSettings = serde_json::from_str(r#"{ "chunkSize": 2 }"#).unwrap();
        assert_eq!(settings.chunk_size, 2);
        assert_eq!(settings.primary_key, "id");
        assert_eq!(settings.schema, "public");
        assert_eq!(settings.csv_batch_size, 1000);
    }
}
