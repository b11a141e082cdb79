use crate::error::SyncError;
use connectors::settings::{
    ConnectionConfig, ConnectorSettings, DEFAULT_CHUNK_SIZE, DEFAULT_PRIMARY_KEY, DEFAULT_SCHEMA,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};
use tracing::debug;

pub const SOURCE_VAR: &str = "SOURCE";
pub const DESTINATION_VAR: &str = "DESTINATION";

/// A sync run: which connections to copy between, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub connections: BTreeMap<String, ConnectionConfig>,
    pub source: String,
    pub destination: String,
    /// Tables to copy. `None` copies every table the source lists.
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    /// Destination columns that mark a row as updated, in order of preference.
    #[serde(default = "default_update_columns")]
    pub update_columns: Vec<String>,
    /// Tables copied at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_update_columns() -> Vec<String> {
    vec!["updated_at".to_string(), "created_at".to_string()]
}

fn default_concurrency() -> usize {
    1
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl SyncConfig {
    /// Parses a JSON config, expanding `${VAR}` placeholders in connection
    /// strings from `vars`.
    pub fn from_json(text: &str, vars: &HashMap<String, String>) -> Result<Self, SyncError> {
        let mut config: SyncConfig = serde_json::from_str(text)?;
        for (name, connection) in config.connections.iter_mut() {
            connection.connection_string = expand_vars(&connection.connection_string, vars)
                .map_err(|var| {
                    SyncError::Config(format!(
                        "connection \"{name}\" references undefined variable {var}"
                    ))
                })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(
        path: impl AsRef<Path>,
        vars: &HashMap<String, String>,
    ) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|err| {
            SyncError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded sync config");
        Self::from_json(&text, vars)
    }

    /// The two-connection Postgres setup built from `SOURCE` and `DESTINATION`.
    pub fn from_env(vars: &HashMap<String, String>) -> Result<Self, SyncError> {
        let lookup = |var: &str| {
            vars.get(var)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| SyncError::Config(format!("{var} is not set")))
        };

        let connections = BTreeMap::from([
            (
                "source".to_string(),
                ConnectionConfig::new("pg", &lookup(SOURCE_VAR)?),
            ),
            (
                "destination".to_string(),
                ConnectionConfig::new("pg", &lookup(DESTINATION_VAR)?),
            ),
        ]);

        Ok(SyncConfig {
            connections,
            source: "source".to_string(),
            destination: "destination".to_string(),
            tables: None,
            update_columns: default_update_columns(),
            concurrency: default_concurrency(),
            chunk_size: default_chunk_size(),
            primary_key: default_primary_key(),
            schema: default_schema(),
        })
    }

    fn validate(&self) -> Result<(), SyncError> {
        self.connection(&self.source)?;
        self.connection(&self.destination)?;
        if self.concurrency == 0 {
            return Err(SyncError::Config("concurrency must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(SyncError::Config("chunkSize must be at least 1".into()));
        }
        Ok(())
    }

    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig, SyncError> {
        self.connections
            .get(name)
            .ok_or_else(|| SyncError::UnknownConnection(name.to_string()))
    }

    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            chunk_size: self.chunk_size,
            primary_key: self.primary_key.clone(),
            schema: self.schema.clone(),
            ..ConnectorSettings::default()
        }
    }
}

/// Replaces every `${NAME}` in `input`. Returns the first undefined name
/// as the error.
pub fn expand_vars(input: &str, vars: &HashMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated; keep it verbatim.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = after[..end].trim();
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(name.to_string()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
