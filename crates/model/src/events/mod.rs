use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to a connector log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Something a connector wants an observer to know about.
///
/// Connectors never write logs themselves; they publish these and whoever
/// holds the receiving end decides what to do with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectorEvent {
    Log {
        connector: String,
        message: String,
        level: LogLevel,
        data: Option<serde_json::Value>,
    },
    Error {
        connector: String,
        error: String,
        context: Option<serde_json::Value>,
    },
}

impl ConnectorEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ConnectorEvent::Log { .. } => "connector.log",
            ConnectorEvent::Error { .. } => "connector.error",
        }
    }

    pub fn connector(&self) -> &str {
        match self {
            ConnectorEvent::Log { connector, .. } | ConnectorEvent::Error { connector, .. } => {
                connector
            }
        }
    }
}
