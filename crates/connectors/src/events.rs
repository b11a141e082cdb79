use model::events::{ConnectorEvent, LogLevel};
use std::fmt::Display;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Publishing side of a connector's event channel.
///
/// A sink without a sender drops every event, so connectors work the same
/// with or without an observer.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    connector: String,
    sender: Option<UnboundedSender<ConnectorEvent>>,
}

impl EventSink {
    pub fn detached(connector: &str) -> Self {
        EventSink {
            connector: connector.to_string(),
            sender: None,
        }
    }

    pub fn attached(connector: &str, sender: UnboundedSender<ConnectorEvent>) -> Self {
        EventSink {
            connector: connector.to_string(),
            sender: Some(sender),
        }
    }

    /// A sink plus the receiver that observes it.
    pub fn channel(connector: &str) -> (Self, UnboundedReceiver<ConnectorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::attached(connector, tx), rx)
    }

    pub fn connector(&self) -> &str {
        &self.connector
    }

    pub fn log(&self, message: impl Into<String>, level: LogLevel, data: Option<serde_json::Value>) {
        self.publish(ConnectorEvent::Log {
            connector: self.connector.clone(),
            message: message.into(),
            level,
            data,
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(message, LogLevel::Info, None);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(message, LogLevel::Debug, None);
    }

    pub fn error(&self, error: &dyn Display, context: Option<serde_json::Value>) {
        self.publish(ConnectorEvent::Error {
            connector: self.connector.clone(),
            error: error.to_string(),
            context,
        });
    }

    fn publish(&self, event: ConnectorEvent) {
        if let Some(sender) = &self.sender {
            // A dropped observer is not the connector's problem.
            let _ = sender.send(event);
        }
    }
}
