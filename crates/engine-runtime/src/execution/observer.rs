use model::events::{ConnectorEvent, LogLevel};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Re-emits a connector event through `tracing` as `[connector] message`.
pub fn record(event: &ConnectorEvent) {
    match event {
        ConnectorEvent::Log {
            connector,
            message,
            level,
            data,
        } => {
            let data = data.as_ref().map(|d| d.to_string()).unwrap_or_default();
            match level {
                LogLevel::Debug => debug!(data = %data, "[{connector}] {message}"),
                LogLevel::Info => info!("[{connector}] {message}"),
                LogLevel::Warn => warn!(data = %data, "[{connector}] {message}"),
                LogLevel::Error => error!(data = %data, "[{connector}] {message}"),
            }
        }
        ConnectorEvent::Error {
            connector,
            error,
            context,
        } => {
            let context = context.as_ref().map(|c| c.to_string()).unwrap_or_default();
            error!(context = %context, "[{connector}] {error}");
        }
    }
}

/// Drains `events` until every sender is dropped. Resolves to the number of
/// events seen.
pub fn spawn(mut events: UnboundedReceiver<ConnectorEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seen = 0;
        while let Some(event) = events.recv().await {
            record(&event);
            seen += 1;
        }
        seen
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::events::EventSink;
    use serde_json::json;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_events_become_log_lines() {
        record(&ConnectorEvent::Log {
            connector: "source".into(),
            message: "got 2/4 records from users".into(),
            level: LogLevel::Info,
            data: None,
        });
        record(&ConnectorEvent::Error {
            connector: "destination".into(),
            error: "relation \"ghost\" is broken".into(),
            context: Some(json!({ "table": "ghost" })),
        });

        assert!(logs_contain("[source] got 2/4 records from users"));
        assert!(logs_contain("[destination] relation \"ghost\" is broken"));
    }

    #[tokio::test]
    async fn test_spawn_drains_until_senders_drop() {
        let (sink, rx) = EventSink::channel("source");
        let handle = spawn(rx);

        let copy = sink.clone();
        sink.info("one");
        copy.debug("two");
        copy.error(&"three", None);
        drop(sink);
        drop(copy);

        assert_eq!(handle.await.unwrap(), 3);
    }
}
