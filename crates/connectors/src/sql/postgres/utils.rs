use crate::{events::EventSink, sql::base::error::ConnectorError};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_postgres::{
    Client, Config, Connection, NoTls, config::SslMode, tls::TlsStream,
};
use tracing::{error, warn};

pub async fn connect_client(url: &str, events: &EventSink) -> Result<Client, ConnectorError> {
    let config = url
        .parse::<Config>()
        .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
    let ssl_mode = config.get_ssl_mode();

    match ssl_mode {
        SslMode::Disable => connect_without_tls(config, events).await,
        SslMode::Require => connect_with_tls(config, events).await,
        SslMode::Prefer => match connect_with_tls(config.clone(), events).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                connect_without_tls(config, events).await
            }
        },
        _ => connect_with_tls(config, events).await,
    }
}

pub(crate) async fn connect_with_tls(config: Config, events: &EventSink) -> Result<Client, ConnectorError> {
    let connector = TlsConnector::builder().build()?;
    let tls = MakeTlsConnector::new(connector);
    let (client, connection) = config.connect(tls).await?;
    drive(connection, events.clone());
    Ok(client)
}

pub(crate) async fn connect_without_tls(config: Config, events: &EventSink) -> Result<Client, ConnectorError> {
    let (client, connection) = config.connect(NoTls).await?;
    drive(connection, events.clone());
    Ok(client)
}

/// Runs the connection's I/O on its own task. A transport failure there has
/// no caller to return to, so it is logged and published as an error event.
fn drive<S, T>(connection: Connection<S, T>, events: EventSink)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: TlsStream + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, connector = events.connector(), "Postgres connection error");
            events.error(&err, Some(json!({ "operation": "connection" })));
        }
    });
}
