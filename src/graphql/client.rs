use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use serde_json::{Map, Value};
#[cfg(feature = "ws")]
use url::Url;

use super::handshake::ConnectionState;
use super::operation::Operation;
#[cfg(feature = "ws")]
use super::subscription::ProtocolParser;
use super::subscription::SubscriptionManager;
#[cfg(feature = "ws")]
use super::types::OperationMessage;
use super::types::QueryPayload;
#[cfg(feature = "ws")]
use crate::Result;
#[cfg(feature = "ws")]
use crate::error::Error;
use crate::ws::Transport;
#[cfg(feature = "ws")]
use crate::ws::{ConnectionManager, config::Config as TransportConfig};

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// GraphQL client speaking the subscriptions-transport-ws protocol over one websocket.
///
/// Every operation shares the same connection and the same `connection_init` handshake,
/// which happens when the first operation is polled. A failed handshake or a lost
/// connection is permanent: every current and later operation fails with it.
///
/// # Examples
///
/// ```rust, no_run
/// use futures::StreamExt as _;
/// use graphql_subscriptions_client::graphql::{Client, Config};
/// use serde_json::Map;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("ws://localhost:4000/graphql", Config::default())?;
///
///     let mut ticks = client
///         .execute_query("subscription { tick { count } }", Map::new())
///         .take(3);
///
///     while let Some(response) = ticks.next().await {
///         println!("{:?}", response?.data);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Config,
    /// Routing table, id counter and handshake shared by all operations
    subscriptions: Arc<SubscriptionManager>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for a `ws://` or `wss://` endpoint.
    ///
    /// The socket is opened in the background right away; the protocol handshake waits for
    /// the first operation. Must be called within a tokio runtime.
    #[cfg(feature = "ws")]
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let url = Url::parse(endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "unsupported endpoint scheme `{}`, expected ws or wss",
                url.scheme()
            )));
        }

        let connection = ConnectionManager::<OperationMessage, ProtocolParser>::new(
            endpoint.to_owned(),
            config.transport.clone(),
            ProtocolParser,
        )?;

        Ok(Self::with_transport(Arc::new(connection), config))
    }

    /// Create a client over any [`Transport`].
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: Config) -> Self {
        let subscriptions = Arc::new(SubscriptionManager::new(
            transport,
            config.ack_timeout,
            config.connection_params.clone(),
        ));

        Self {
            inner: Arc::new(ClientInner {
                config,
                subscriptions,
            }),
        }
    }

    /// Run `query` with `variables`.
    ///
    /// The returned stream is lazy: the operation gets its id and `start` is sent when it
    /// is first polled. Each call creates an independent operation.
    pub fn execute_query<Q: Into<String>>(&self, query: Q, variables: Map<String, Value>) -> Operation {
        self.execute(QueryPayload::new(query, variables))
    }

    /// Run a fully specified operation, including its name and extensions.
    pub fn execute(&self, payload: QueryPayload) -> Operation {
        #[cfg(feature = "tracing")]
        tracing::debug!(operation_name = ?payload.operation_name, "Executing operation");

        Operation::new(Arc::clone(&self.inner.subscriptions), payload)
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.subscriptions.connection_state()
    }

    /// Number of operations currently registered for routing.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.inner.subscriptions.operation_count()
    }

    /// Ids of the operations currently registered for routing.
    #[must_use]
    pub fn active_operations(&self) -> Vec<String> {
        self.inner.subscriptions.active_operations()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

/// Configuration for [`Client`]
#[derive(Clone, Debug, Builder)]
pub struct Config {
    /// How long to wait for `connection_ack` after `connection_init`. The default is ten (10)
    /// seconds.
    #[builder(default = DEFAULT_ACK_TIMEOUT)]
    ack_timeout: Duration,
    /// Payload of `connection_init`, typically authentication parameters.
    connection_params: Option<Value>,
    #[cfg(feature = "ws")]
    #[builder(default)]
    transport: TransportConfig,
}

impl Config {
    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    #[must_use]
    pub const fn connection_params(&self) -> Option<&Value> {
        self.connection_params.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_ack_timeout_is_ten_seconds() {
        let config = Config::default();

        assert_eq!(config.ack_timeout(), Duration::from_secs(10));
        assert!(config.connection_params().is_none(), "no init payload by default");
    }

    #[test]
    fn builder_overrides() {
        let config = Config::builder()
            .ack_timeout(Duration::from_millis(250))
            .connection_params(json!({"authToken": "secret"}))
            .build();

        assert_eq!(config.ack_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.connection_params(),
            Some(&json!({"authToken": "secret"}))
        );
    }

    #[cfg(feature = "ws")]
    #[tokio::test]
    async fn new_rejects_non_websocket_scheme() {
        let error = Client::new("http://localhost:4000/graphql", Config::default()).unwrap_err();

        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }

    #[cfg(feature = "ws")]
    #[tokio::test]
    async fn new_rejects_malformed_endpoint() {
        let error = Client::new("not a url", Config::default()).unwrap_err();

        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }
}
