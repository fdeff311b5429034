#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Instant;

use async_stream::try_stream;
use backoff::backoff::Backoff as _;
use futures::stream::BoxStream;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use super::config::Config;
use super::error::WsError;
use super::traits::{MessageParser, Transport};
use crate::Result;
use crate::error::Error;
use crate::graphql::types::OperationMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// WebSocket sub-protocol spoken by subscriptions-transport-ws servers.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Waiting before another connection attempt
    Retrying {
        /// Number of failed attempts so far
        attempt: u32,
    },
    /// The connection is gone for good
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if the connection has terminated.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Manages the WebSocket connection lifecycle.
///
/// This connection manager handles all socket concerns:
/// - Establishing the connection, retrying with exponential backoff
/// - Queueing outbound frames sent before the socket is open
/// - Broadcasting parsed inbound messages to multiple subscribers
/// - Publishing [`ConnectionState`] changes
///
/// # Type Parameters
///
/// - `M`: Message type that implements [`DeserializeOwned`] among other "helper" types
/// - `P`: Parser type that implements [`MessageParser<M>`]
#[derive(Clone)]
pub struct ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Watch channel sender for state changes
    state_tx: watch::Sender<ConnectionState>,
    /// Sender channel for outgoing messages
    sender_tx: mpsc::UnboundedSender<String>,
    /// Broadcast sender for incoming messages
    broadcast_tx: broadcast::Sender<M>,
    /// Phantom data for unused type parameters
    _phantom: PhantomData<P>,
}

impl<M, P> ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Create a new connection manager and start the connection loop.
    ///
    /// The `parser` is used to deserialize incoming WebSocket messages. The connection
    /// loop runs in a background task, so this must be called within a tokio runtime.
    pub fn new(endpoint: String, config: Config, parser: P) -> Result<Self> {
        // Fail fast on endpoints that can never produce a request
        client_request(&endpoint)?;

        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);

        let broadcast_tx_clone = broadcast_tx.clone();
        let state_tx_clone = state_tx.clone();

        tokio::spawn(async move {
            Self::connection_loop(
                endpoint,
                config,
                sender_rx,
                broadcast_tx_clone,
                parser,
                state_tx_clone,
            )
            .await;
        });

        Ok(Self {
            state_tx,
            sender_tx,
            broadcast_tx,
            _phantom: PhantomData,
        })
    }

    /// Connect (with retries), then serve the connection until it ends.
    async fn connection_loop(
        endpoint: String,
        config: Config,
        mut sender_rx: mpsc::UnboundedReceiver<String>,
        broadcast_tx: broadcast::Sender<M>,
        parser: P,
        state_tx: watch::Sender<ConnectionState>,
    ) {
        let mut attempt = 0_u32;
        let mut backoff: backoff::ExponentialBackoff = config.connect.clone().into();

        loop {
            _ = state_tx.send_replace(ConnectionState::Connecting);

            let connected = match client_request(&endpoint) {
                Ok(request) => connect_async(request).await.map_err(Error::from),
                Err(e) => Err(e),
            };

            match connected {
                Ok((ws_stream, _)) => {
                    _ = state_tx.send_replace(ConnectionState::Connected {
                        since: Instant::now(),
                    });

                    if let Err(e) =
                        Self::handle_connection(ws_stream, &mut sender_rx, &broadcast_tx, &parser)
                            .await
                    {
                        #[cfg(feature = "tracing")]
                        tracing::error!("Error handling connection: {e:?}");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &e;
                    }

                    // A protocol session cannot survive a new socket
                    break;
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Unable to connect: {e:?}");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                    attempt = attempt.saturating_add(1);
                }
            }

            if let Some(max) = config.connect.max_attempts
                && attempt >= max
            {
                #[cfg(feature = "tracing")]
                tracing::error!(attempts = attempt, "Giving up on connecting");
                break;
            }

            _ = state_tx.send_replace(ConnectionState::Retrying { attempt });

            if let Some(duration) = backoff.next_backoff() {
                sleep(duration).await;
            }
        }

        _ = state_tx.send_replace(ConnectionState::Closed);
    }

    /// Handle an active WebSocket connection.
    async fn handle_connection(
        ws_stream: WsStream,
        sender_rx: &mut mpsc::UnboundedReceiver<String>,
        broadcast_tx: &broadcast::Sender<M>,
        parser: &P,
    ) -> Result<()> {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                // Handle incoming messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(%text, "Received WebSocket text message");

                            match parser.parse(text.as_bytes()) {
                                Ok(messages) => {
                                    for message in messages {
                                        #[cfg(feature = "tracing")]
                                        tracing::trace!(?message, "Parsed WebSocket message");
                                        _ = broadcast_tx.send(message);
                                    }
                                }
                                Err(e) => {
                                    #[cfg(feature = "tracing")]
                                    tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                                    #[cfg(not(feature = "tracing"))]
                                    let _ = (&text, &e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(WsError::ConnectionClosed.into());
                        }
                        Some(Err(e)) => {
                            return Err(WsError::Connection(e).into());
                        }
                        Some(Ok(_)) => {
                            // Ping/pong are answered by tungstenite; binary frames are not part of the protocol
                        }
                    }
                }

                // Handle outgoing messages
                outgoing = sender_rx.recv() => {
                    let Some(text) = outgoing else {
                        // Every handle to the manager is gone
                        break;
                    };
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%text, "Sending WebSocket text message");
                    write.send(Message::Text(text.into())).await?;
                }
            }
        }

        _ = write.send(Message::Close(None)).await;

        Ok(())
    }

    /// Serialize and queue a message for the server.
    pub fn send_json<R: Serialize>(&self, request: &R) -> Result<()> {
        let json = serde_json::to_string(request)?;
        self.sender_tx
            .send(json)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can
    /// receive messages concurrently without blocking each other.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.broadcast_tx.subscribe()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

impl<P> Transport for ConnectionManager<OperationMessage, P>
where
    P: MessageParser<OperationMessage>,
{
    fn send(&self, message: &OperationMessage) -> Result<()> {
        self.send_json(message)
    }

    fn receive(&self) -> BoxStream<'static, Result<OperationMessage>> {
        let mut rx = self.subscribe();
        let mut state_rx = self.state_receiver();

        let stream = try_stream! {
            loop {
                // Drain everything already broadcast before honoring a close
                let next = tokio::select! {
                    biased;
                    msg = rx.recv() => Some(msg),
                    _ = state_rx.wait_for(|state| state.is_closed()) => None,
                };

                match next {
                    Some(Ok(msg)) => yield msg,
                    Some(Err(RecvError::Lagged(n))) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Inbound stream lagged, missed {n} messages");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Some(Err(RecvError::Closed)) | None => {
                        Err(WsError::ConnectionClosed)?;
                    }
                }
            }
        };

        stream.boxed()
    }
}

/// Build the upgrade request, advertising the `graphql-ws` sub-protocol.
fn client_request(endpoint: &str) -> Result<Request> {
    let mut request = endpoint.into_client_request()?;
    request.headers_mut().insert(
        header::SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
    );
    Ok(request)
}
