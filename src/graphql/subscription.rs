#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types expose their domain in the name for clarity"
)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::handshake::{ConnectionState, Handshake};
use super::types::OperationMessage;
#[cfg(feature = "tracing")]
use super::types::MessageType;
use crate::Result;
use crate::error::ConnectionFailure;
use crate::ws::{MessageParser, Transport, WsError};

/// What a route receives: a message addressed to its id, or the connection's failure.
pub type RouteEvent = std::result::Result<OperationMessage, ConnectionFailure>;

/// Parser for subscriptions-transport-ws text frames: one JSON envelope per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolParser;

impl MessageParser<OperationMessage> for ProtocolParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<OperationMessage>> {
        let message: OperationMessage =
            serde_json::from_slice(bytes).map_err(|e| WsError::InvalidMessage(e.to_string()))?;

        #[cfg(feature = "tracing")]
        if message.message_type == MessageType::Unknown {
            tracing::warn!(
                id = ?message.id,
                frame = %String::from_utf8_lossy(bytes),
                "Received message of unknown type"
            );
        }

        Ok(vec![message])
    }
}

/// Routes the shared inbound stream to the operations running on one connection.
///
/// Holds the routing table (id → unbounded channel), the id counter and the
/// [`Handshake`]. A single reader task consumes [`Transport::receive`]; it is spawned by
/// the first [`SubscriptionManager::ensure_ready`] and stops when the manager is dropped.
pub struct SubscriptionManager {
    transport: Arc<dyn Transport>,
    handshake: Handshake,
    routes: DashMap<String, mpsc::UnboundedSender<RouteEvent>>,
    next_id: AtomicU64,
    connection_params: Option<Value>,
    shutdown: CancellationToken,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        ack_timeout: Duration,
        connection_params: Option<Value>,
    ) -> Self {
        Self {
            transport,
            handshake: Handshake::new(ack_timeout),
            routes: DashMap::new(),
            next_id: AtomicU64::new(1),
            connection_params,
            shutdown: CancellationToken::new(),
        }
    }

    /// Make sure the connection is acknowledged, starting the handshake if nobody has.
    pub async fn ensure_ready(self: &Arc<Self>) -> Result<()> {
        self.handshake.ensure_ready(|| self.start_session()).await
    }

    /// Attach the reader, then send `connection_init`.
    ///
    /// The inbound subscription is taken before the init frame is queued so the
    /// acknowledgment cannot be missed.
    fn start_session(self: &Arc<Self>) -> Result<()> {
        let inbound = self.transport.receive();
        let manager = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let ack_timeout = self.handshake.ack_timeout();

        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Subscription reader stopped");
                }
                () = Self::read_loop(manager, inbound, ack_timeout) => {}
            }
        });

        self.transport.send(&OperationMessage::connection_init(
            self.connection_params.clone(),
        ))
    }

    async fn read_loop(
        manager: Weak<Self>,
        mut inbound: BoxStream<'static, Result<OperationMessage>>,
        ack_timeout: Duration,
    ) {
        let first = tokio::time::timeout(ack_timeout, inbound.next()).await;

        let Some(this) = manager.upgrade() else {
            return;
        };
        match first {
            Err(_elapsed) => {
                this.fail_all(ConnectionFailure::HandshakeTimeout { after: ack_timeout });
                return;
            }
            Ok(Some(Ok(message))) => {
                this.handshake.observe(&message);
                if let ConnectionState::Failed(failure) = this.handshake.state() {
                    this.fail_all(failure);
                    return;
                }
            }
            Ok(Some(Err(e))) => {
                this.fail_all(ConnectionFailure::Transport {
                    reason: e.to_string(),
                });
                return;
            }
            Ok(None) => {
                this.fail_all(ConnectionFailure::Transport {
                    reason: "connection closed before acknowledgment".to_owned(),
                });
                return;
            }
        }
        drop(this);

        while let Some(next) = inbound.next().await {
            let Some(this) = manager.upgrade() else {
                return;
            };
            match next {
                Ok(message) => this.dispatch(message),
                Err(e) => {
                    this.fail_all(ConnectionFailure::Transport {
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }

        if let Some(this) = manager.upgrade() {
            this.fail_all(ConnectionFailure::Transport {
                reason: "connection closed".to_owned(),
            });
        }
    }

    /// Route one inbound message.
    ///
    /// Id-less messages belong to the handshake. Messages for a registered id go to that
    /// route only; `complete` and `error` remove the route as they are delivered. Messages
    /// for unknown ids are dropped.
    pub fn dispatch(&self, message: OperationMessage) {
        let Some(id) = message.id.clone() else {
            self.handshake.observe(&message);
            return;
        };

        if message.message_type.is_terminal() {
            match self.routes.remove(&id) {
                Some((_, route)) => {
                    _ = route.send(Ok(message));
                }
                None => Self::drop_unrouted(&id, &message),
            }
            return;
        }

        let delivered = match self.routes.get(&id) {
            Some(route) => route.send(Ok(message)).is_ok(),
            None => {
                Self::drop_unrouted(&id, &message);
                return;
            }
        };

        if !delivered {
            // Receiver went away without deregistering
            self.routes.remove(&id);
        }
    }

    fn drop_unrouted(id: &str, message: &OperationMessage) {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            id,
            message_type = %message.message_type,
            "Dropping message for unknown operation"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (id, message);
    }

    /// Poison the connection and hand the failure to every registered operation.
    fn fail_all(&self, failure: ConnectionFailure) {
        let failure = self.handshake.fail(failure);

        let ids: Vec<String> = self.routes.iter().map(|route| route.key().clone()).collect();
        for id in ids {
            if let Some((_, route)) = self.routes.remove(&id) {
                _ = route.send(Err(failure.clone()));
            }
        }
    }

    /// Allocate the next id and register its route.
    pub fn register(&self) -> (String, mpsc::UnboundedReceiver<RouteEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.insert(id.clone(), tx);

        #[cfg(feature = "tracing")]
        tracing::debug!(%id, "Registered operation");

        (id, rx)
    }

    pub fn deregister(&self, id: &str) {
        if self.routes.remove(id).is_some() {
            #[cfg(feature = "tracing")]
            tracing::debug!(%id, "Deregistered operation");
        }
    }

    pub fn send(&self, message: &OperationMessage) -> Result<()> {
        self.transport.send(message)
    }

    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.routes.len()
    }

    /// Ids of the registered operations, in ascending order.
    #[must_use]
    pub fn active_operations(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routes.iter().map(|route| route.key().clone()).collect();
        ids.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
        ids
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.handshake.state()
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
