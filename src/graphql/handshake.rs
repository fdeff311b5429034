use std::time::Duration;

use tokio::sync::watch;

use super::types::{MessageType, OperationMessage};
use crate::Result;
use crate::error::ConnectionFailure;

/// Protocol-level state of the connection, shared by every operation of a client.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No operation has asked for the connection yet
    NotStarted,
    /// `connection_init` was sent, waiting for the first inbound message
    HandshakeInFlight,
    /// The server acknowledged the connection
    Acked,
    /// The connection is unusable for the rest of the client's lifetime
    Failed(ConnectionFailure),
}

impl ConnectionState {
    /// Whether `ensure_ready` callers can stop waiting.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Acked | Self::Failed(_))
    }

    fn outcome(&self) -> Option<std::result::Result<(), ConnectionFailure>> {
        match self {
            Self::Acked => Some(Ok(())),
            Self::Failed(failure) => Some(Err(failure.clone())),
            Self::NotStarted | Self::HandshakeInFlight => None,
        }
    }
}

/// Owns the one `connection_init` / `connection_ack` exchange of a connection.
///
/// The state lives in a [`watch`] channel: transitions are atomic under its lock and
/// every waiter observes the outcome, whenever it subscribed.
#[derive(Debug)]
pub struct Handshake {
    state_tx: watch::Sender<ConnectionState>,
    ack_timeout: Duration,
}

impl Handshake {
    #[must_use]
    pub fn new(ack_timeout: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::NotStarted);
        Self {
            state_tx,
            ack_timeout,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Resolve once the connection is acknowledged, or fail with the stored failure.
    ///
    /// The first caller runs `start`, which must begin observing inbound messages and
    /// send `connection_init`. Concurrent and later callers only wait; `start` never
    /// runs twice for the same handshake.
    pub async fn ensure_ready<F>(&self, start: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.begin() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Starting connection handshake");

            if let Err(e) = start() {
                self.fail(ConnectionFailure::Transport {
                    reason: e.to_string(),
                });
            }
        }

        self.wait().await
    }

    /// `NotStarted → HandshakeInFlight`. Returns whether this caller won the transition.
    fn begin(&self) -> bool {
        let mut won = false;
        self.state_tx.send_if_modified(|state| {
            if matches!(state, ConnectionState::NotStarted) {
                *state = ConnectionState::HandshakeInFlight;
                won = true;
            }
            won
        });
        won
    }

    async fn wait(&self) -> Result<()> {
        let mut state_rx = self.state_tx.subscribe();
        let outcome = state_rx
            .wait_for(ConnectionState::is_settled)
            .await
            .ok()
            .and_then(|state| state.outcome());

        match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(failure)) => Err(failure.into()),
            None => Err(ConnectionFailure::Transport {
                reason: "connection state dropped".to_owned(),
            }
            .into()),
        }
    }

    /// Feed a connection-level message to the handshake.
    ///
    /// While the handshake is in flight this is the first message of the connection:
    /// `connection_ack` settles it, anything else is a protocol violation. Afterwards
    /// only id-less messages arrive here and none of them change the state.
    pub fn observe(&self, message: &OperationMessage) {
        self.state_tx.send_if_modified(|state| match state {
            ConnectionState::HandshakeInFlight => {
                if message.message_type == MessageType::ConnectionAck {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Connection acknowledged");
                    *state = ConnectionState::Acked;
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        message_type = %message.message_type,
                        "Unexpected message before acknowledgment"
                    );
                    *state = ConnectionState::Failed(ConnectionFailure::ProtocolViolation {
                        received: message.message_type.to_string(),
                    });
                }
                true
            }
            ConnectionState::Acked if message.message_type == MessageType::ConnectionAck => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Ignoring repeated connection acknowledgment");
                false
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    message_type = %message.message_type,
                    "Dropping connection-level message"
                );
                false
            }
        });
    }

    /// Poison the connection. Returns the failure now stored, which is the earlier one
    /// if the connection had already failed.
    pub fn fail(&self, failure: ConnectionFailure) -> ConnectionFailure {
        let mut stored = failure;
        self.state_tx.send_if_modified(|state| {
            if let ConnectionState::Failed(existing) = state {
                stored = existing.clone();
                false
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(failure = %stored, "Connection failed");
                *state = ConnectionState::Failed(stored.clone());
                true
            }
        });
        stored
    }
}
