use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to invalid input or configuration within graphql-subscriptions-client
    Validation,
    /// Internal error from dependencies, e.g. (de)serialization failures
    Internal,
    /// Error related to the underlying WebSocket transport
    WebSocket,
    /// The server did not acknowledge the connection in time
    Timeout,
    /// The server sent a message that violates the subscriptions-transport-ws protocol
    Protocol,
    /// The server reported an `error` for a single operation
    GraphQL,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }

    pub fn graphql<I: Into<String>, M: Into<String>>(id: I, message: M) -> Self {
        GraphQLError {
            id: id.into(),
            message: message.into(),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// An `error` message sent by the server for a single operation.
///
/// Only the operation it names is terminated; the connection and sibling
/// operations are unaffected.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQLError {
    /// Correlation id of the failed operation
    pub id: String,
    /// Message reported by the server
    pub message: String,
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation {} failed: {}", self.id, self.message)
    }
}

impl StdError for GraphQLError {}

/// A message the server should never have sent for a running operation.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedMessage {
    /// Correlation id of the affected operation
    pub id: String,
    /// The `type` of the offending message
    pub message_type: String,
}

impl fmt::Display for UnexpectedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected {} message for operation {}",
            self.message_type, self.id
        )
    }
}

impl StdError for UnexpectedMessage {}

/// Connection-level failure.
///
/// Stored in the connection state once it happens and handed to every current and
/// future operation of the same client, hence [`Clone`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// No `connection_ack` arrived within the configured timeout
    HandshakeTimeout {
        /// The timeout that elapsed
        after: Duration,
    },
    /// The first message on the connection was not `connection_ack`
    ProtocolViolation {
        /// The `type` of the message received instead
        received: String,
    },
    /// The socket failed or closed
    Transport {
        /// Description of the transport failure
        reason: String,
    },
}

impl ConnectionFailure {
    /// The [`Kind`] callers observe when this failure is surfaced as an [`Error`].
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::HandshakeTimeout { .. } => Kind::Timeout,
            Self::ProtocolViolation { .. } => Kind::Protocol,
            Self::Transport { .. } => Kind::WebSocket,
        }
    }
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandshakeTimeout { after } => {
                write!(f, "no connection acknowledgment received within {after:?}")
            }
            Self::ProtocolViolation { received } => write!(
                f,
                "unexpected message before acknowledgment: received {received}"
            ),
            Self::Transport { reason } => write!(f, "transport failure: {reason}"),
        }
    }
}

impl StdError for ConnectionFailure {}

impl From<ConnectionFailure> for Error {
    fn from(err: ConnectionFailure) -> Self {
        Error::with_source(err.kind(), err)
    }
}

impl From<GraphQLError> for Error {
    fn from(err: GraphQLError) -> Self {
        Error::with_source(Kind::GraphQL, err)
    }
}

impl From<UnexpectedMessage> for Error {
    fn from(err: UnexpectedMessage) -> Self {
        Error::with_source(Kind::Protocol, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}
