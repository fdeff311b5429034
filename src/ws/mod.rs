//! WebSocket transport infrastructure.
//!
//! The GraphQL client only talks to the socket through the [`Transport`] trait, so any
//! ordered duplex channel can carry the protocol. With the `ws` feature enabled this
//! module also provides [`ConnectionManager`], a `tokio-tungstenite` implementation.
//!
//! # Architecture
//!
//! - [`Transport`]: send frames, receive a hot stream of inbound frames
//! - [`MessageParser`]: Trait for parsing incoming WebSocket messages
//! - [`ConnectionManager`]: Generic WebSocket connection handler with connect retries
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(endpoint, config, ProtocolParser)?;
//! let client = graphql::Client::with_transport(Arc::new(connection), graphql::Config::default());
//! ```

#[cfg(feature = "ws")]
pub mod config;
#[cfg(feature = "ws")]
pub mod connection;
pub mod error;
pub mod traits;

#[cfg(feature = "ws")]
pub use connection::ConnectionManager;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
