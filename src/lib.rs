//! Client for GraphQL over WebSocket using the subscriptions-transport-ws protocol
//! (sub-protocol `graphql-ws`).
//!
//! Queries, mutations and subscriptions run as independent [`graphql::Operation`] streams
//! multiplexed over a single connection. See [`graphql::Client`] to get started.
//!
//! # Features
//!
//! - `ws` (default): [`ws::ConnectionManager`], a `tokio-tungstenite` transport
//! - `tracing`: structured logs for the handshake, routing and decoding

pub mod error;
pub mod graphql;
pub(crate) mod serde_helpers;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
