//! GraphQL over WebSocket, subscriptions-transport-ws dialect.
//!
//! One [`Client`] owns one connection. Operations created by
//! [`Client::execute_query`] share it:
//!
//! - The first operation polled sends `connection_init`; everyone waits for `connection_ack`
//! - Each operation gets its own id (`"1"`, `"2"`, ...) and receives only messages for it
//! - Dropping or cancelling an [`Operation`] sends `stop` for it
//!
//! # Example
//!
//! ```rust, no_run
//! use futures::StreamExt as _;
//! use graphql_subscriptions_client::graphql::{Client, Config, QueryPayload};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new("ws://localhost:4000/graphql", Config::default())?;
//!
//!     let payload = QueryPayload::builder()
//!         .query("subscription OnMessage { messageAdded { text } }")
//!         .operation_name("OnMessage")
//!         .build();
//!     let mut messages = client.execute(payload);
//!
//!     while let Some(response) = messages.next().await {
//!         println!("{:?}", response?.get("messageAdded"));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod handshake;
pub mod operation;
pub mod subscription;
pub mod types;

// Re-export commonly used types
pub use client::{Client, Config};
pub use handshake::ConnectionState;
pub use operation::{Operation, OperationHandle, OperationState};
pub use subscription::ProtocolParser;
pub use types::{DataPayload, GraphQLResponse, MessageType, OperationMessage, QueryPayload};
