//! Core traits for the WebSocket transport.

use futures::stream::BoxStream;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::graphql::types::OperationMessage;

/// Message parser trait for converting raw frames to messages.
///
/// # Example
///
/// ```ignore
/// pub struct SimpleParser;
///
/// impl MessageParser<MyMessage> for SimpleParser {
///     fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<MyMessage>> {
///         let msg: MyMessage = serde_json::from_slice(bytes)?;
///         Ok(vec![msg])
///     }
/// }
/// ```
pub trait MessageParser<M: DeserializeOwned>: Send + Sync + 'static {
    /// Parse incoming bytes into messages.
    ///
    /// May return an empty vec if the frame carries nothing of interest.
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<M>>;
}

/// A reliable, ordered, duplex channel carrying [`OperationMessage`]s.
///
/// Implementations must preserve send order and deliver inbound messages in the order
/// they arrived. Every call to [`Transport::receive`] attaches a new subscriber to the
/// same hot inbound source: messages emitted before the call are not replayed.
pub trait Transport: Send + Sync + 'static {
    /// Queue a message for sending. Does not wait for the frame to be written.
    fn send(&self, message: &OperationMessage) -> Result<()>;

    /// Subscribe to inbound messages.
    ///
    /// The stream yields an error and ends once the connection is lost; it never ends on
    /// its own while the connection is open.
    fn receive(&self) -> BoxStream<'static, Result<OperationMessage>>;
}
