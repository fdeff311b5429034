use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use super::request::QueryPayload;
use super::response::DataPayload;
use crate::Result;
use crate::serde_helpers::decode_payload;

/// Message types of the subscriptions-transport-ws protocol.
///
/// Any other `type` deserializes as [`MessageType::Unknown`] so the frame can still be
/// routed and reported as a protocol violation.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    /// Client → server, opens the protocol session
    ConnectionInit,
    /// Server → client, accepts the protocol session
    ConnectionAck,
    /// Client → server, starts an operation
    Start,
    /// Server → client, one result of an operation
    Data,
    /// Server → client, the operation failed
    Error,
    /// Server → client, the operation finished
    Complete,
    /// Client → server, cancels an operation
    Stop,
    /// Any `type` outside the protocol
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Whether a message of this type ends the operation it is addressed to.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Complete)
    }
}

/// Envelope for every frame exchanged over the connection.
///
/// `payload` is kept as raw JSON; its shape depends on `message_type` and is
/// decoded through the typed accessors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Correlation id, `None` for connection-level messages
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl OperationMessage {
    #[must_use]
    pub fn new(message_type: MessageType, id: Option<String>, payload: Option<Value>) -> Self {
        Self {
            message_type,
            id,
            payload,
        }
    }

    /// `connection_init`, optionally carrying connection parameters.
    #[must_use]
    pub fn connection_init(params: Option<Value>) -> Self {
        Self::new(MessageType::ConnectionInit, None, params)
    }

    #[must_use]
    pub fn connection_ack() -> Self {
        Self::new(MessageType::ConnectionAck, None, None)
    }

    pub fn start<S: Into<String>>(id: S, payload: &QueryPayload) -> Result<Self> {
        let payload = serde_json::to_value(payload)?;
        Ok(Self::new(MessageType::Start, Some(id.into()), Some(payload)))
    }

    pub fn data<S: Into<String>>(id: S, payload: &DataPayload) -> Result<Self> {
        let payload = serde_json::to_value(payload)?;
        Ok(Self::new(MessageType::Data, Some(id.into()), Some(payload)))
    }

    #[must_use]
    pub fn error<S: Into<String>, M: Into<String>>(id: S, message: M) -> Self {
        Self::new(
            MessageType::Error,
            Some(id.into()),
            Some(Value::String(message.into())),
        )
    }

    #[must_use]
    pub fn complete<S: Into<String>>(id: S) -> Self {
        Self::new(MessageType::Complete, Some(id.into()), None)
    }

    #[must_use]
    pub fn stop<S: Into<String>>(id: S) -> Self {
        Self::new(MessageType::Stop, Some(id.into()), None)
    }

    /// Decode the payload of a `data` message.
    pub fn as_data_payload(&self) -> Result<DataPayload> {
        decode_payload(self.id.as_deref(), self.payload.as_ref())
    }

    /// Text of an `error` message payload.
    ///
    /// Servers are expected to send a plain string; anything else is rendered as JSON.
    #[must_use]
    pub fn as_error_message(&self) -> String {
        match &self.payload {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Decode a single text frame.
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode into a single text frame.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
