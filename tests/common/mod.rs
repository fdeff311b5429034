#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream::{self, BoxStream};
use graphql_subscriptions_client::Result;
use graphql_subscriptions_client::graphql::{
    Client, Config, MessageType, OperationMessage,
};
use graphql_subscriptions_client::ws::{Transport, WsError};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tokio::time::timeout;

pub const ACK_TIMEOUT: Duration = Duration::from_secs(1);

type Responder = Box<dyn Fn(&OperationMessage) -> Vec<OperationMessage> + Send + Sync>;

#[derive(Clone, Debug)]
enum Inbound {
    Message(OperationMessage),
    Failure,
    Closed,
}

/// In-memory [`Transport`] that records what the client sends and answers through a
/// scripted responder.
pub struct MockTransport {
    sent: Mutex<Vec<OperationMessage>>,
    inbound: broadcast::Sender<Inbound>,
    responder: Responder,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&OperationMessage) -> Vec<OperationMessage> + Send + Sync + 'static,
    {
        let (inbound, _) = broadcast::channel(256);
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            inbound,
            responder: Box::new(responder),
        })
    }

    /// Never answers anything.
    pub fn silent() -> Arc<Self> {
        Self::new(|_| Vec::new())
    }

    /// Acknowledges `connection_init`, ignores everything else.
    pub fn acking() -> Arc<Self> {
        Self::new(|message| ack_init(message).unwrap_or_default())
    }

    /// Acknowledges `connection_init` and answers every `start` with `on_start(id)`.
    pub fn answering<F>(on_start: F) -> Arc<Self>
    where
        F: Fn(&str) -> Vec<OperationMessage> + Send + Sync + 'static,
    {
        Self::new(move |message| {
            if let Some(ack) = ack_init(message) {
                return ack;
            }
            match (message.message_type, message.id.as_deref()) {
                (MessageType::Start, Some(id)) => on_start(id),
                _ => Vec::new(),
            }
        })
    }

    /// Deliver a message as if the server sent it.
    pub fn push(&self, message: OperationMessage) {
        _ = self.inbound.send(Inbound::Message(message));
    }

    /// Make every inbound stream yield an error and end.
    pub fn fail(&self) {
        _ = self.inbound.send(Inbound::Failure);
    }

    /// End every inbound stream without an error.
    pub fn close(&self) {
        _ = self.inbound.send(Inbound::Closed);
    }

    pub fn sent(&self) -> Vec<OperationMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_types(&self) -> Vec<MessageType> {
        self.sent().iter().map(|message| message.message_type).collect()
    }

    /// Wait until at least `count` messages were sent.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<OperationMessage> {
        timeout(Duration::from_secs(2), async {
            loop {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }
}

impl Transport for MockTransport {
    fn send(&self, message: &OperationMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());

        for response in (self.responder)(message) {
            self.push(response);
        }
        Ok(())
    }

    fn receive(&self) -> BoxStream<'static, Result<OperationMessage>> {
        stream::unfold(Some(self.inbound.subscribe()), |rx| async move {
            let mut rx = rx?;
            match rx.recv().await {
                Ok(Inbound::Message(message)) => Some((Ok(message), Some(rx))),
                Ok(Inbound::Failure) => Some((Err(WsError::ConnectionClosed.into()), None)),
                Ok(Inbound::Closed) | Err(_) => None,
            }
        })
        .boxed()
    }
}

fn ack_init(message: &OperationMessage) -> Option<Vec<OperationMessage>> {
    (message.message_type == MessageType::ConnectionInit)
        .then(|| vec![OperationMessage::connection_ack()])
}

pub fn client(transport: &Arc<MockTransport>) -> Client {
    client_with(transport, Config::builder().ack_timeout(ACK_TIMEOUT).build())
}

pub fn client_with(transport: &Arc<MockTransport>, config: Config) -> Client {
    let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
    Client::with_transport(transport, config)
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// `data` message for `id` whose payload carries `data` and no errors.
pub fn data(id: &str, data: Value) -> OperationMessage {
    OperationMessage::new(
        MessageType::Data,
        Some(id.to_owned()),
        Some(json!({ "data": data, "errors": null })),
    )
}

pub fn test_data_a() -> Value {
    json!({ "a": 1, "b": "hello", "c": false })
}

pub fn test_data_b() -> Value {
    json!({ "a": 2, "b": null, "c": true })
}
