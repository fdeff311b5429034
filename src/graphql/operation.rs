#![expect(
    clippy::module_name_repetitions,
    reason = "Operation types expose their domain in the name for clarity"
)]

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_stream::try_stream;
use futures::Stream;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use super::subscription::{RouteEvent, SubscriptionManager};
use super::types::{GraphQLResponse, MessageType, OperationMessage, QueryPayload};
use crate::Result;
use crate::error::{Error, UnexpectedMessage};

/// Lifecycle of a single operation.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Created, `start` not sent yet
    AwaitingStart,
    /// `start` sent, results may arrive
    Active,
    /// The server sent `complete`
    Completed,
    /// The operation failed
    Errored,
    /// The caller cancelled the operation
    Cancelled,
}

impl OperationState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

#[derive(Debug)]
struct Slot {
    id: Option<String>,
    state: OperationState,
}

/// State shared between the stream driving an operation and the handles controlling it.
///
/// The slot lock serializes sending `start` with cancelling, so `stop` can never reach
/// the server before `start`.
struct Lifecycle {
    manager: Arc<SubscriptionManager>,
    slot: Mutex<Slot>,
}

impl Lifecycle {
    fn new(manager: Arc<SubscriptionManager>) -> Self {
        Self {
            manager,
            slot: Mutex::new(Slot {
                id: None,
                state: OperationState::AwaitingStart,
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> OperationState {
        self.slot().state
    }

    fn id(&self) -> Option<String> {
        self.slot().id.clone()
    }

    /// Allocate an id and register the route. `None` if cancelled before the first poll.
    fn register(&self) -> Option<(String, mpsc::UnboundedReceiver<RouteEvent>)> {
        let mut slot = self.slot();
        if slot.state != OperationState::AwaitingStart || slot.id.is_some() {
            return None;
        }

        let (id, routed) = self.manager.register();
        slot.id = Some(id.clone());
        Some((id, routed))
    }

    /// Send `start`. Returns `false` if the operation was cancelled in the meantime.
    fn start(&self, id: &str, payload: &QueryPayload) -> Result<bool> {
        let mut slot = self.slot();
        if slot.state != OperationState::AwaitingStart {
            return Ok(false);
        }

        let sent = OperationMessage::start(id, payload).and_then(|start| self.manager.send(&start));
        match sent {
            Ok(()) => {
                slot.state = OperationState::Active;
                Ok(true)
            }
            Err(e) => {
                slot.state = OperationState::Errored;
                self.manager.deregister(id);
                Err(e)
            }
        }
    }

    /// Move to a terminal state without notifying the server.
    fn finish(&self, terminal: OperationState) {
        let mut slot = self.slot();
        if slot.state.is_terminal() {
            return;
        }

        slot.state = terminal;
        if let Some(id) = &slot.id {
            self.manager.deregister(id);
        }
    }

    /// Fail on a client-side problem, telling the server to stop if it was started.
    fn abort(&self) {
        self.terminate(OperationState::Errored);
    }

    fn cancel(&self) {
        self.terminate(OperationState::Cancelled);
    }

    fn terminate(&self, terminal: OperationState) {
        let mut slot = self.slot();
        let was_active = match slot.state {
            OperationState::Active => true,
            OperationState::AwaitingStart => false,
            _ => return,
        };
        slot.state = terminal;

        let Some(id) = slot.id.clone() else {
            return;
        };
        if was_active {
            #[cfg(feature = "tracing")]
            tracing::debug!(%id, state = ?terminal, "Stopping operation");

            if let Err(e) = self.manager.send(&OperationMessage::stop(id.as_str())) {
                #[cfg(feature = "tracing")]
                tracing::warn!(%id, "Unable to send stop: {e}");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        }
        self.manager.deregister(&id);
    }
}

/// A running GraphQL operation: a stream of results for one query or subscription.
///
/// Nothing is sent until the stream is first polled. The stream ends after `complete`,
/// after the first error, or once [`Operation::cancel`] has been called. Dropping it
/// cancels the operation.
pub struct Operation {
    lifecycle: Arc<Lifecycle>,
    stream: Option<BoxStream<'static, Result<GraphQLResponse>>>,
}

impl Operation {
    pub(crate) fn new(manager: Arc<SubscriptionManager>, payload: QueryPayload) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(manager));
        let stream = Self::drive(Arc::clone(&lifecycle), payload);

        Self {
            lifecycle,
            stream: Some(stream),
        }
    }

    fn drive(
        lifecycle: Arc<Lifecycle>,
        payload: QueryPayload,
    ) -> BoxStream<'static, Result<GraphQLResponse>> {
        let stream = try_stream! {
            if let Some((id, mut routed)) = lifecycle.register() {
                lifecycle
                    .manager
                    .ensure_ready()
                    .await
                    .inspect_err(|_| lifecycle.finish(OperationState::Errored))?;

                if lifecycle.start(&id, &payload)? {
                    while let Some(event) = routed.recv().await {
                        let message = event
                            .inspect_err(|_| lifecycle.finish(OperationState::Errored))
                            .map_err(Error::from)?;

                        match message.message_type {
                            MessageType::Data => {
                                let response = message
                                    .as_data_payload()
                                    .map(GraphQLResponse::from)
                                    .inspect_err(|_| lifecycle.abort())?;
                                yield response;
                            }
                            MessageType::Error => {
                                lifecycle.finish(OperationState::Errored);
                                Err(Error::graphql(id.as_str(), message.as_error_message()))?;
                            }
                            MessageType::Complete => {
                                lifecycle.finish(OperationState::Completed);
                                break;
                            }
                            other => {
                                lifecycle.abort();
                                Err(UnexpectedMessage {
                                    id: id.clone(),
                                    message_type: other.to_string(),
                                })?;
                            }
                        }
                    }
                }
            }
        };

        stream.boxed()
    }

    /// Correlation id, assigned when the stream is first polled.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.lifecycle.id()
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.lifecycle.state()
    }

    /// Cancel the operation. Sends `stop` if it is running; calling it again does nothing.
    pub fn cancel(&self) {
        self.lifecycle.cancel();
    }

    /// A handle that can cancel this operation from elsewhere, e.g. after the stream has
    /// been moved into a combinator.
    #[must_use]
    pub fn handle(&self) -> OperationHandle {
        OperationHandle {
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl Stream for Operation {
    type Item = Result<GraphQLResponse>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.lifecycle.state() == OperationState::Cancelled {
            self.stream = None;
            return Poll::Ready(None);
        }

        let Some(stream) = self.stream.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = stream.poll_next_unpin(cx);
        if matches!(polled, Poll::Ready(None)) {
            self.stream = None;
        }
        polled
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Cloneable control handle for an [`Operation`].
#[derive(Clone)]
pub struct OperationHandle {
    lifecycle: Arc<Lifecycle>,
}

impl OperationHandle {
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.lifecycle.id()
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.lifecycle.state()
    }

    pub fn cancel(&self) {
        self.lifecycle.cancel();
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
