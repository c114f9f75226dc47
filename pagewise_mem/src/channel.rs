use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// An in-memory live update channel.
///
/// Publishers push events; a single subscriber takes the receiving side as a
/// stream, typically to hand it to a [`LiveFeed`](pagewise_core::LiveFeed).
#[derive(Debug)]
pub struct InMemoryEventChannel<E> {
    sender: mpsc::UnboundedSender<E>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<E>>>,
}

impl<E> Default for InMemoryEventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors returned by the [`InMemoryEventChannel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryEventChannelError {
    /// The subscriber stream has been dropped.
    #[error("Event channel closed")]
    Closed,
}

impl<E> InMemoryEventChannel<E> {
    /// Creates an open channel.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Publishes an event to the subscriber.
    pub fn publish(&self, event: E) -> Result<(), InMemoryEventChannelError> {
        self.sender
            .send(event)
            .map_err(|_| InMemoryEventChannelError::Closed)
    }

    /// Takes the receiving side as a stream. Only the first call gets it.
    pub fn subscribe(&self) -> Option<UnboundedReceiverStream<E>> {
        self.receiver
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .map(UnboundedReceiverStream::new)
    }

    /// Ends the stream once already published events have been consumed.
    pub fn close(self) {
        log::debug!("Closing InMemoryEventChannel");
    }
}
