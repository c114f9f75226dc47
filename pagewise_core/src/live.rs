//! Draining a live update stream into a controller.
//!
//! The transport-specific subscription stays with the caller: subscribe when a
//! session starts, hand the resulting stream to [`LiveFeed::spawn`], and stop the
//! feed when the controller is torn down.

use crate::controller::PaginationController;
use crate::entity::{Keyed, Patchable};
use crate::event::{EntityEvent, RawLiveEvent};
use crate::loader::PageLoader;
use futures_core::Stream;
use log::{debug, error};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// Errors surfaced when a live feed task ends abnormally.
#[derive(Debug, thiserror::Error)]
pub enum LiveFeedError {
    /// The draining task panicked.
    #[error("Live feed task panicked")]
    TaskPanicked,
}

/// Handle to a task applying a stream of live events to a controller, in delivery order.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct LiveFeed {
    handle: Option<JoinHandle<usize>>,
}

impl LiveFeed {
    /// Spawns a task applying decoded events.
    pub fn spawn<L, S>(controller: PaginationController<L>, events: S) -> Self
    where
        L: PageLoader + 'static,
        L::Item: Patchable,
        S: Stream<Item = EntityEvent<L::Item>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut events = Box::pin(events);
            let mut applied = 0;
            while let Some(event) = events.next().await {
                if controller.apply_event(event).is_applied() {
                    applied += 1;
                }
            }
            debug!("Live feed ended after {} applied event(s)", applied);
            applied
        });
        LiveFeed {
            handle: Some(handle),
        }
    }

    /// Spawns a task decoding and applying raw transport events. Malformed events are dropped.
    pub fn spawn_raw<L, S>(controller: PaginationController<L>, events: S) -> Self
    where
        L: PageLoader + 'static,
        L::Item: Patchable,
        <L::Item as Keyed>::Key: DeserializeOwned,
        <L::Item as Patchable>::Patch: DeserializeOwned,
        S: Stream<Item = RawLiveEvent> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut events = Box::pin(events);
            let mut applied = 0;
            while let Some(event) = events.next().await {
                if controller.apply_raw_event(event).is_applied() {
                    applied += 1;
                }
            }
            debug!("Raw live feed ended after {} applied event(s)", applied);
            applied
        });
        LiveFeed {
            handle: Some(handle),
        }
    }

    /// True once the stream ended or the task was stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the stream to end. Returns the number of events that changed the list.
    pub async fn join(mut self) -> Result<usize, LiveFeedError> {
        let Some(handle) = self.handle.take() else {
            return Ok(0);
        };
        handle.await.map_err(|err| {
            error!("Live feed task failed: {}", err);
            LiveFeedError::TaskPanicked
        })
    }

    /// Stops the feed. Events not yet applied are dropped.
    pub async fn stop(mut self) -> Result<(), LiveFeedError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.abort();
        match handle.await {
            Ok(_) => Ok(()),
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => {
                error!("Live feed task failed: {}", err);
                Err(LiveFeedError::TaskPanicked)
            }
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
