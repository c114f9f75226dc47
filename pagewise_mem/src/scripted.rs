use async_trait::async_trait;
use pagewise_core::prelude::*;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};

/// A page request parked inside a [`ScriptedPageLoader`], waiting for the test
/// to decide its result.
#[derive(Debug)]
pub struct PendingLoad<T, Q> {
    params: Q,
    request: PageRequest,
    responder: oneshot::Sender<Result<Page<T>, ScriptedPageLoaderError>>,
}

impl<T, Q> PendingLoad<T, Q> {
    /// Parameters the load was issued with.
    pub fn params(&self) -> &Q {
        &self.params
    }

    /// The request as sent by the controller.
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    /// Completes the load with `page`. Returns `false` when the caller has
    /// already gone away, e.g. because its fetch was aborted.
    pub fn resolve(self, page: Page<T>) -> bool {
        self.responder.send(Ok(page)).is_ok()
    }

    /// Fails the load with `message`. Returns `false` when the caller has gone away.
    pub fn fail(self, message: impl Into<String>) -> bool {
        self.responder
            .send(Err(ScriptedPageLoaderError::Failed(message.into())))
            .is_ok()
    }
}

/// Errors returned by the [`ScriptedPageLoader`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptedPageLoaderError {
    /// The test failed the load explicitly.
    #[error("Scripted failure: {0}")]
    Failed(String),
    /// The [`PendingLoad`] was dropped without an answer.
    #[error("Pending load dropped without a response")]
    Dropped,
    /// Nobody is listening for loads anymore.
    #[error("Scripted loader closed")]
    Closed,
}

/// A loader whose every call parks until the test resolves it.
///
/// Lets tests interleave fetch completions with restarts, live events and
/// other fetches in an exact order.
pub struct ScriptedPageLoader<T, Q> {
    sender: mpsc::UnboundedSender<PendingLoad<T, Q>>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<PendingLoad<T, Q>>>>,
}

impl<T, Q> Clone for ScriptedPageLoader<T, Q> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: Arc::clone(&self.receiver),
        }
    }
}

impl<T, Q> Debug for ScriptedPageLoader<T, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedPageLoader").finish()
    }
}

impl<T, Q> Default for ScriptedPageLoader<T, Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Q> ScriptedPageLoader<T, Q> {
    /// Creates a loader with no parked loads.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Waits for the next load issued against this loader.
    pub async fn next_load(&self) -> Option<PendingLoad<T, Q>> {
        self.receiver.lock().await.recv().await
    }

    /// Returns the next parked load if one has already been issued.
    pub async fn try_next_load(&self) -> Option<PendingLoad<T, Q>> {
        self.receiver.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl<T, Q> PageLoader for ScriptedPageLoader<T, Q>
where
    T: Keyed + Clone + Send + Sync + 'static,
    Q: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Params = Q;
    type Item = T;
    type Error = ScriptedPageLoaderError;

    async fn load_page(
        &self,
        params: &Self::Params,
        request: PageRequest,
    ) -> Result<Page<Self::Item>, Self::Error> {
        let (responder, response) = oneshot::channel();
        log::debug!("ScriptedPageLoader: parking {:?}", request);
        self.sender
            .send(PendingLoad {
                params: params.clone(),
                request,
                responder,
            })
            .map_err(|_| ScriptedPageLoaderError::Closed)?;
        response
            .await
            .map_err(|_| ScriptedPageLoaderError::Dropped)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u32);

    impl Keyed for Item {
        type Key = u32;
        fn key(&self) -> u32 {
            self.0
        }
    }

    #[tokio::test]
    async fn resolves_parked_loads() {
        let loader: ScriptedPageLoader<Item, &'static str> = ScriptedPageLoader::new();
        let call = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_page(&"q", PageRequest::first(2)).await })
        };

        let pending = loader.next_load().await.unwrap();
        assert_eq!(*pending.params(), "q");
        assert_eq!(pending.request(), &PageRequest::first(2));
        assert!(pending.resolve(Page::last(vec![Item(1)])));

        let page = call.await.unwrap().unwrap();
        assert_eq!(page.items, vec![Item(1)]);
    }

    #[tokio::test]
    async fn failures_reach_the_caller() {
        let loader: ScriptedPageLoader<Item, ()> = ScriptedPageLoader::new();
        let call = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_page(&(), PageRequest::first(2)).await })
        };

        loader.next_load().await.unwrap().fail("boom");
        assert_eq!(
            call.await.unwrap().unwrap_err(),
            ScriptedPageLoaderError::Failed("boom".to_string())
        );
    }

    #[tokio::test]
    async fn dropping_a_pending_load_errors() {
        let loader: ScriptedPageLoader<Item, ()> = ScriptedPageLoader::new();
        let call = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_page(&(), PageRequest::first(2)).await })
        };

        drop(loader.next_load().await.unwrap());
        assert_eq!(
            call.await.unwrap().unwrap_err(),
            ScriptedPageLoaderError::Dropped
        );
    }

    #[tokio::test]
    async fn resolve_reports_a_gone_caller() {
        let loader: ScriptedPageLoader<Item, ()> = ScriptedPageLoader::new();
        let call = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_page(&(), PageRequest::first(2)).await })
        };

        let pending = loader.next_load().await.unwrap();
        call.abort();
        let _ = call.await;
        assert!(!pending.resolve(Page::last(vec![])));
    }

    #[tokio::test]
    async fn try_next_load_is_empty_without_calls() {
        let loader: ScriptedPageLoader<Item, ()> = ScriptedPageLoader::new();
        assert!(loader.try_next_load().await.is_none());
    }
}
