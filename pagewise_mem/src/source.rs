use async_trait::async_trait;
use pagewise_core::prelude::*;
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Decides whether an item belongs to the result set for the given parameters.
pub type Matcher<Q, T> = Arc<dyn Fn(&Q, &T) -> bool + Send + Sync>;

#[derive(Debug)]
struct SourceData<T> {
    items: Vec<T>,
    tokens: HashMap<PageToken, usize>,
    requests: Vec<PageRequest>,
    failures_remaining: u32,
}

/// An in-memory paged backend.
///
/// Pages are cut from the items matching the request parameters, in insertion
/// order. Every continuation is a fresh random token mapped to an offset, so
/// tokens are as opaque to callers as real backend cursors. Inserting at the
/// front shifts later offsets, which reproduces the overlapping pages a live
/// backend produces.
pub struct InMemoryPageSource<T, Q> {
    data: Arc<Mutex<SourceData<T>>>,
    matcher: Matcher<Q, T>,
    _phantom: PhantomData<fn(Q)>,
}

impl<T, Q> Clone for InMemoryPageSource<T, Q> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            matcher: Arc::clone(&self.matcher),
            _phantom: PhantomData,
        }
    }
}

impl<T, Q> Debug for InMemoryPageSource<T, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryPageSource").finish()
    }
}

impl<T, Q> InMemoryPageSource<T, Q>
where
    T: Clone + Send,
{
    /// Creates a source serving `items` regardless of parameters.
    pub fn new(items: Vec<T>) -> Self {
        log::debug!("Creating a new InMemoryPageSource with {} item(s)", items.len());
        Self {
            data: Arc::new(Mutex::new(SourceData {
                items,
                tokens: HashMap::new(),
                requests: Vec::new(),
                failures_remaining: 0,
            })),
            matcher: Arc::new(|_, _| true),
            _phantom: PhantomData,
        }
    }

    /// Only serves items for which `matcher(params, item)` holds.
    pub fn with_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&Q, &T) -> bool + Send + Sync + 'static,
    {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Adds an item ahead of every other, as a backend does for new activity.
    pub async fn push_front(&self, item: T) {
        self.data.lock().await.items.insert(0, item);
    }

    /// Appends an item.
    pub async fn push_back(&self, item: T) {
        self.data.lock().await.items.push(item);
    }

    /// Makes the next `count` loads fail with [`InMemoryPageSourceError::Unavailable`].
    pub async fn fail_next(&self, count: u32) {
        self.data.lock().await.failures_remaining = count;
    }

    /// Every request received so far, failed ones included.
    pub async fn requests(&self) -> Vec<PageRequest> {
        self.data.lock().await.requests.clone()
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.data.lock().await.requests.len()
    }
}

/// Errors returned by the [`InMemoryPageSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InMemoryPageSourceError {
    /// A failure injected with [`InMemoryPageSource::fail_next`].
    #[error("Page source unavailable")]
    Unavailable,
    /// The token wasn't issued by this source.
    #[error("Unknown page token {0}")]
    UnknownToken(PageToken),
    /// A page of zero items was requested.
    #[error("Page limit must be greater than zero")]
    InvalidLimit,
}

#[async_trait]
impl<T, Q> PageLoader for InMemoryPageSource<T, Q>
where
    T: Keyed + Clone + Send + Sync + 'static,
    Q: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Params = Q;
    type Item = T;
    type Error = InMemoryPageSourceError;

    async fn load_page(
        &self,
        params: &Self::Params,
        request: PageRequest,
    ) -> Result<Page<Self::Item>, Self::Error> {
        let mut data = self.data.lock().await;
        data.requests.push(request.clone());

        if data.failures_remaining > 0 {
            data.failures_remaining -= 1;
            log::debug!("InMemoryPageSource: injected failure for {:?}", request);
            return Err(InMemoryPageSourceError::Unavailable);
        }
        if request.limit == 0 {
            return Err(InMemoryPageSourceError::InvalidLimit);
        }

        let offset = match &request.page_token {
            None => 0,
            Some(token) => *data
                .tokens
                .get(token)
                .ok_or_else(|| InMemoryPageSourceError::UnknownToken(token.clone()))?,
        };

        let matching: Vec<&T> = data
            .items
            .iter()
            .filter(|item| (self.matcher)(params, *item))
            .collect();
        let total = matching.len();
        let items: Vec<T> = matching
            .into_iter()
            .skip(offset)
            .take(request.limit as usize)
            .cloned()
            .collect();

        let next_offset = offset + items.len();
        let next_page_token = if next_offset < total {
            let token = PageToken::new(Uuid::new_v4().to_string());
            data.tokens.insert(token.clone(), next_offset);
            Some(token)
        } else {
            None
        };

        log::debug!(
            "InMemoryPageSource: served {} item(s) from offset {} of {}",
            items.len(),
            offset,
            total
        );
        Ok(Page::new(items, next_page_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Creator {
        id: u32,
        name: &'static str,
    }

    impl Keyed for Creator {
        type Key = u32;
        fn key(&self) -> u32 {
            self.id
        }
    }

    fn creators() -> Vec<Creator> {
        vec![
            Creator { id: 1, name: "ana" },
            Creator { id: 2, name: "bob" },
            Creator { id: 3, name: "anton" },
            Creator { id: 4, name: "carl" },
            Creator { id: 5, name: "anya" },
        ]
    }

    fn ids(page: &Page<Creator>) -> Vec<u32> {
        page.items.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn pages_through_all_items() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());

        let first = source.load_page(&(), PageRequest::first(2)).await.unwrap();
        assert_eq!(ids(&first), vec![1, 2]);
        let token = first.next_page_token.clone().unwrap();

        let second = source.load_page(&(), PageRequest::after(token, 2)).await.unwrap();
        assert_eq!(ids(&second), vec![3, 4]);

        let third = source
            .load_page(&(), PageRequest::after(second.next_page_token.unwrap(), 2))
            .await
            .unwrap();
        assert_eq!(ids(&third), vec![5]);
        assert!(third.next_page_token.is_none());
        assert!(third.is_last());
    }

    #[tokio::test]
    async fn exact_fit_has_no_continuation() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        let page = source.load_page(&(), PageRequest::first(5)).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn matcher_filters_by_params() {
        let source = InMemoryPageSource::new(creators())
            .with_matcher(|query: &String, creator: &Creator| creator.name.starts_with(query.as_str()));
        let page = source
            .load_page(&"an".to_string(), PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn tokens_are_opaque_and_unique() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        let a = source.load_page(&(), PageRequest::first(1)).await.unwrap();
        let b = source.load_page(&(), PageRequest::first(1)).await.unwrap();
        assert_ne!(a.next_page_token, b.next_page_token);
        assert!(a.next_page_token.unwrap().as_str().parse::<usize>().is_err());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        let err = source
            .load_page(&(), PageRequest::after(PageToken::new("bogus"), 2))
            .await
            .unwrap_err();
        assert_eq!(err, InMemoryPageSourceError::UnknownToken(PageToken::new("bogus")));
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        let err = source.load_page(&(), PageRequest::first(0)).await.unwrap_err();
        assert_eq!(err, InMemoryPageSourceError::InvalidLimit);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        source.fail_next(1).await;
        assert_eq!(
            source.load_page(&(), PageRequest::first(2)).await.unwrap_err(),
            InMemoryPageSourceError::Unavailable
        );
        assert!(source.load_page(&(), PageRequest::first(2)).await.is_ok());
        assert_eq!(source.request_count().await, 2);
    }

    #[tokio::test]
    async fn push_front_shifts_later_pages() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        let first = source.load_page(&(), PageRequest::first(2)).await.unwrap();
        source.push_front(Creator { id: 9, name: "zed" }).await;
        let second = source
            .load_page(&(), PageRequest::after(first.next_page_token.unwrap(), 2))
            .await
            .unwrap();
        assert_eq!(ids(&second), vec![2, 3]);
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let source: InMemoryPageSource<Creator, ()> = InMemoryPageSource::new(creators());
        source.load_page(&(), PageRequest::first(3)).await.unwrap();
        assert_eq!(source.requests().await, vec![PageRequest::first(3)]);
    }
}
