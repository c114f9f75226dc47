//! The page loading collaborator.

use crate::cursor::{Page, PageRequest};
use crate::entity::Keyed;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A paged backend endpoint.
///
/// Implementations own transport concerns, timeouts included. From the engine's
/// point of view a call either resolves with a page or rejects with `Self::Error`,
/// which is handed back to the caller of `load_more` unchanged.
#[async_trait]
pub trait PageLoader: Send + Sync {
    /// Loading parameters (search query, filter, role, room id...). A change of
    /// parameters opens a new pagination session.
    type Params: Clone + PartialEq + Debug + Send + Sync + 'static;
    /// The entities returned by this loader.
    type Item: Keyed + Clone + Send + Sync + 'static;
    /// The error returned when a page can't be loaded.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads the page described by `request` for the given parameters.
    async fn load_page(
        &self,
        params: &Self::Params,
        request: PageRequest,
    ) -> Result<Page<Self::Item>, Self::Error>;
}

#[async_trait]
impl<L> PageLoader for Arc<L>
where
    L: PageLoader + ?Sized,
{
    type Params = L::Params;
    type Item = L::Item;
    type Error = L::Error;

    async fn load_page(
        &self,
        params: &Self::Params,
        request: PageRequest,
    ) -> Result<Page<Self::Item>, Self::Error> {
        (**self).load_page(params, request).await
    }
}
