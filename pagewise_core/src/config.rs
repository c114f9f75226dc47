//! Per-session configuration.

use std::cmp::Ordering;
use std::sync::Arc;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Comparator used by [`OrderingPolicy::Sorted`].
pub type EntityComparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Predicate deciding whether a live-created entity belongs to a session,
/// given the session parameters (for example "belongs to my conversations").
pub type EntityFilter<P, T> = Arc<dyn Fn(&P, &T) -> bool + Send + Sync>;

/// The ordering contract of a session's item list, as seen by live merges.
///
/// Loaded pages always keep backend order. The policy only decides where
/// live-created entities go and whether activity moves an entity to the front.
pub enum OrderingPolicy<T> {
    /// Backend order is authoritative. Live updates never move rows and
    /// live-created entities are prepended.
    Stable,
    /// Most-recent-first. Entities with new activity move to the front and
    /// live-created entities are prepended.
    RecencyFirst,
    /// Items are sorted by the comparator. Live-created entities are inserted
    /// at their sort position (after equal elements); updates never move rows.
    /// The backend must return pages in the same order.
    Sorted(EntityComparator<T>),
}

impl<T> OrderingPolicy<T> {
    /// Builds a [`OrderingPolicy::Sorted`] policy.
    pub fn sorted_by<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        OrderingPolicy::Sorted(Arc::new(compare))
    }

    /// True for [`OrderingPolicy::RecencyFirst`].
    pub fn is_recency_first(&self) -> bool {
        matches!(self, OrderingPolicy::RecencyFirst)
    }
}

impl<T> Default for OrderingPolicy<T> {
    fn default() -> Self {
        OrderingPolicy::Stable
    }
}

impl<T> Clone for OrderingPolicy<T> {
    fn clone(&self) -> Self {
        match self {
            OrderingPolicy::Stable => OrderingPolicy::Stable,
            OrderingPolicy::RecencyFirst => OrderingPolicy::RecencyFirst,
            OrderingPolicy::Sorted(compare) => OrderingPolicy::Sorted(Arc::clone(compare)),
        }
    }
}

impl<T> std::fmt::Debug for OrderingPolicy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderingPolicy::Stable => f.write_str("Stable"),
            OrderingPolicy::RecencyFirst => f.write_str("RecencyFirst"),
            OrderingPolicy::Sorted(_) => f.write_str("Sorted(<comparator>)"),
        }
    }
}

/// Configuration of a [`PaginationController`](crate::controller::PaginationController).
///
/// Applies to every session the controller opens.
pub struct SessionConfig<P, T> {
    /// Number of items requested per `load_more`.
    pub page_size: u32,

    /// Ordering contract used by the live merge layer.
    pub ordering: OrderingPolicy<T>,

    /// Filter for live-created entities. `None` accepts everything.
    pub filter: Option<EntityFilter<P, T>>,

    /// Abort the outstanding fetch of a session when it is replaced or torn down.
    ///
    /// Stale results are discarded either way; aborting only stops waiting on them.
    ///
    /// Default: `true`
    pub abort_on_restart: bool,
}

impl<P, T> SessionConfig<P, T> {
    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the ordering policy.
    pub fn with_ordering(mut self, ordering: OrderingPolicy<T>) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets the live-created entity filter.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&P, &T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Lets superseded fetches run to completion instead of aborting them.
    pub fn without_abort_on_restart(mut self) -> Self {
        self.abort_on_restart = false;
        self
    }

    /// Whether `item` passes the filter for a session opened with `params`.
    pub fn accepts(&self, params: &P, item: &T) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(params, item))
    }
}

impl<P, T> Default for SessionConfig<P, T> {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            ordering: OrderingPolicy::default(),
            filter: None,
            abort_on_restart: true,
        }
    }
}

impl<P, T> Clone for SessionConfig<P, T> {
    fn clone(&self) -> Self {
        Self {
            page_size: self.page_size,
            ordering: self.ordering.clone(),
            filter: self.filter.clone(),
            abort_on_restart: self.abort_on_restart,
        }
    }
}

impl<P, T> std::fmt::Debug for SessionConfig<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("page_size", &self.page_size)
            .field("ordering", &self.ordering)
            .field("filter", &self.filter.as_ref().map(|_| "Some(<filter>)"))
            .field("abort_on_restart", &self.abort_on_restart)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: SessionConfig<(), u32> = SessionConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(matches!(config.ordering, OrderingPolicy::Stable));
        assert!(config.filter.is_none());
        assert!(config.abort_on_restart);
    }

    #[test]
    fn builder_methods() {
        let config: SessionConfig<u32, u32> = SessionConfig::default()
            .with_page_size(5)
            .with_ordering(OrderingPolicy::RecencyFirst)
            .with_filter(|min, item| item >= min)
            .without_abort_on_restart();
        assert_eq!(config.page_size, 5);
        assert!(config.ordering.is_recency_first());
        assert!(!config.abort_on_restart);
        assert!(config.accepts(&3, &4));
        assert!(!config.accepts(&3, &2));
    }

    #[test]
    fn no_filter_accepts_everything() {
        let config: SessionConfig<(), u32> = SessionConfig::default();
        assert!(config.accepts(&(), &0));
    }

    #[test]
    fn debug_hides_closures() {
        let config: SessionConfig<(), u32> = SessionConfig::default()
            .with_ordering(OrderingPolicy::sorted_by(|a: &u32, b: &u32| a.cmp(b)))
            .with_filter(|_, _| true);
        let debug = format!("{config:?}");
        assert!(debug.contains("Sorted(<comparator>)"));
        assert!(debug.contains("Some(<filter>)"));
    }
}
