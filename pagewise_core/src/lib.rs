//! # Pagewise
//!
//! Incremental pagination over cursor-paged backends, with live merging of
//! out-of-band entity events into the loaded list.
//!
//! A [`PaginationController`] opens one [`PaginationSession`] per set of loading
//! parameters and grows it page by page through a [`PageLoader`]. Push
//! notifications are merged into the same list with
//! [`apply_event`](PaginationController::apply_event). Results of fetches issued
//! by a superseded session, or against a superseded cursor, are discarded.

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod cursor;
pub mod entity;
pub mod event;
pub mod live;
pub mod loader;
pub mod merge;
pub mod retry;
pub mod session;

pub use config::{DEFAULT_PAGE_SIZE, EntityComparator, EntityFilter, OrderingPolicy, SessionConfig};
pub use controller::{PaginationController, PaginationError, PaginationSnapshot};
pub use cursor::{Page, PageRequest, PageToken};
pub use entity::{Keyed, Patchable};
pub use event::{EntityEvent, LiveEvent, LiveEventDecodeError, LiveEventKind, RawLiveEvent};
pub use live::{LiveFeed, LiveFeedError};
pub use loader::PageLoader;
pub use merge::{IgnoreReason, MergeOutcome};
pub use retry::{RetryError, RetryPolicy, RetryingLoader};
pub use session::{FetchTicket, LoadOutcome, PaginationSession, SessionId, SkipReason};

pub mod prelude {
    //! The prelude module for the `pagewise` crates.
    pub use super::{
        EntityEvent, Keyed, LiveEvent, LiveEventKind, LiveFeed, LoadOutcome, MergeOutcome,
        OrderingPolicy, Page, PageLoader, PageRequest, PageToken, PaginationController,
        PaginationError, Patchable, RawLiveEvent, SessionConfig, SessionId,
    };
}
