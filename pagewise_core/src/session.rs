//! The pagination session state machine.
//!
//! A [`PaginationSession`] holds the accumulated state for one set of loading
//! parameters. It is purely synchronous: a fetch is split into
//! [`begin_fetch`](PaginationSession::begin_fetch), which hands out a
//! [`FetchTicket`], and [`complete_fetch`](PaginationSession::complete_fetch) /
//! [`fail_fetch`](PaginationSession::fail_fetch), which only take effect while
//! the ticket is still current.

use crate::cursor::{Page, PageToken};
use crate::entity::Keyed;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ops::Range;

/// Identity of a pagination session. Assigned monotonically by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw session number.
    pub fn new(raw: u64) -> Self {
        SessionId(raw)
    }

    /// The raw session number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The state captured when a fetch is issued.
///
/// A result is applied only if both the session and the cursor it was issued
/// against are still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    session_id: SessionId,
    cursor: Option<PageToken>,
    page_size: u32,
}

impl FetchTicket {
    /// The session that issued the fetch.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The cursor the fetch resumes from.
    pub fn cursor(&self) -> Option<&PageToken> {
        self.cursor.as_ref()
    }

    /// The requested page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

/// Why `load_more` didn't issue a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A fetch for this session is already in flight.
    Loading,
    /// The backend has no more pages for this session.
    Exhausted,
}

/// Result of a `load_more` call that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was appended to the session.
    Applied {
        /// Items appended.
        appended: usize,
        /// Items dropped because their key was already loaded.
        duplicates: usize,
        /// Whether this page was the last one.
        exhausted: bool,
    },
    /// No fetch was issued.
    Skipped(SkipReason),
    /// The fetch resolved after its session or cursor was superseded; the result was discarded.
    Stale,
}

/// Accumulated state for one set of loading parameters.
#[derive(Debug, Clone)]
pub struct PaginationSession<P, T>
where
    T: Keyed,
{
    pub(crate) id: SessionId,
    pub(crate) params: P,
    pub(crate) items: Vec<T>,
    /// Position of every loaded entity in `items`.
    pub(crate) index: HashMap<T::Key, usize>,
    pub(crate) cursor: Option<PageToken>,
    pub(crate) exhausted: bool,
    pub(crate) loading: bool,
    pub(crate) initialized: bool,
    pub(crate) started_at: DateTime<Utc>,
}

impl<P, T> PaginationSession<P, T>
where
    T: Keyed,
{
    /// Opens an empty session.
    pub fn new(id: SessionId, params: P) -> Self {
        PaginationSession {
            id,
            params,
            items: Vec::new(),
            index: HashMap::new(),
            cursor: None,
            exhausted: false,
            loading: false,
            initialized: false,
            started_at: Utc::now(),
        }
    }

    /// The session identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The parameters this session was opened for.
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Loaded and live-merged items, in display order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no item is loaded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The cursor the next fetch resumes from.
    pub fn cursor(&self) -> Option<&PageToken> {
        self.cursor.as_ref()
    }

    /// True once the backend returned its last page.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// `!exhausted`.
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    /// True while a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True once the first fetch completed, successfully or not.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// When the session was opened.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether an entity with this key is loaded.
    pub fn contains(&self, key: &T::Key) -> bool {
        self.index.contains_key(key)
    }

    /// Index of the entity with this key.
    pub fn position(&self, key: &T::Key) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Refreshes the recorded positions of `items[range]` after they moved.
    pub(crate) fn reindex(&mut self, range: Range<usize>) {
        let start = range.start;
        for (offset, item) in self.items[range].iter().enumerate() {
            self.index.insert(item.key(), start + offset);
        }
    }

    /// Issues a fetch.
    ///
    /// The first fetch always proceeds with no cursor. Afterwards a fetch is refused
    /// while another one is in flight or once the session is exhausted.
    pub fn begin_fetch(&mut self, page_size: u32) -> Result<FetchTicket, SkipReason> {
        if self.loading {
            return Err(SkipReason::Loading);
        }
        if self.initialized && self.exhausted {
            return Err(SkipReason::Exhausted);
        }
        self.loading = true;
        Ok(FetchTicket {
            session_id: self.id,
            cursor: self.cursor.clone(),
            page_size,
        })
    }

    /// Whether a result for `ticket` may still be applied.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.session_id == self.id && ticket.cursor == self.cursor
    }

    /// Applies a fetched page if `ticket` is still current.
    ///
    /// Items whose key is already loaded are dropped; the first occurrence wins.
    pub fn complete_fetch(&mut self, ticket: &FetchTicket, page: Page<T>) -> LoadOutcome {
        if !self.is_current(ticket) {
            debug!(
                "Discarding page issued by {} at cursor {:?}; {} is at cursor {:?}",
                ticket.session_id, ticket.cursor, self.id, self.cursor
            );
            return LoadOutcome::Stale;
        }

        let exhausted = page.is_last();
        let next_cursor = if exhausted {
            None
        } else {
            page.continuation().cloned()
        };

        let mut appended = 0;
        let mut duplicates = 0;
        for item in page.items {
            match self.index.entry(item.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(self.items.len());
                    self.items.push(item);
                    appended += 1;
                }
                Entry::Occupied(_) => duplicates += 1,
            }
        }
        if duplicates > 0 {
            debug!("{} dropped {} duplicate item(s) from page", self.id, duplicates);
        }

        self.cursor = next_cursor;
        self.exhausted = exhausted;
        self.loading = false;
        self.initialized = true;

        LoadOutcome::Applied {
            appended,
            duplicates,
            exhausted,
        }
    }

    /// Records a failed fetch. Returns `false` when the ticket was stale and nothing changed.
    ///
    /// Items, cursor and exhaustion are left untouched so the same page can be retried.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.loading = false;
        self.initialized = true;
        true
    }

    /// Releases the loading flag of a fetch whose caller went away before it resolved.
    pub fn abandon_fetch(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_current(ticket) || !self.loading {
            return false;
        }
        self.loading = false;
        true
    }
}
