//! The consumer-facing pagination controller.
//!
//! A [`PaginationController`] owns at most one [`PaginationSession`] at a time.
//! Rendering code reads `data`, `loading`, `has_more` and `initial_load_done`,
//! calls [`load_more`](PaginationController::load_more), and re-reads whenever
//! the revision published by [`subscribe`](PaginationController::subscribe) moves.
//! Push handlers forward live events into
//! [`apply_event`](PaginationController::apply_event).
//!
//! State sits behind a synchronous mutex that is never held across an `.await`,
//! so every mutation (page applied, event merged, session replaced) is atomic
//! with respect to the others. `load_more` only suspends on the page loader.

use crate::config::SessionConfig;
use crate::cursor::PageRequest;
use crate::entity::{Keyed, Patchable};
use crate::event::{EntityEvent, RawLiveEvent};
use crate::loader::PageLoader;
use crate::merge::{IgnoreReason, MergeOutcome};
use crate::session::{FetchTicket, LoadOutcome, PaginationSession, SessionId};
use futures::future::{AbortHandle, Abortable};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Errors returned by [`PaginationController::load_more`].
#[derive(Debug, thiserror::Error)]
pub enum PaginationError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The page loader rejected the request. The session is unchanged and may be retried.
    #[error("Page load failed: {0}")]
    Load(#[source] E),
    /// `load_more` was called before `start`, or after `teardown`.
    #[error("No pagination session has been started")]
    NotStarted,
}

/// A consistent view of everything rendering code reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationSnapshot<T> {
    /// The active session, if any.
    pub session_id: Option<SessionId>,
    /// Accumulated, deduplicated, ordered items.
    pub data: Vec<T>,
    /// A fetch is in flight.
    pub loading: bool,
    /// More pages can be loaded.
    pub has_more: bool,
    /// The first page completed, successfully or not.
    pub initial_load_done: bool,
}

type SessionOf<L> = PaginationSession<<L as PageLoader>::Params, <L as PageLoader>::Item>;

struct ControllerState<L: PageLoader> {
    session: Option<SessionOf<L>>,
    last_session: u64,
    in_flight: Option<(SessionId, AbortHandle)>,
}

impl<L: PageLoader> ControllerState<L> {
    fn clear_in_flight(&mut self, session_id: SessionId) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|(owner, _)| *owner == session_id)
        {
            self.in_flight = None;
        }
    }

    fn current_mut(&mut self, session_id: SessionId) -> Option<&mut SessionOf<L>> {
        self.session
            .as_mut()
            .filter(|session| session.id() == session_id)
    }
}

/// Paginated, live-merged view over a [`PageLoader`].
///
/// Cloning the controller is cheap and every clone drives the same sessions.
pub struct PaginationController<L: PageLoader> {
    loader: Arc<L>,
    config: SessionConfig<L::Params, L::Item>,
    state: Arc<Mutex<ControllerState<L>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl<L: PageLoader> Clone for PaginationController<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl<L: PageLoader> std::fmt::Debug for PaginationController<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationController")
            .field("config", &self.config)
            .field("session_id", &self.session_id())
            .finish()
    }
}

impl<L: PageLoader> PaginationController<L> {
    /// Creates a controller with no active session.
    pub fn new(loader: L, config: SessionConfig<L::Params, L::Item>) -> Self {
        Self::with_shared_loader(Arc::new(loader), config)
    }

    /// Creates a controller over a loader shared with other code.
    pub fn with_shared_loader(loader: Arc<L>, config: SessionConfig<L::Params, L::Item>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            loader,
            config,
            state: Arc::new(Mutex::new(ControllerState {
                session: None,
                last_session: 0,
                in_flight: None,
            })),
            revision: Arc::new(revision),
        }
    }

    /// The configuration applied to every session.
    pub fn config(&self) -> &SessionConfig<L::Params, L::Item> {
        &self.config
    }

    /// The page loader.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState<L>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn release_in_flight(&self, state: &mut ControllerState<L>) {
        if let Some((owner, handle)) = state.in_flight.take() {
            if self.config.abort_on_restart {
                debug!("Aborting outstanding fetch of {}", owner);
                handle.abort();
            }
        }
    }

    fn open_session(&self, state: &mut ControllerState<L>, params: L::Params) -> SessionId {
        self.release_in_flight(state);
        state.last_session += 1;
        let id = SessionId::new(state.last_session);
        debug!("Starting {} with params {:?}", id, params);
        if let Some(previous) = state.session.replace(PaginationSession::new(id, params)) {
            debug!("{} superseded by {}", previous.id(), id);
        }
        id
    }

    /// Opens a new session for `params`, discarding the current one.
    ///
    /// The swap happens before this returns: results of fetches issued by the old
    /// session and events arriving afterwards can no longer reach its state.
    pub fn start(&self, params: L::Params) -> SessionId {
        let id = {
            let mut state = self.lock();
            self.open_session(&mut state, params)
        };
        self.notify();
        id
    }

    /// Opens a new session only if `params` differ from the active session's.
    pub fn set_params(&self, params: L::Params) -> Option<SessionId> {
        let id = {
            let mut state = self.lock();
            if state
                .session
                .as_ref()
                .is_some_and(|session| *session.params() == params)
            {
                return None;
            }
            self.open_session(&mut state, params)
        };
        self.notify();
        Some(id)
    }

    /// Drops the active session. Outstanding fetches become stale.
    pub fn teardown(&self) {
        let previous = {
            let mut state = self.lock();
            self.release_in_flight(&mut state);
            state.session.take()
        };
        if let Some(previous) = previous {
            debug!("Tore down {}", previous.id());
            self.notify();
        }
    }

    /// Loads the next page using the configured page size.
    pub async fn load_more(&self) -> Result<LoadOutcome, PaginationError<L::Error>> {
        self.load_more_with(self.config.page_size).await
    }

    /// Loads the next page of `page_size` items.
    ///
    /// Resolves immediately with [`LoadOutcome::Skipped`] while another fetch is in
    /// flight or once the session is exhausted. The page is applied only if the
    /// session and its cursor are unchanged when the loader answers; otherwise the
    /// call resolves with [`LoadOutcome::Stale`].
    pub async fn load_more_with(
        &self,
        page_size: u32,
    ) -> Result<LoadOutcome, PaginationError<L::Error>> {
        let (ticket, params, registration) = {
            let mut state = self.lock();
            let session = state.session.as_mut().ok_or(PaginationError::NotStarted)?;
            let ticket = match session.begin_fetch(page_size) {
                Ok(ticket) => ticket,
                Err(reason) => {
                    debug!("{} skipped load_more: {:?}", session.id(), reason);
                    return Ok(LoadOutcome::Skipped(reason));
                }
            };
            let params = session.params().clone();
            let (handle, registration) = AbortHandle::new_pair();
            state.in_flight = Some((ticket.session_id(), handle));
            (ticket, params, registration)
        };
        self.notify();

        let guard = FetchGuard {
            controller: self,
            ticket: Some(ticket.clone()),
        };
        let request = PageRequest {
            page_token: ticket.cursor().cloned(),
            limit: page_size,
        };
        debug!(
            "{} fetching {} item(s) at cursor {:?}",
            ticket.session_id(),
            page_size,
            request.page_token
        );
        let result = Abortable::new(self.loader.load_page(&params, request), registration).await;
        guard.disarm();

        let resolved = {
            let mut state = self.lock();
            state.clear_in_flight(ticket.session_id());
            state.current_mut(ticket.session_id()).map(|session| match result {
                Ok(Ok(page)) => Ok(session.complete_fetch(&ticket, page)),
                Ok(Err(err)) if session.is_current(&ticket) => {
                    session.fail_fetch(&ticket);
                    Err(err)
                }
                Ok(Err(_)) => Ok(LoadOutcome::Stale),
                Err(_aborted) => {
                    session.abandon_fetch(&ticket);
                    Ok(LoadOutcome::Stale)
                }
            })
        };

        match resolved {
            None | Some(Ok(LoadOutcome::Stale)) => {
                debug!(
                    "Discarded stale result of {} at cursor {:?}",
                    ticket.session_id(),
                    ticket.cursor()
                );
                Ok(LoadOutcome::Stale)
            }
            Some(Ok(outcome)) => {
                debug!("{} applied page: {:?}", ticket.session_id(), outcome);
                self.notify();
                Ok(outcome)
            }
            Some(Err(err)) => {
                debug!("{} page load failed: {}", ticket.session_id(), err);
                self.notify();
                Err(PaginationError::Load(err))
            }
        }
    }

    /// The accumulated items of the active session.
    pub fn data(&self) -> Vec<L::Item> {
        self.with_data(<[L::Item]>::to_vec)
    }

    /// Runs `f` over the accumulated items without cloning them.
    pub fn with_data<R>(&self, f: impl FnOnce(&[L::Item]) -> R) -> R {
        let state = self.lock();
        f(state
            .session
            .as_ref()
            .map(PaginationSession::items)
            .unwrap_or(&[]))
    }

    /// A fetch is in flight.
    pub fn loading(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(PaginationSession::is_loading)
    }

    /// More pages can be loaded. `false` when no session is active.
    pub fn has_more(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(PaginationSession::has_more)
    }

    /// The first page of the active session completed, successfully or not.
    pub fn initial_load_done(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(PaginationSession::is_initialized)
    }

    /// The active session.
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().session.as_ref().map(PaginationSession::id)
    }

    /// The parameters of the active session.
    pub fn params(&self) -> Option<L::Params> {
        self.lock()
            .session
            .as_ref()
            .map(|session| session.params().clone())
    }

    /// Reads every public field under one lock.
    pub fn snapshot(&self) -> PaginationSnapshot<L::Item> {
        let state = self.lock();
        match state.session.as_ref() {
            Some(session) => PaginationSnapshot {
                session_id: Some(session.id()),
                data: session.items().to_vec(),
                loading: session.is_loading(),
                has_more: session.has_more(),
                initial_load_done: session.is_initialized(),
            },
            None => PaginationSnapshot {
                session_id: None,
                data: Vec::new(),
                loading: false,
                has_more: false,
                initial_load_done: false,
            },
        }
    }

    /// A revision counter that moves on every visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl<L> PaginationController<L>
where
    L: PageLoader,
    L::Item: Patchable,
{
    /// Merges a live event into the active session. Never fails; see [`MergeOutcome`].
    pub fn apply_event(&self, event: EntityEvent<L::Item>) -> MergeOutcome {
        let outcome = {
            let mut state = self.lock();
            match state.session.as_mut() {
                Some(session) => session.apply_event(event, &self.config),
                None => MergeOutcome::Ignored(IgnoreReason::NoSession),
            }
        };
        if outcome.is_applied() {
            self.notify();
        }
        outcome
    }

    /// Decodes and merges an event straight from the push transport.
    ///
    /// Malformed events are logged and dropped.
    pub fn apply_raw_event(&self, event: RawLiveEvent) -> MergeOutcome
    where
        <L::Item as Keyed>::Key: DeserializeOwned,
        <L::Item as Patchable>::Patch: DeserializeOwned,
    {
        match event.decode() {
            Ok(event) => self.apply_event(event),
            Err(err) => {
                warn!("Dropping malformed live event: {}", err);
                MergeOutcome::Ignored(IgnoreReason::Malformed)
            }
        }
    }
}

/// Releases the loading flag when a `load_more` future is dropped before the loader answers.
struct FetchGuard<'a, L: PageLoader> {
    controller: &'a PaginationController<L>,
    ticket: Option<FetchTicket>,
}

impl<L: PageLoader> FetchGuard<'_, L> {
    fn disarm(mut self) {
        self.ticket = None;
    }
}

impl<L: PageLoader> Drop for FetchGuard<'_, L> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let released = {
            let mut state = self.controller.lock();
            state.clear_in_flight(ticket.session_id());
            state
                .current_mut(ticket.session_id())
                .is_some_and(|session| session.abandon_fetch(&ticket))
        };
        if released {
            debug!("{} fetch abandoned by its caller", ticket.session_id());
            self.controller.notify();
        }
    }
}
