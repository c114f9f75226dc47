//! Live merge: applying out-of-band entity events to a loaded session.

use crate::config::{OrderingPolicy, SessionConfig};
use crate::entity::Patchable;
use crate::event::{LiveEvent, LiveEventKind};
use crate::session::PaginationSession;
use log::{debug, warn};
use std::cmp::Ordering;

/// Why a live event left the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No session is active.
    NoSession,
    /// The first page hasn't completed; the entity will arrive with it if relevant.
    NotInitialized,
    /// A `changed` event for an entity that isn't loaded.
    NotLoaded,
    /// The session filter rejected the created entity.
    FilteredOut,
    /// A `created` payload lacks fields needed to build the entity.
    Incomplete,
    /// A `created` payload describes a different entity than the event key.
    KeyMismatch,
    /// The event couldn't be decoded.
    Malformed,
}

/// What a live event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The entity was patched in place.
    Updated {
        /// Its (unchanged) index.
        index: usize,
    },
    /// The entity was patched and moved to the front.
    Promoted {
        /// The index it was moved from.
        from: usize,
    },
    /// A new entity was inserted.
    Inserted {
        /// The index it was inserted at.
        index: usize,
    },
    /// Nothing changed.
    Ignored(IgnoreReason),
}

impl MergeOutcome {
    /// True when the session changed.
    pub fn is_applied(&self) -> bool {
        !matches!(self, MergeOutcome::Ignored(_))
    }
}

impl<P, T> PaginationSession<P, T>
where
    T: Patchable,
{
    /// Applies a live event.
    ///
    /// A loaded entity is patched in place, and moved to the front when the event
    /// bumps recency on a recency-first session. An unknown entity is inserted only
    /// for `created` events that pass the session filter once the first page is in.
    /// Cursor and exhaustion are never touched; a later page re-delivering an
    /// inserted entity is deduplicated on append.
    pub fn apply_event(
        &mut self,
        event: LiveEvent<T::Key, T::Patch>,
        config: &SessionConfig<P, T>,
    ) -> MergeOutcome {
        let LiveEvent {
            entity_key,
            kind,
            payload,
            bumps_recency,
        } = event;

        if let Some(index) = self.position(&entity_key) {
            self.items[index].apply_patch(payload);
            if bumps_recency && config.ordering.is_recency_first() {
                if index > 0 {
                    let item = self.items.remove(index);
                    self.items.insert(0, item);
                    self.reindex(0..index + 1);
                }
                debug!("{} promoted {:?} from index {}", self.id, entity_key, index);
                return MergeOutcome::Promoted { from: index };
            }
            debug!("{} updated {:?} at index {}", self.id, entity_key, index);
            return MergeOutcome::Updated { index };
        }

        if !self.initialized {
            return MergeOutcome::Ignored(IgnoreReason::NotInitialized);
        }
        if kind == LiveEventKind::Changed {
            return MergeOutcome::Ignored(IgnoreReason::NotLoaded);
        }

        let Some(item) = T::from_patch(payload) else {
            warn!(
                "Dropping created event for {:?}: payload is missing required fields",
                entity_key
            );
            return MergeOutcome::Ignored(IgnoreReason::Incomplete);
        };
        if item.key() != entity_key {
            warn!(
                "Dropping created event for {:?}: payload describes {:?}",
                entity_key,
                item.key()
            );
            return MergeOutcome::Ignored(IgnoreReason::KeyMismatch);
        }
        if !config.accepts(&self.params, &item) {
            return MergeOutcome::Ignored(IgnoreReason::FilteredOut);
        }

        let index = match &config.ordering {
            OrderingPolicy::Stable | OrderingPolicy::RecencyFirst => 0,
            OrderingPolicy::Sorted(compare) => self
                .items
                .partition_point(|existing| compare(existing, &item) != Ordering::Greater),
        };
        self.items.insert(index, item);
        self.reindex(index..self.items.len());
        debug!("{} inserted live entity at index {}", self.id, index);
        MergeOutcome::Inserted { index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{Page, PageToken};
    use crate::entity::Keyed;
    use crate::session::SessionId;

    #[derive(Debug, Clone, PartialEq)]
    struct Room {
        id: u32,
        title: String,
        last_message: String,
    }

    #[derive(Debug, Clone, Default)]
    struct RoomPatch {
        id: Option<u32>,
        title: Option<String>,
        last_message: Option<String>,
    }

    impl Keyed for Room {
        type Key = u32;
        fn key(&self) -> u32 {
            self.id
        }
    }

    impl Patchable for Room {
        type Patch = RoomPatch;
        fn apply_patch(&mut self, patch: RoomPatch) {
            if let Some(title) = patch.title {
                self.title = title;
            }
            if let Some(last_message) = patch.last_message {
                self.last_message = last_message;
            }
        }
        fn from_patch(patch: RoomPatch) -> Option<Self> {
            Some(Room {
                id: patch.id?,
                title: patch.title?,
                last_message: patch.last_message?,
            })
        }
    }

    fn room(id: u32, title: &str) -> Room {
        Room {
            id,
            title: title.to_string(),
            last_message: String::new(),
        }
    }

    fn full_patch(id: u32, title: &str) -> RoomPatch {
        RoomPatch {
            id: Some(id),
            title: Some(title.to_string()),
            last_message: Some(String::new()),
        }
    }

    fn message(text: &str) -> RoomPatch {
        RoomPatch {
            last_message: Some(text.to_string()),
            ..RoomPatch::default()
        }
    }

    fn loaded(rooms: Vec<Room>) -> PaginationSession<(), Room> {
        let mut session = PaginationSession::new(SessionId::new(1), ());
        let ticket = session.begin_fetch(10).unwrap();
        session.complete_fetch(&ticket, Page::new(rooms, Some(PageToken::new("tok1"))));
        session
    }

    fn ids(session: &PaginationSession<(), Room>) -> Vec<u32> {
        session.items().iter().map(|r| r.id).collect()
    }

    fn recency() -> SessionConfig<(), Room> {
        SessionConfig::default().with_ordering(OrderingPolicy::RecencyFirst)
    }

    #[test]
    fn activity_moves_entity_to_front_on_recency_sessions() {
        let mut session = loaded(vec![room(1, "A"), room(2, "B"), room(3, "C")]);
        let outcome = session.apply_event(LiveEvent::changed(2, message("hi")).with_recency(), &recency());
        assert_eq!(outcome, MergeOutcome::Promoted { from: 1 });
        assert_eq!(ids(&session), vec![2, 1, 3]);
        assert_eq!(session.items()[0].last_message, "hi");
        assert_eq!(session.len(), 3);
    }

    fn assert_positions_match(session: &PaginationSession<(), Room>) {
        for (index, room) in session.items().iter().enumerate() {
            assert_eq!(session.position(&room.id), Some(index), "room {}", room.id);
        }
    }

    #[test]
    fn positions_follow_promotions_and_inserts() {
        let mut session = loaded(vec![room(1, "A"), room(2, "B"), room(3, "C"), room(4, "D")]);
        session.apply_event(LiveEvent::changed(3, message("hi")).with_recency(), &recency());
        assert_positions_match(&session);

        session.apply_event(LiveEvent::created(5, full_patch(5, "E")), &recency());
        assert_eq!(ids(&session), vec![5, 3, 1, 2, 4]);
        assert_positions_match(&session);

        let sorted = SessionConfig::default()
            .with_ordering(OrderingPolicy::sorted_by(|a: &Room, b: &Room| a.id.cmp(&b.id)));
        session.apply_event(LiveEvent::created(0, full_patch(0, "Z")), &sorted);
        assert_positions_match(&session);

        let ticket = session.begin_fetch(10).unwrap();
        session.complete_fetch(&ticket, Page::last(vec![room(4, "D"), room(6, "F")]));
        assert_positions_match(&session);
        assert_eq!(session.position(&6), Some(session.len() - 1));
    }

    #[test]
    fn change_without_activity_keeps_position() {
        let mut session = loaded(vec![room(1, "A"), room(2, "B"), room(3, "C")]);
        let outcome = session.apply_event(LiveEvent::changed(2, message("hi")), &recency());
        assert_eq!(outcome, MergeOutcome::Updated { index: 1 });
        assert_eq!(ids(&session), vec![1, 2, 3]);
        assert_eq!(session.items()[1].last_message, "hi");
        assert_eq!(session.items()[1].title, "B");
    }

    #[test]
    fn stable_sessions_never_reorder() {
        let mut session = loaded(vec![room(1, "A"), room(2, "B")]);
        let outcome = session.apply_event(
            LiveEvent::changed(2, message("hi")).with_recency(),
            &SessionConfig::default(),
        );
        assert_eq!(outcome, MergeOutcome::Updated { index: 1 });
        assert_eq!(ids(&session), vec![1, 2]);
    }

    #[test]
    fn promoting_the_head_keeps_it_in_place() {
        let mut session = loaded(vec![room(1, "A"), room(2, "B")]);
        let outcome = session.apply_event(LiveEvent::changed(1, message("x")).with_recency(), &recency());
        assert_eq!(outcome, MergeOutcome::Promoted { from: 0 });
        assert_eq!(ids(&session), vec![1, 2]);
    }

    #[test]
    fn created_entity_is_prepended() {
        let mut session = loaded(vec![room(1, "A")]);
        let outcome = session.apply_event(LiveEvent::created(5, full_patch(5, "E")), &recency());
        assert_eq!(outcome, MergeOutcome::Inserted { index: 0 });
        assert_eq!(ids(&session), vec![5, 1]);
        assert!(session.contains(&5));
        assert_eq!(session.cursor(), Some(&PageToken::new("tok1")));
        assert!(session.has_more());
    }

    #[test]
    fn created_entity_lands_at_sort_position() {
        let config = SessionConfig::default()
            .with_ordering(OrderingPolicy::sorted_by(|a: &Room, b: &Room| a.title.cmp(&b.title)));
        let mut session = loaded(vec![room(1, "A"), room(2, "C"), room(3, "E")]);
        let outcome = session.apply_event(LiveEvent::created(4, full_patch(4, "D")), &config);
        assert_eq!(outcome, MergeOutcome::Inserted { index: 2 });
        assert_eq!(ids(&session), vec![1, 2, 4, 3]);

        let outcome = session.apply_event(LiveEvent::created(5, full_patch(5, "Z")), &config);
        assert_eq!(outcome, MergeOutcome::Inserted { index: 4 });
    }

    #[test]
    fn redelivered_created_event_is_merged_not_duplicated() {
        let mut session = loaded(vec![room(1, "A")]);
        let outcome = session.apply_event(LiveEvent::created(1, full_patch(1, "A2")), &recency());
        assert_eq!(outcome, MergeOutcome::Updated { index: 0 });
        assert_eq!(session.len(), 1);
        assert_eq!(session.items()[0].title, "A2");
    }

    #[test]
    fn events_before_first_page_are_dropped() {
        let mut session = PaginationSession::<(), Room>::new(SessionId::new(1), ());
        let outcome = session.apply_event(LiveEvent::created(1, full_patch(1, "A")), &recency());
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::NotInitialized));
        assert!(session.is_empty());
    }

    #[test]
    fn change_for_unloaded_entity_is_dropped() {
        let mut session = loaded(vec![room(1, "A")]);
        let outcome = session.apply_event(LiveEvent::changed(9, message("hi")), &recency());
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::NotLoaded));
    }

    #[test]
    fn filter_rejects_foreign_entities() {
        let config = recency().with_filter(|_, room: &Room| room.title.starts_with("mine"));
        let mut session = loaded(vec![room(1, "mine-a")]);
        let outcome = session.apply_event(LiveEvent::created(2, full_patch(2, "theirs")), &config);
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::FilteredOut));
        let outcome = session.apply_event(LiveEvent::created(3, full_patch(3, "mine-b")), &config);
        assert_eq!(outcome, MergeOutcome::Inserted { index: 0 });
    }

    #[test]
    fn incomplete_created_payload_is_dropped() {
        let mut session = loaded(vec![room(1, "A")]);
        let outcome = session.apply_event(LiveEvent::created(2, message("hi")), &recency());
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::Incomplete));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn created_payload_for_another_key_is_dropped() {
        let mut session = loaded(vec![room(1, "A")]);
        let outcome = session.apply_event(LiveEvent::created(2, full_patch(3, "C")), &recency());
        assert_eq!(outcome, MergeOutcome::Ignored(IgnoreReason::KeyMismatch));
        assert!(!session.contains(&2));
        assert!(!session.contains(&3));
    }

    #[test]
    fn inserted_entity_is_deduplicated_on_next_page() {
        let mut session = loaded(vec![room(1, "A")]);
        session.apply_event(LiveEvent::created(2, full_patch(2, "B")), &recency());

        let ticket = session.begin_fetch(10).unwrap();
        session.complete_fetch(&ticket, Page::last(vec![room(2, "B"), room(3, "C")]));
        assert_eq!(ids(&session), vec![2, 1, 3]);
    }
}
