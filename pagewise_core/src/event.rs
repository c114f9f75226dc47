//! Live update events.
//!
//! Push transports deliver [`RawLiveEvent`]s; [`RawLiveEvent::decode`] turns them into typed
//! [`LiveEvent`]s that the live merge layer applies to a session.

use crate::entity::{Keyed, Patchable};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The live event type matching an entity: keyed by its key, carrying its patch.
pub type EntityEvent<T> = LiveEvent<<T as Keyed>::Key, <T as Patchable>::Patch>;

/// Whether an event announces a new entity or a change to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
    /// A new entity appeared.
    Created,
    /// An existing entity changed.
    Changed,
}

/// A decoded live update event.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent<K, P> {
    /// Identity key of the affected entity.
    pub entity_key: K,
    /// Created or changed.
    pub kind: LiveEventKind,
    /// Partial entity, merged over the loaded one.
    pub payload: P,
    /// The entity became the most recent one (for example a new message in a chat room).
    pub bumps_recency: bool,
}

impl<K, P> LiveEvent<K, P> {
    /// A `created` event.
    pub fn created(entity_key: K, payload: P) -> Self {
        LiveEvent {
            entity_key,
            kind: LiveEventKind::Created,
            payload,
            bumps_recency: false,
        }
    }

    /// A `changed` event.
    pub fn changed(entity_key: K, payload: P) -> Self {
        LiveEvent {
            entity_key,
            kind: LiveEventKind::Changed,
            payload,
            bumps_recency: false,
        }
    }

    /// Marks the event as new activity on the entity.
    pub fn with_recency(mut self) -> Self {
        self.bumps_recency = true;
        self
    }
}

/// A live event as delivered by a push transport, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLiveEvent {
    /// Identity key, if the transport supplied one.
    #[serde(default)]
    pub entity_key: Option<Value>,
    /// Created or changed.
    pub kind: LiveEventKind,
    /// Undecoded partial entity.
    #[serde(default)]
    pub payload: Value,
    /// See [`LiveEvent::bumps_recency`].
    #[serde(default)]
    pub bumps_recency: bool,
}

impl RawLiveEvent {
    /// Decodes the key and payload into their typed representations.
    pub fn decode<K, P>(self) -> Result<LiveEvent<K, P>, LiveEventDecodeError>
    where
        K: DeserializeOwned,
        P: DeserializeOwned,
    {
        let key = match self.entity_key {
            None | Some(Value::Null) => return Err(LiveEventDecodeError::MissingEntityKey),
            Some(key) => key,
        };
        let entity_key = serde_json::from_value(key).map_err(LiveEventDecodeError::EntityKey)?;
        let payload = serde_json::from_value(self.payload).map_err(LiveEventDecodeError::Payload)?;
        Ok(LiveEvent {
            entity_key,
            kind: self.kind,
            payload,
            bumps_recency: self.bumps_recency,
        })
    }
}

/// Reasons a [`RawLiveEvent`] can't be decoded.
#[derive(Debug, thiserror::Error)]
pub enum LiveEventDecodeError {
    /// The event carries no entity key.
    #[error("Live event has no entity key")]
    MissingEntityKey,
    /// The entity key doesn't match the expected key type.
    #[error("Live event entity key can't be decoded: {0}")]
    EntityKey(#[source] serde_json::Error),
    /// The payload doesn't match the expected patch type.
    #[error("Live event payload can't be decoded: {0}")]
    Payload(#[source] serde_json::Error),
}
