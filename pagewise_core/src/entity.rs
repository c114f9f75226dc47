//! Entity identity and shallow merging.

use serde::{Deserialize, Deserializer};
use std::fmt::Debug;
use std::hash::Hash;

/// An entity with a stable identity key.
///
/// The key deduplicates loaded pages and matches live events to loaded rows.
/// Use `#[derive(Keyed)]` from `pagewise_derive` and mark the key field with
/// `#[key]` instead of implementing it by hand.
pub trait Keyed {
    /// The identity key type (room id, message id, bundle owner id...).
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Returns the identity key of this entity.
    fn key(&self) -> Self::Key;
}

/// An entity that live events can update with a partial payload.
///
/// `#[derive(Patchable)]` generates a `<Name>Patch` struct with every field
/// wrapped in `Option`, so that fields present in an event overwrite and
/// absent fields are retained.
pub trait Patchable: Keyed + Sized {
    /// Partial representation carried by live events.
    type Patch: Send + 'static;

    /// Overwrites the fields present in `patch`, keeping the others.
    ///
    /// Must not change the identity key.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Builds a whole entity out of a patch. Returns `None` when a required field is missing.
    fn from_patch(patch: Self::Patch) -> Option<Self>;
}

/// Deserializes a field that is present in the input as `Some`, `null` included.
///
/// `#[derive(Patchable)]` uses it for `Option` fields, so that a patch tells an
/// explicit `null` (clear the field) from an absent field (keep it). Pair it
/// with `#[serde(default)]`.
pub fn deserialize_present<'de, D, V>(deserializer: D) -> Result<Option<V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    V::deserialize(deserializer).map(Some)
}
