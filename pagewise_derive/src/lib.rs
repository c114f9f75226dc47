mod keyed;
mod patchable;

/// Derive macro implementing `pagewise_core::Keyed`.
///
/// Exactly one field must carry `#[key]`; its type becomes the identity key and
/// `key()` returns a clone of it. Works on structs with named or tuple fields.
///
/// ```ignore
/// use pagewise_derive::Keyed;
///
/// #[derive(Clone, Keyed)]
/// struct ChatRoom {
///     #[key]
///     id: String,
///     title: String,
/// }
/// ```
#[proc_macro_derive(Keyed, attributes(key))]
pub fn keyed(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    keyed::keyed_impl(item)
}

/// Derive macro implementing `pagewise_core::Patchable`.
///
/// Generates a `<Name>Patch` struct holding every field as an `Option`, with
/// serde support so live events can carry it as their payload. Applying a patch
/// overwrites the fields that are present, except the `#[key]` field which is
/// only used when building a new entity from a patch. `from_patch` succeeds only
/// when every non-`Option` field is present.
///
/// Fields that are themselves `Option<_>` tell an explicit `null` from an absent
/// field: `null` clears the entity's value, absence keeps it. Such fields may be
/// missing or `null` when building a new entity.
///
/// The generated patch derives `serde::Serialize` and `serde::Deserialize`, so
/// the deriving crate needs `serde` as a dependency.
///
/// # Attributes
///
/// - `#[patch(name = "RoomDelta")]` on the struct renames the patch type.
/// - `#[patch(skip)]` on a field leaves it out of the patch. New entities get
///   `Default::default()` for it.
/// - `#[serde(rename_all = "...")]` on the struct and `#[serde(rename = "...")]` or
///   `#[serde(alias = "...")]` on fields are carried over to the patch.
///
/// ```ignore
/// use pagewise_derive::{Keyed, Patchable};
///
/// #[derive(Clone, Keyed, Patchable)]
/// #[serde(rename_all = "camelCase")]
/// struct ChatRoom {
///     #[key]
///     id: String,
///     last_message: String,
///     #[patch(skip)]
///     unread: u32,
/// }
///
/// // generates `ChatRoomPatch { id, last_message }`
/// ```
#[proc_macro_derive(Patchable, attributes(patch, key, serde))]
pub fn patchable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    patchable::patchable_impl(item)
}
