//! # Pagewise memory backends
//!
//! In-memory implementations of pagewise's collaborators, primarily for testing:
//!
//! - [`InMemoryPageSource`]: a paged dataset handing out opaque page tokens.
//! - [`ScriptedPageLoader`]: a loader whose calls park until the test resolves them,
//!   for deterministic race scenarios.
//! - [`InMemoryEventChannel`]: a live update channel feeding a
//!   [`LiveFeed`](pagewise_core::LiveFeed).

#![deny(missing_docs)]

mod channel;
mod scripted;
mod source;

pub use channel::*;
pub use scripted::*;
pub use source::*;
