//! # Pagewise
//!
//! Incremental cursor pagination with live updates merged into the loaded list.

#![deny(missing_docs)]

#[cfg(feature = "derive")]
/// Derive macros for the `pagewise` crate.
pub mod derive {
    //! Contains the `Keyed` and `Patchable` derive macros.
    pub use pagewise_derive::*;
}

#[cfg(feature = "in-memory")]
/// In-memory loaders and event channels for the `pagewise` crate.
pub mod mem {
    //! Contains in-memory backends, primarily for testing.
    pub use pagewise_mem::*;
}

pub mod prelude {
    //! The prelude module for the `pagewise` crate.
    pub use pagewise_core::prelude::*;

    #[cfg(feature = "derive")]
    pub use super::derive::*;
    #[cfg(feature = "in-memory")]
    pub use super::mem::*;
}
