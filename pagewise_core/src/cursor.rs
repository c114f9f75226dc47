//! Continuation cursors and the page envelopes exchanged with a [`PageLoader`].
//!
//! [`PageLoader`]: crate::loader::PageLoader

use serde::{Deserialize, Serialize};

/// Opaque continuation token handed out by a paged backend.
///
/// The engine never inspects a token. It only stores the last one received and
/// compares tokens for equality when deciding whether a fetch result is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    /// Wraps a backend token.
    pub fn new(token: impl Into<String>) -> Self {
        PageToken(token.into())
    }

    /// Returns the raw token as handed out by the backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Backends signal the last page either by omitting the token or by sending an empty one.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for PageToken {
    fn from(token: String) -> Self {
        PageToken(token)
    }
}

impl From<&str> for PageToken {
    fn from(token: &str) -> Self {
        PageToken(token.to_string())
    }
}

impl std::fmt::Display for PageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request for a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Resume point. `None` requests the first page.
    pub page_token: Option<PageToken>,
    /// Maximum number of items the backend should return.
    pub limit: u32,
}

impl PageRequest {
    /// Request for the first page.
    pub fn first(limit: u32) -> Self {
        PageRequest {
            page_token: None,
            limit,
        }
    }

    /// Request for the page following `page_token`.
    pub fn after(page_token: PageToken, limit: u32) -> Self {
        PageRequest {
            page_token: Some(page_token),
            limit,
        }
    }
}

/// One page of items in backend order.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items, in the order the backend returned them.
    pub items: Vec<T>,
    /// Where the next page resumes. `None` (or an empty token) marks the last page.
    pub next_page_token: Option<PageToken>,
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, next_page_token: Option<PageToken>) -> Self {
        Page {
            items,
            next_page_token,
        }
    }

    /// Creates a page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Page {
            items,
            next_page_token: None,
        }
    }

    /// True when nothing follows this page: no items came back or there is no usable token.
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.next_page_token.as_ref().is_none_or(PageToken::is_empty)
    }

    /// The continuation token, with empty tokens treated as absent.
    pub fn continuation(&self) -> Option<&PageToken> {
        self.next_page_token.as_ref().filter(|token| !token.is_empty())
    }
}
