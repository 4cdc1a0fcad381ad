//! CRM collaborator interface and its HTTP implementation.
//!
//! The engine talks to the CRM through two calls only:
//! - [`CrmClient::paginated_fetch`]: a listing endpoint, paged transparently
//! - [`CrmClient::detail_fetch`]: a single JSON document
//!
//! [`HttpCrmClient`] implements both against the CRM REST API.

pub mod endpoints;
mod http;

use std::future::Future;

use salescycle_shared::Result;
use serde_json::Value;

pub use http::{HttpCrmClient, PAGE_SIZE};

/// Items collected from a paged listing, plus the upstream total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Collected items, capped at the requested maximum.
    pub items: Vec<Value>,
    /// Total reported by the upstream `count` field.
    pub count: usize,
}

/// Remote calls the engine depends on.
///
/// Both methods fail on non-2xx responses and transport errors. Futures are
/// `Send` so per-job calls can run on spawned tasks.
pub trait CrmClient: Send + Sync + 'static {
    /// Page through `endpoint` until `max_items` or the upstream count is reached.
    fn paginated_fetch(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        max_items: usize,
    ) -> impl Future<Output = Result<Page>> + Send;

    /// Fetch one JSON document. `endpoint` may carry its own query string.
    fn detail_fetch(&self, endpoint: &str) -> impl Future<Output = Result<Value>> + Send;
}
