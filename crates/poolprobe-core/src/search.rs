//! User search stub and its allocation strategies
//!
//! The stub does a fixed amount of work per call so that the only variable
//! between the two handlers is where the request object comes from: a fresh
//! heap allocation, or the pool.

use crate::args::Params;
use crate::pool::{Pool, PoolStats};
use std::sync::Arc;

/// Body returned for every search
pub const RESPONSE_STUB: &[u8] = br#"{"organization": "a", "experience": 5}"#;

/// Entry appended to the results buffer
pub const RESULT_EXAMPLE: &str = "result example";

/// Number of entries a search produces
pub const RESULT_COUNT: usize = 5;

/// Per-request scratch state
#[derive(Debug, Default)]
pub struct SearchRequest {
    pub name: Vec<u8>,
    pub city: Vec<u8>,
    pub limit: usize,
    pub offset: usize,
    pub results: Vec<&'static str>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fill `req` from `params` and compute the stub result set.
///
/// `name` and `city` are overwritten with the current values (empty when
/// absent), reusing their buffers. `results` is truncated before it is
/// repopulated, so a reused request never carries old entries forward.
pub fn search<P: Params + ?Sized>(req: &mut SearchRequest, params: &P) -> &'static [u8] {
    overwrite(&mut req.name, params.bytes("name"));
    overwrite(&mut req.city, params.bytes("city"));
    req.limit = params.uint_or_zero("limit");
    req.offset = params.uint_or_zero("offset");

    req.results.clear();
    for _ in 0..RESULT_COUNT {
        req.results.push(RESULT_EXAMPLE);
    }

    std::hint::black_box(&*req);

    RESPONSE_STUB
}

fn overwrite(buf: &mut Vec<u8>, value: Option<&[u8]>) {
    buf.clear();
    buf.extend_from_slice(value.unwrap_or_default());
}

/// Where a search gets its request object from
pub trait SearchHandler: Send + Sync {
    /// Run one search and return the response body
    fn handle(&self, params: &dyn Params) -> &'static [u8];

    /// Short label for logs
    fn mode(&self) -> &'static str;

    /// Pool counters, if this handler pools
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}

/// Allocates a new request object for every search
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpooled;

impl SearchHandler for Unpooled {
    fn handle(&self, params: &dyn Params) -> &'static [u8] {
        let mut req = Box::new(SearchRequest::new());
        search(&mut req, params)
    }

    fn mode(&self) -> &'static str {
        "unpooled"
    }
}

/// Borrows request objects from a shared pool
#[derive(Debug, Clone)]
pub struct Pooled {
    pool: Arc<Pool<Box<SearchRequest>>>,
}

impl Pooled {
    pub fn new(pool: Arc<Pool<Box<SearchRequest>>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<Pool<Box<SearchRequest>>> {
        &self.pool
    }
}

impl Default for Pooled {
    fn default() -> Self {
        Self::new(Arc::new(Pool::default()))
    }
}

impl SearchHandler for Pooled {
    fn handle(&self, params: &dyn Params) -> &'static [u8] {
        let mut req = self.pool.acquire();
        let body = search(&mut req, params);
        self.pool.release(req);
        body
    }

    fn mode(&self) -> &'static str {
        "pooled"
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(self.pool.stats())
    }
}

/// Pick the handler once, at startup
pub fn handler(with_pool: bool) -> Arc<dyn SearchHandler> {
    if with_pool {
        Arc::new(Pooled::default())
    } else {
        Arc::new(Unpooled)
    }
}
