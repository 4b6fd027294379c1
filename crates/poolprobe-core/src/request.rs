//! HTTP Request types

use crate::args::QueryArgs;
use http::Method;

/// HTTP Request as seen by the dispatcher
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method (any method is accepted)
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
        }
    }

    /// Create a GET request from a path that may carry a query string
    pub fn get(target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let mut request = Self::new(Method::GET, path);
        request.query = query;
        request
    }

    /// Decode the query string
    pub fn args(&self) -> QueryArgs {
        self.query
            .as_deref()
            .map(|q| QueryArgs::parse(q.as_bytes()))
            .unwrap_or_default()
    }
}
