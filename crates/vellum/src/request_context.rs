// File: src/request_context.rs
// Purpose: Per-request context shared by middleware, loaders and API handlers

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use std::collections::HashMap;
use vellum_router::Params;

/// Request context passed to middleware, `load` and API handlers
///
/// One context exists per request and is never shared across requests.
/// Middleware may stash values in `locals` and queue response headers.
#[derive(Clone)]
pub struct RequestContext {
    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: Method,

    /// Request path without the query string
    pub path: String,

    /// Route parameters extracted by the matcher
    pub params: Params,

    /// Query parameters from URL (?key=value)
    pub query: QueryParams,

    /// Request headers
    pub headers: HeaderMap,

    /// Parsed cookies
    pub cookies: HashMap<String, String>,

    /// Raw request body
    pub body: Bytes,

    /// Values set by middleware for later stages
    pub locals: HashMap<String, Value>,

    response_headers: HeaderMap,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish()
    }
}

impl RequestContext {
    /// Create a context for `method` and `path`
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Params::new(),
            query: QueryParams::default(),
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            body: Bytes::new(),
            locals: HashMap::new(),
            response_headers: HeaderMap::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Parses `raw` (`a=1&b=2`) into the query map
    pub fn with_query(mut self, raw: Option<&str>) -> Self {
        self.query = QueryParams::parse(raw.unwrap_or_default());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.cookies = Self::parse_cookies(&headers);
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Parse cookies from Cookie header
    fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
        let mut cookies = HashMap::new();

        if let Some(cookie_header) = headers.get("cookie") {
            if let Ok(cookie_str) = cookie_header.to_str() {
                for cookie in cookie_str.split(';') {
                    let cookie = cookie.trim();
                    if let Some((key, value)) = cookie.split_once('=') {
                        cookies.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        cookies
    }

    /// Get a cookie value
    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    /// Get a header value
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Get a route parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parse the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn set_local(&mut self, key: impl Into<String>, value: Value) {
        self.locals.insert(key.into(), value);
    }

    pub fn local(&self, key: &str) -> Option<&Value> {
        self.locals.get(key)
    }

    /// Queue a header for the eventual response; invalid names or values are ignored
    pub fn set_response_header(&mut self, key: &str, value: &str) {
        crate::response::insert_header(&mut self.response_headers, key, value);
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }
}

/// Query parameters from URL
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: HashMap<String, String>,
}

impl QueryParams {
    /// Create from HashMap
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    /// Parse a raw query string
    ///
    /// Keys and values are percent- and `+`-decoded, a key without `=` maps
    /// to an empty value and later duplicates win.
    pub fn parse(raw: &str) -> Self {
        let params = serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
            .unwrap_or_default()
            .into_iter()
            .collect();
        Self { params }
    }

    /// Get a query parameter value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.params.get(key)
    }

    /// Get a query parameter as a specific type
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key)?.parse().ok()
    }

    /// Check if a parameter exists
    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Get as HashMap
    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("session=abc; theme=dark"));
        let ctx = RequestContext::new(Method::GET, "/").with_headers(headers);
        assert_eq!(ctx.get_cookie("session"), Some(&"abc".to_string()));
        assert_eq!(ctx.get_cookie("theme"), Some(&"dark".to_string()));
    }

    #[test]
    fn test_query_params() {
        let ctx = RequestContext::new(Method::GET, "/search").with_query(Some("q=rust&page=2&flag"));
        assert_eq!(ctx.query.get("q"), Some(&"rust".to_string()));
        assert_eq!(ctx.query.get_as::<u32>("page"), Some(2));
        assert!(ctx.query.has("flag"));
    }

    #[test]
    fn test_query_params_are_decoded() {
        let ctx = RequestContext::new(Method::GET, "/search")
            .with_query(Some("q=hello%20world&tag=a+b&caf%C3%A9=1&tag=c"));
        assert_eq!(ctx.query.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(ctx.query.get("tag").map(String::as_str), Some("c"));
        assert_eq!(ctx.query.get("café").map(String::as_str), Some("1"));

        let single = QueryParams::parse("tag=a+b&empty=&flag");
        assert_eq!(single.get("tag").map(String::as_str), Some("a b"));
        assert_eq!(single.get("empty").map(String::as_str), Some(""));
        assert_eq!(single.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn test_response_headers_skip_invalid() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_response_header("x-powered-by", "vellum");
        ctx.set_response_header("bad header", "x");
        assert_eq!(ctx.response_headers().len(), 1);
    }

    #[test]
    fn test_json_body() {
        let ctx = RequestContext::new(Method::POST, "/api")
            .with_body(Bytes::from_static(br#"{"name":"Ada"}"#));
        let value: Value = ctx.json().unwrap();
        assert_eq!(value["name"], "Ada");
    }
}
