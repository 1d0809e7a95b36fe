use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

// -- Shared helpers --

pub(crate) fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) {
    if let (Ok(name), Ok(val)) = (
        HeaderName::from_bytes(key.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, val);
    }
}

// ============================================================================
// ApiResponse
// ============================================================================

/// Response produced by API handlers and responding middleware
///
/// ```
/// use vellum::ApiResponse;
/// use axum::http::StatusCode;
///
/// let resp = ApiResponse::new()
///     .status(StatusCode::CREATED)
///     .json(&serde_json::json!({ "id": 1 }));
/// assert_eq!(resp.status_code(), StatusCode::CREATED);
/// ```
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Plain-text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self.set_content_type("text/plain; charset=utf-8");
        self
    }

    /// HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self.set_content_type("text/html; charset=utf-8");
        self
    }

    /// JSON body; a value that fails to serialize yields a 500
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = bytes;
                self.set_content_type("application/json");
            }
            Err(err) => {
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.body = err.to_string().into_bytes();
            }
        }
        self
    }

    /// Redirect to `location` with `status` (301, 302, 303, 307, 308)
    pub fn redirect(location: &str, status: StatusCode) -> Self {
        Self::new().status(status).header(header::LOCATION.as_str(), location)
    }

    /// Add a custom response header; invalid names or values are ignored
    pub fn header(mut self, key: &str, value: &str) -> Self {
        insert_header(&mut self.headers, key, value);
        self
    }

    /// Set the HTTP status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    fn set_content_type(&mut self, value: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
    }
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Body::from(self.body)).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let resp = ApiResponse::new().text("hello").into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_json_response() {
        let resp = ApiResponse::new().json(&vec![1, 2, 3]);
        assert_eq!(resp.body(), b"[1,2,3]");
        assert_eq!(resp.headers().get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_redirect() {
        let resp = ApiResponse::redirect("/login", StatusCode::SEE_OTHER).into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get("location").unwrap(), "/login");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let resp = ApiResponse::new().header("bad header", "x");
        assert!(resp.headers().is_empty());
    }
}
