use serde::{Deserialize, Serialize};

/// Header value for responses without a cache export
pub const NO_CACHE: &str = "no-cache";

/// HTTP caching exported by a page module
///
/// All durations are in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_max_age: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_while_revalidate: Option<u64>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn s_max_age(mut self, seconds: u64) -> Self {
        self.s_max_age = Some(seconds);
        self
    }

    pub fn stale_while_revalidate(mut self, seconds: u64) -> Self {
        self.stale_while_revalidate = Some(seconds);
        self
    }

    /// `Cache-Control` value listing only the fields that are set
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum::CacheConfig;
    ///
    /// let config = CacheConfig::new().max_age(60).stale_while_revalidate(30);
    /// assert_eq!(config.header_value(), "public, max-age=60, stale-while-revalidate=30");
    /// ```
    pub fn header_value(&self) -> String {
        let mut parts = vec!["public".to_string()];

        if let Some(n) = self.max_age {
            parts.push(format!("max-age={}", n));
        }
        if let Some(n) = self.s_max_age {
            parts.push(format!("s-maxage={}", n));
        }
        if let Some(n) = self.stale_while_revalidate {
            parts.push(format!("stale-while-revalidate={}", n));
        }

        parts.join(", ")
    }
}

/// `Cache-Control` value for an optional cache export
///
/// # Examples
///
/// ```
/// use vellum::cache_control::cache_control_header;
///
/// assert_eq!(cache_control_header(None), "no-cache");
/// ```
pub fn cache_control_header(config: Option<&CacheConfig>) -> String {
    match config {
        Some(config) => config.header_value(),
        None => NO_CACHE.to_string(),
    }
}
