/// Path utilities for request paths and directory ids
///
/// All functions are pure: given the same input they produce the same output.

pub mod hierarchy;
pub use hierarchy::PathHierarchy;

/// Splits a request path into its non-empty segments
///
/// A single trailing slash (and any doubled slash) yields no extra segment,
/// so `/about` and `/about/` split identically.
///
/// # Examples
///
/// ```
/// use vellum_router::path::split_segments;
///
/// assert_eq!(split_segments("/"), Vec::<&str>::new());
/// assert_eq!(split_segments("/docs/a/b/"), vec!["docs", "a", "b"]);
/// ```
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Returns the parent of a canonical id, or `None` for the root
///
/// # Examples
///
/// ```
/// use vellum_router::path::parent_id;
///
/// assert_eq!(parent_id("/blog/[slug]"), Some("/blog"));
/// assert_eq!(parent_id("/blog"), Some("/"));
/// assert_eq!(parent_id("/"), None);
/// ```
pub fn parent_id(id: &str) -> Option<&str> {
    PathHierarchy::new(id).nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_segments_ignores_empty() {
        assert_eq!(split_segments("//a///b//"), vec!["a", "b"]);
        assert_eq!(split_segments("/about/"), split_segments("/about"));
        assert!(split_segments("").is_empty());
    }

    #[test]
    fn test_path_hierarchy() {
        let paths: Vec<&str> = PathHierarchy::new("/a/b/c").collect();
        assert_eq!(paths, vec!["/a/b/c", "/a/b", "/a", "/"]);

        let paths: Vec<&str> = PathHierarchy::new("/").collect();
        assert_eq!(paths, vec!["/"]);
    }

    #[test]
    fn test_parent_id_with_groups() {
        assert_eq!(parent_id("/(shop)/cart"), Some("/(shop)"));
        assert_eq!(parent_id("/(shop)"), Some("/"));
    }
}
