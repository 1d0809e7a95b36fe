/// Lazy iterator over a path and its ancestors
///
/// For `/a/b/c` it yields `/a/b/c` → `/a/b` → `/a` → `/`, borrowing slices of
/// the input without allocating. The scanner walks directory ids with it to
/// find the nearest layout and to collect inherited middleware.
///
/// # Examples
///
/// ```
/// use vellum_router::path::PathHierarchy;
///
/// let paths: Vec<&str> = PathHierarchy::new("/blog/[slug]").collect();
/// assert_eq!(paths, vec!["/blog/[slug]", "/blog", "/"]);
/// ```
#[derive(Debug, Clone)]
pub struct PathHierarchy<'a> {
    current: Option<&'a str>,
}

impl<'a> PathHierarchy<'a> {
    pub fn new(path: &'a str) -> Self {
        Self {
            current: Some(path),
        }
    }
}

impl<'a> Iterator for PathHierarchy<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;

        self.current = if current == "/" || current.is_empty() {
            None
        } else {
            match current.rfind('/') {
                Some(0) => Some("/"),
                Some(slash) => Some(&current[..slash]),
                None => None,
            }
        };

        Some(current)
    }
}
