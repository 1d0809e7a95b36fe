/// Segment classification for directory names and matcher patterns
///
/// Pure functions: same input → same output, no side effects.

/// Kind of a single directory segment under the routes root
///
/// # Examples
///
/// ```
/// use vellum_router::route::pattern::{classify_segment, SegmentKind};
///
/// assert_eq!(classify_segment("about"), SegmentKind::Static("about".into()));
/// assert_eq!(classify_segment("[slug]"), SegmentKind::Dynamic("slug".into()));
/// assert_eq!(classify_segment("[...path]"), SegmentKind::CatchAll("path".into()));
/// assert_eq!(classify_segment("(marketing)"), SegmentKind::Group("marketing".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal text
    Static(String),
    /// `[name]`
    Dynamic(String),
    /// `[...name]`
    CatchAll(String),
    /// `(name)`; organises files on disk, never appears in URLs
    Group(String),
}

impl SegmentKind {
    pub fn is_group(&self) -> bool {
        matches!(self, SegmentKind::Group(_))
    }
}

/// Classifies a directory segment
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Group**: `(name)`
/// 2. **Catch-all**: `[...name]`
/// 3. **Dynamic**: `[name]`
/// 4. **Static**: anything else
pub fn classify_segment(segment: &str) -> SegmentKind {
    if let Some(inner) = segment.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        return SegmentKind::Group(inner.to_string());
    }

    match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => match inner.strip_prefix("...") {
            Some(name) => SegmentKind::CatchAll(name.to_string()),
            None => SegmentKind::Dynamic(inner.to_string()),
        },
        None => SegmentKind::Static(segment.to_string()),
    }
}

/// One segment of a matcher pattern (`/blog/:slug`, `/docs/*path`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSegment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

/// Parses one pattern segment
///
/// # Examples
///
/// ```
/// use vellum_router::route::pattern::{parse_pattern_segment, PatternSegment};
///
/// assert_eq!(parse_pattern_segment("blog"), PatternSegment::Static("blog"));
/// assert_eq!(parse_pattern_segment(":slug"), PatternSegment::Param("slug"));
/// assert_eq!(parse_pattern_segment("*path"), PatternSegment::CatchAll("path"));
/// ```
pub fn parse_pattern_segment(segment: &str) -> PatternSegment<'_> {
    if let Some(name) = segment.strip_prefix(':') {
        PatternSegment::Param(name)
    } else if let Some(name) = segment.strip_prefix('*') {
        PatternSegment::CatchAll(name)
    } else {
        PatternSegment::Static(segment)
    }
}

/// Shape of a pattern with parameter names erased
///
/// Two patterns with the same shape occupy the same trie slot, so the shape is
/// what collision checks compare.
///
/// # Examples
///
/// ```
/// use vellum_router::route::pattern::pattern_shape;
///
/// assert_eq!(pattern_shape("/blog/:slug"), pattern_shape("/blog/:id"));
/// assert_ne!(pattern_shape("/blog/:slug"), pattern_shape("/blog/*slug"));
/// assert_eq!(pattern_shape("/about/"), "/about");
/// ```
pub fn pattern_shape(pattern: &str) -> String {
    let shape = pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match parse_pattern_segment(segment) {
            PatternSegment::Static(text) => text,
            PatternSegment::Param(_) => ":",
            PatternSegment::CatchAll(_) => "*",
        })
        .collect::<Vec<_>>()
        .join("/");

    format!("/{}", shape)
}
