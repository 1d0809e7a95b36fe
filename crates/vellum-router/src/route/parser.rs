/// Route id parsing and specificity ranking
///
/// Transforms directory ids (`/(shop)/products/[id]`) into route ids
/// (`/products/[id]`) and route ids into matcher patterns (`/products/:id`).

use super::pattern::{classify_segment, SegmentKind};

/// Pattern, parameter list and catch-all flag derived from a route id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedRoute {
    pub pattern: String,
    pub params: Vec<String>,
    pub catch_all: bool,
    pub dynamic_count: usize,
    pub depth: usize,
}

/// Fold accumulator; every method consumes and returns the state
#[derive(Default)]
struct ParseState {
    route: ParsedRoute,
    error: Option<String>,
}

impl ParseState {
    fn with_static_segment(mut self, segment: &str) -> Self {
        self.route.pattern.push('/');
        self.route.pattern.push_str(segment);
        self.route.depth += 1;
        self
    }

    fn with_param(mut self, name: String) -> Self {
        self.route.pattern.push_str("/:");
        self.route.pattern.push_str(&name);
        self.route.params.push(name);
        self.route.dynamic_count += 1;
        self.route.depth += 1;
        self
    }

    fn with_catch_all(mut self, name: String) -> Self {
        self.route.pattern.push_str("/*");
        self.route.pattern.push_str(&name);
        self.route.params.push(name);
        self.route.catch_all = true;
        self.route.depth += 1;
        self
    }

    fn fail(mut self, message: String) -> Self {
        if self.error.is_none() {
            self.error = Some(message);
        }
        self
    }

    fn finalize(mut self) -> Self {
        if self.route.pattern.is_empty() {
            self.route.pattern = "/".to_string();
        }
        self
    }
}

fn process_segment(state: ParseState, segment: &str) -> ParseState {
    if segment.is_empty() {
        return state;
    }

    if state.route.catch_all {
        return state.fail(format!(
            "segment '{}' follows a catch-all segment; catch-all must be last",
            segment
        ));
    }

    match classify_segment(segment) {
        SegmentKind::Static(text) => state.with_static_segment(&text),
        SegmentKind::Group(_) => state,
        SegmentKind::Dynamic(name) | SegmentKind::CatchAll(name) if name.is_empty() => {
            state.fail(format!("segment '{}' has an empty parameter name", segment))
        }
        SegmentKind::Dynamic(name) | SegmentKind::CatchAll(name)
            if state.route.params.contains(&name) =>
        {
            state.fail(format!("parameter '{}' appears more than once", name))
        }
        SegmentKind::Dynamic(name) => state.with_param(name),
        SegmentKind::CatchAll(name) => state.with_catch_all(name),
    }
}

/// Removes route-group segments from a directory id
///
/// # Examples
///
/// ```
/// use vellum_router::route::parser::route_id_from_dir;
///
/// assert_eq!(route_id_from_dir("/(marketing)/pricing"), "/pricing");
/// assert_eq!(route_id_from_dir("/(shop)"), "/");
/// assert_eq!(route_id_from_dir("/blog/[slug]"), "/blog/[slug]");
/// ```
pub fn route_id_from_dir(dir_id: &str) -> String {
    let kept: Vec<&str> = dir_id
        .split('/')
        .filter(|s| !s.is_empty() && !classify_segment(s).is_group())
        .collect();

    format!("/{}", kept.join("/"))
}

/// Parses a route id into its matcher pattern
///
/// Fails with a human-readable reason when a parameter name is empty or
/// repeated, or when a catch-all is not the last segment.
///
/// # Examples
///
/// ```
/// use vellum_router::route::parser::parse_route_id;
///
/// let parsed = parse_route_id("/blog/[slug]").unwrap();
/// assert_eq!(parsed.pattern, "/blog/:slug");
/// assert_eq!(parsed.params, vec!["slug"]);
///
/// assert!(parse_route_id("/docs/[...path]/edit").is_err());
/// ```
pub fn parse_route_id(id: &str) -> Result<ParsedRoute, String> {
    let state = id
        .split('/')
        .fold(ParseState::default(), process_segment)
        .finalize();

    match state.error {
        Some(reason) => Err(reason),
        None => Ok(state.route),
    }
}

/// Like [`parse_route_id`] but keeps whatever was parsed before an error
pub fn parse_route_id_lossy(id: &str) -> ParsedRoute {
    id.split('/')
        .fold(ParseState::default(), process_segment)
        .finalize()
        .route
}

/// Ranks a route for ordered enumeration (lower = more specific)
///
/// # Priority Order
///
/// 1. **Static routes** → 0
/// 2. **Dynamic routes** → 1-999
/// 3. **Catch-all routes** → 1000+
///
/// Matching itself never consults this number: the trie enforces the same
/// order segment by segment. It only keeps route listings and build reports in
/// the order a reader expects.
///
/// # Examples
///
/// ```
/// use vellum_router::route::parser::specificity;
///
/// assert_eq!(specificity(false, 0, 2), 0);
/// assert_eq!(specificity(false, 1, 2), 4);
/// assert_eq!(specificity(true, 0, 2), 1002);
/// ```
pub fn specificity(catch_all: bool, dynamic_count: usize, depth: usize) -> usize {
    if catch_all {
        1000 + depth
    } else if dynamic_count > 0 {
        dynamic_count + depth + 1
    } else {
        0
    }
}
