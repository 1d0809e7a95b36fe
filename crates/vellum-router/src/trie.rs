//! Segment trie shared by the dev router and the production matcher
//!
//! Each node owns three kinds of outgoing edge, consulted in a fixed order
//! while matching:
//!
//! 1. static children, keyed by literal segment text
//! 2. a single dynamic child (`:name`)
//! 3. a catch-all terminal (`*name`) that swallows the remaining segments
//!
//! Dynamic values are pushed while descending and popped again when the
//! branch below them dead-ends, so a failed parameter branch never leaks a
//! binding into a catch-all or sibling match.

use std::collections::HashMap;
use thiserror::Error;

use crate::path::split_segments;
use crate::route::pattern::{parse_pattern_segment, PatternSegment};
use crate::Params;

/// Reasons a pattern cannot be inserted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    #[error("a catch-all segment must be the last segment")]
    CatchAllNotLast,

    #[error("another entry already occupies this pattern")]
    Occupied,
}

/// Payload stored where a pattern ends, with the parameter names bound on
/// the way down in pattern order
#[derive(Debug, Clone)]
struct Terminal<T> {
    names: Vec<String>,
    value: T,
}

#[derive(Debug, Clone)]
struct Node<T> {
    static_children: HashMap<String, Node<T>>,
    dynamic_child: Option<Box<Node<T>>>,
    catch_all: Option<Terminal<T>>,
    entry: Option<Terminal<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            static_children: HashMap::new(),
            dynamic_child: None,
            catch_all: None,
            entry: None,
        }
    }
}

/// Path trie keyed by matcher patterns (`/blog/:slug`, `/docs/*path`)
///
/// # Examples
///
/// ```
/// use vellum_router::trie::SegmentTrie;
///
/// let mut trie = SegmentTrie::new();
/// trie.insert("/docs", "docs").unwrap();
/// trie.insert("/docs/*path", "docs-tail").unwrap();
///
/// let (value, params) = trie.find("/docs/a/b/c").unwrap();
/// assert_eq!(*value, "docs-tail");
/// assert_eq!(params["path"], "a/b/c");
///
/// let (value, params) = trie.find("/docs/").unwrap();
/// assert_eq!(*value, "docs");
/// assert!(params.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct SegmentTrie<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Default for SegmentTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SegmentTrie<T> {
    pub fn new() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `value` at `pattern`
    ///
    /// Parameter names never distinguish two patterns: `/a/:x` and `/a/:y`
    /// share a slot, and the second insert fails with [`TrieError::Occupied`].
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<(), TrieError> {
        let segments = split_segments(pattern);
        let mut names = Vec::new();
        let mut node = &mut self.root;

        for (i, segment) in segments.iter().enumerate() {
            match parse_pattern_segment(segment) {
                PatternSegment::Static(text) => {
                    node = node.static_children.entry(text.to_string()).or_default();
                }
                PatternSegment::Param(name) => {
                    names.push(name.to_string());
                    node = &mut **node.dynamic_child.get_or_insert_with(Box::default);
                }
                PatternSegment::CatchAll(name) => {
                    if i + 1 != segments.len() {
                        return Err(TrieError::CatchAllNotLast);
                    }
                    if node.catch_all.is_some() {
                        return Err(TrieError::Occupied);
                    }
                    names.push(name.to_string());
                    node.catch_all = Some(Terminal { names, value });
                    self.len += 1;
                    return Ok(());
                }
            }
        }

        if node.entry.is_some() {
            return Err(TrieError::Occupied);
        }
        node.entry = Some(Terminal { names, value });
        self.len += 1;
        Ok(())
    }

    /// Resolves a request path to its entry and extracted parameters
    ///
    /// Empty segments are ignored, so trailing and doubled slashes match the
    /// same entry as the canonical path.
    pub fn find(&self, path: &str) -> Option<(&T, Params)> {
        let segments = split_segments(path);
        let mut values = Vec::with_capacity(segments.len());
        let terminal = walk(&self.root, &segments, 0, &mut values)?;

        let params = terminal
            .names
            .iter()
            .cloned()
            .zip(values)
            .collect::<Params>();

        Some((&terminal.value, params))
    }
}

fn walk<'t, T>(
    node: &'t Node<T>,
    segments: &[&str],
    index: usize,
    values: &mut Vec<String>,
) -> Option<&'t Terminal<T>> {
    if index == segments.len() {
        return node.entry.as_ref();
    }

    let segment = segments[index];

    if let Some(child) = node.static_children.get(segment) {
        if let Some(found) = walk(child, segments, index + 1, values) {
            return Some(found);
        }
    }

    if let Some(child) = node.dynamic_child.as_deref() {
        values.push(segment.to_string());
        if let Some(found) = walk(child, segments, index + 1, values) {
            return Some(found);
        }
        values.pop();
    }

    // Reaching here means index < len, so the tail is never empty.
    let terminal = node.catch_all.as_ref()?;
    values.push(segments[index..].join("/"));
    Some(terminal)
}
