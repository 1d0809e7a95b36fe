/// Route id and pattern handling
///
/// - [`pattern`] classifies single segments (directory names and pattern tokens)
/// - [`parser`] folds segments into patterns and ranks routes by specificity

pub mod parser;
pub mod pattern;

pub use parser::{parse_route_id, route_id_from_dir, specificity, ParsedRoute};
pub use pattern::{classify_segment, pattern_shape, PatternSegment, SegmentKind};
