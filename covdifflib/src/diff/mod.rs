//! Diff engine
//!
//! Computes minimal edit scripts between unit sequences (text lines or
//! block signatures) and derives the range mapping that the annotation and
//! merge stages consume.
//!
//! ```rust
//! use covdifflib::diff::{range_mapping, split_lines, MyersBackend, RangeKind};
//!
//! let old = split_lines("a\nb\nc\n");
//! let new = split_lines("a\nx\nc\n");
//! let ranges = range_mapping(&MyersBackend, &old, &new).unwrap();
//!
//! assert_eq!(ranges.len(), 3);
//! assert_eq!(ranges[1].kind, RangeKind::Updated);
//! assert_eq!((ranges[1].old_start, ranges[1].old_end), (2, 3));
//! ```

pub mod backend;
pub mod external;
pub mod mapping;
pub mod myers;

pub use backend::{DiffBackend, MyersBackend};
pub use external::{ExternalDiffClient, ExternalDiffConfig};
pub use mapping::{
    block_mapping, for_each_line_mapping, line_changes, range_mapping, ranges_of, split_lines,
    unchanged_lines, BlockMapping, LineChange, LineChanges, LineRange, RangeKind,
};
pub use myers::{diff, edit_distance, OpKind, Operation};
