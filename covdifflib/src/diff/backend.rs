//! Pluggable line diff backends.

use crate::diff::mapping::{line_changes, LineChange};
use crate::diff::myers::diff;
use crate::Result;

/// Computes line changes between two unit sequences.
///
/// Implementations must produce a minimal edit script, prefer deletions
/// over insertions when alignments tie, and report 1-based ranges.
pub trait DiffBackend: Send + Sync {
    fn line_changes(&self, old: &[&str], new: &[&str]) -> Result<Vec<LineChange>>;
}

/// In-process Myers diff
#[derive(Debug, Clone, Copy, Default)]
pub struct MyersBackend;

impl DiffBackend for MyersBackend {
    fn line_changes(&self, old: &[&str], new: &[&str]) -> Result<Vec<LineChange>> {
        Ok(line_changes(&diff(old, new)))
    }
}

impl<T: DiffBackend + ?Sized> DiffBackend for &T {
    fn line_changes(&self, old: &[&str], new: &[&str]) -> Result<Vec<LineChange>> {
        (**self).line_changes(old, new)
    }
}
