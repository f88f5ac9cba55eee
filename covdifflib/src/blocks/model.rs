//! Block positions and identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A source range recorded by a coverage counter.
///
/// Lines and columns are 1-based; the end column points just past the last
/// byte of the block. Ordering compares start line, start column, end line
/// and end column in that order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Block {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Stable string key of this block
    pub fn id(&self) -> BlockId {
        BlockId(format!(
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        ))
    }

    /// Lines covered by the block, inclusive on both ends
    pub fn lines(&self) -> impl Iterator<Item = u32> {
        self.start_line..=self.end_line
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{},{}.{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// String key of a [`Block`], formatted as `"<sl>:<sc>-<el>:<ec>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

/// Functions are keyed by the id of their defining block
pub type FuncId = BlockId;

impl BlockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the block this id was made from
    pub fn parse(&self) -> Option<Block> {
        let (start, end) = self.0.split_once('-')?;
        let (sl, sc) = start.split_once(':')?;
        let (el, ec) = end.split_once(':')?;
        Some(Block::new(
            sl.parse().ok()?,
            sc.parse().ok()?,
            el.parse().ok()?,
            ec.parse().ok()?,
        ))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Block> for BlockId {
    fn from(block: Block) -> Self {
        block.id()
    }
}
