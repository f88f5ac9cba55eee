//! Basic blocks
//!
//! This module handles the first stage of the pipeline: turning a parsed file
//! into the ordered list of basic blocks that coverage counters are recorded
//! against, plus the functions and closures that own them.
//!
//! # Example
//!
//! ```rust,ignore
//! use covdifflib::blocks::{extract_blocks, collect_funcs};
//!
//! let blocks = extract_blocks(&tree, &content)?;
//! let funcs = collect_funcs(&tree, &content);
//! ```

pub mod extract;
pub mod funcs;
pub mod model;

pub use extract::{
    block_signatures, extract_blocks, normalize_whitespace, range_signature, visit, BasicBlock,
    BlockVisitor, ExtractOptions,
};
pub use funcs::{collect_funcs, FuncInfo};
pub use model::{Block, BlockId, FuncId};
