//! # covdifflib
//!
//! An incremental coverage annotation engine: it tells how much of a code
//! base, and how much of what changed since a base revision, is covered.
//!
//! ## Overview
//!
//! The engine consumes three things produced elsewhere: a syntax tree plus
//! the content of each file, a coverage profile, and the classification of
//! files changed between two revisions. From them it builds a
//! [`ProjectAnnotation`] and reduces it to per-label summaries.
//!
//! - **Blocks** ([`blocks`]): split statement lists into basic blocks
//! - **Diff** ([`diff`]): Myers edit scripts and line range mappings
//! - **Compute** ([`compute`]): derive line and function data from blocks,
//!   changes and comment directives
//! - **Merge** ([`merge`]): carry counters recorded on an older revision
//!   over to the current one
//! - **Summary** ([`summary`]): total and incremental coverage per label
//!
//! ## Example
//!
//! ```rust
//! use covdifflib::annotation::{load, ChangeDetail};
//! use covdifflib::diff::MyersBackend;
//! use covdifflib::pipeline::{annotate_with, AnnotateOptions, FileInput};
//! use covdifflib::source::Profile;
//! use covdifflib::summary::{summarize, SummaryOptions};
//!
//! let old = "package a\n\nfunc f() {\n\tg()\n}\n";
//! let new = "package a\n\nfunc f() {\n\tg()\n\th()\n}\n";
//! let input = FileInput::new("a.go", new)
//!     .change(ChangeDetail::modified())
//!     .old_content(old);
//!
//! // the block of f is executed
//! let profile = Profile::parse("mode: set\na.go:3.10,6.2 2 1\n").unwrap();
//! let exec = load::from_profile(&profile, &load::ProfileLoadOptions::new());
//!
//! let mut project =
//!     annotate_with(vec![input], vec![exec], &AnnotateOptions::new(), &MyersBackend).unwrap();
//! let summaries = summarize(&mut project, &SummaryOptions::new()).unwrap();
//!
//! let detail = &summaries[""].detail;
//! assert_eq!(detail.total.value, 1.0);
//! assert_eq!(detail.incremental.total, 1);
//! ```

pub mod annotation;
pub mod blocks;
pub mod compute;
pub mod diff;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod source;
pub mod summary;

pub use annotation::{
    merge_annotations, merge_annotations_into, AnnotationType, AnnotationTypes, ChangeDetail,
    FileAnnotation, FuncAnnotation, LineAnnotation, ProjectAnnotation,
};
pub use blocks::{block_signatures, collect_funcs, extract_blocks, Block, BlockId, FuncInfo};
pub use diff::{range_mapping, DiffBackend, ExternalDiffClient, LineRange, MyersBackend, RangeKind};
pub use error::CovdiffError;
pub use merge::{CounterProfile, Counters, FileChange, MergeOptions, Merger, SourceProvider};
pub use pipeline::{annotate, annotate_with, AnnotateOptions, FileInput};
pub use source::tree::{BlockStmt, Decl, FuncDecl, Span, Stmt, SyntaxFile};
pub use source::{FilterConfig, GitSources, Mode, Profile};
pub use summary::{summarize, Summary, SummaryOptions};

/// Result type for covdifflib operations
pub type Result<T> = std::result::Result<T, CovdiffError>;
