//! Inputs to the engine.
//!
//! - **Syntax trees**: the generic tree model external parsers hand over
//! - **Coverage profiles**: the counter text format, parsed and formatted
//! - **File filtering**: include/exclude files with glob patterns
//! - **Git**: change classification and blob contents of two revisions
//!
//! ## Example
//!
//! ```rust,ignore
//! use covdifflib::source::{FilterConfig, Profile};
//!
//! let profile = Profile::read("cover.out")?;
//! let filter = FilterConfig::new()
//!     .extension("go")
//!     .exclude("**/*_test.go")?;
//! ```

pub mod filter;
pub mod git;
pub mod profile;
pub mod tree;

pub use filter::{discover_files, resolve, FilterConfig};
pub use git::{change_details, GitSources};
pub use profile::{Mode, Profile, ProfileBlock};
pub use tree::{LineIndex, Span, SyntaxFile};
