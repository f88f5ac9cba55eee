//! Derivations between annotation granularities.
//!
//! Every derivation checks the kinds it depends on through
//! [`ProjectAnnotation::require`](crate::annotation::ProjectAnnotation::require)
//! and records the kinds it produced when done. Nothing runs implicitly:
//! callers (or [`crate::summary`]) decide the order.
//!
//! ```rust
//! use covdifflib::annotation::{AnnotationType, BlockAnnotation, ProjectAnnotation};
//! use covdifflib::blocks::Block;
//! use covdifflib::compute;
//!
//! let block = Block::new(1, 12, 3, 2);
//! let mut project = ProjectAnnotation::with_types(&[AnnotationType::Blocks]);
//! let mut annotation = BlockAnnotation::new(block);
//! annotation.exec_labels.insert(String::new());
//! project.file_mut("a.go").blocks.insert(block.id(), annotation);
//!
//! compute::block_id_for_line(&mut project).unwrap();
//! compute::exec_labels_block_to_line(&mut project).unwrap();
//! assert!(project.files["a.go"].lines[&2].exec_labels.contains(""));
//! ```

pub mod carry;
pub mod exclusion;
pub mod labels;
pub mod lines;

pub use carry::{carry_exec_labels, carry_remarks, CarryOptions};
pub use exclusion::{code_excluded_for_func, code_excluded_func_to_line};
pub use labels::{
    coverage_labels_for_line, labels_from_comments, labels_line_to_func, LabelOption,
    LabelOptions, MatchMode,
};
pub use lines::{
    block_id_for_line, block_id_for_line_with, changed_for_line_from_changes,
    changed_line_to_func, exec_labels_block_to_line, func_id_for_line, func_id_for_line_with,
    uncoverable_for_line, Precedence,
};
