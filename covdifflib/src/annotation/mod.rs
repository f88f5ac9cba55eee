//! Annotations attached to lines, blocks, functions and files.
//!
//! A [`ProjectAnnotation`] is assembled from single-kind annotations produced
//! by the [`load`] functions and then enriched by the derivations in
//! [`crate::compute`]. Its [`AnnotationTypes`] set records which kinds are
//! present.

pub mod comments;
pub mod load;
pub mod merge;
pub mod model;
pub mod types;

pub use comments::{func_comments, line_comments, parse_directive, Directive};
pub use merge::{merge_annotations, merge_annotations_into};
pub use model::{
    BlockAnnotation, ChangeDetail, CodeAnnotation, CodeComment, CommentLabel, FileAnnotation,
    FuncAnnotation, LineAnnotation, LineNum, ProjectAnnotation, Remark,
};
pub use types::{AnnotationType, AnnotationTypes};
