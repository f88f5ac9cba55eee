//! Code excluded from coverage by comment directives.

use crate::annotation::{AnnotationType, CodeAnnotation, ProjectAnnotation};
use crate::Result;

/// Exclude functions whose comment block carries an exclusion directive.
///
/// A function whose header line is excluded by a trailing comment is
/// flagged with `first_line_excluded`.
pub fn code_excluded_for_func(p: &mut ProjectAnnotation) -> Result<()> {
    p.require("code_excluded_for_func", &[AnnotationType::FuncCodeComments])?;
    for file in p.files.values_mut() {
        for func in file.funcs.values_mut() {
            if let Some(code) = func.code.as_mut().filter(|c| !c.comments.is_empty()) {
                code.excluded = code.has_exclusion_comment();
            }
            if file
                .lines
                .get(&func.block.start_line)
                .is_some_and(|line| line.code_excluded())
            {
                func.first_line_excluded = true;
            }
        }
    }
    p.set(AnnotationType::FuncCodeExcluded);
    Ok(())
}

/// Exclude every line owned by an excluded function
pub fn code_excluded_func_to_line(p: &mut ProjectAnnotation) -> Result<()> {
    p.require(
        "code_excluded_func_to_line",
        &[
            AnnotationType::FuncCodeExcluded,
            AnnotationType::LineFuncId,
            AnnotationType::FileFuncs,
        ],
    )?;
    for file in p.files.values_mut() {
        for line in file.lines.values_mut() {
            let excluded = line
                .func_id
                .as_ref()
                .and_then(|id| file.funcs.get(id))
                .is_some_and(|f| f.code_excluded());
            if excluded {
                line.code
                    .get_or_insert_with(CodeAnnotation::default)
                    .excluded = true;
            }
        }
    }
    p.set(AnnotationType::LineCodeExcluded);
    Ok(())
}
