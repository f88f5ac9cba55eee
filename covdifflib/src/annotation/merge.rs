//! Combining project annotations computed by separate stages.

use tracing::debug;

use crate::annotation::model::ProjectAnnotation;

/// Merge every source into `dst`.
///
/// Types are unioned, the first commit seen is kept and files are merged
/// with [`FileAnnotation::merge`](crate::annotation::FileAnnotation::merge).
pub fn merge_annotations_into<'a, I>(dst: &mut ProjectAnnotation, sources: I)
where
    I: IntoIterator<Item = &'a ProjectAnnotation>,
{
    for src in sources {
        dst.types.union_with(&src.types);
        if dst.commit.is_none() {
            dst.commit = src.commit.clone();
        }
        for (path, file) in &src.files {
            match dst.files.get_mut(path) {
                Some(existing) => existing.merge(file),
                None => {
                    dst.files.insert(path.clone(), file.clone());
                }
            }
        }
    }
    debug!(files = dst.files.len(), "merged annotations");
}

/// Merge all sources into a fresh annotation
pub fn merge_annotations<'a, I>(sources: I) -> ProjectAnnotation
where
    I: IntoIterator<Item = &'a ProjectAnnotation>,
{
    let mut dst = ProjectAnnotation::new();
    merge_annotations_into(&mut dst, sources);
    dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::model::LineAnnotation;
    use crate::annotation::types::AnnotationType;
    use proptest::prelude::*;

    fn project(line: u32, changed: bool, labels: &[&str]) -> ProjectAnnotation {
        let mut p = ProjectAnnotation::with_types(&[AnnotationType::LineChanged]);
        let l = p.file_mut("a.go").line_mut(line);
        l.changed = changed;
        l.exec_labels = labels.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn test_merge_unions_types_and_files() {
        let a = project(1, true, &["x"]);
        let mut b = ProjectAnnotation::with_types(&[AnnotationType::Blocks]);
        b.file_mut("b.go").line_mut(2).empty = true;
        b.commit = Some("abc".into());

        let merged = merge_annotations([&a, &b]);
        assert!(merged.has(AnnotationType::LineChanged));
        assert!(merged.has(AnnotationType::Blocks));
        assert_eq!(merged.files.len(), 2);
        assert_eq!(merged.commit.as_deref(), Some("abc"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = project(3, true, &["x", "y"]);
        let mut dst = a.clone();
        merge_annotations_into(&mut dst, [&a]);
        assert_eq!(dst, a);
    }

    #[test]
    fn test_first_commit_wins() {
        let mut a = ProjectAnnotation::new();
        a.commit = Some("first".into());
        let mut b = ProjectAnnotation::new();
        b.commit = Some("second".into());
        assert_eq!(merge_annotations([&a, &b]).commit.as_deref(), Some("first"));
    }

    fn arb_line() -> impl Strategy<Value = (u32, bool, Vec<String>)> {
        (
            1u32..6,
            any::<bool>(),
            prop::collection::vec("[a-c]", 0..3),
        )
    }

    fn build(lines: &[(u32, bool, Vec<String>)]) -> ProjectAnnotation {
        let mut p = ProjectAnnotation::new();
        for (n, changed, labels) in lines {
            let other = LineAnnotation {
                changed: *changed,
                labels: labels.iter().cloned().collect(),
                exec_labels: labels.iter().cloned().collect(),
                coverage_labels: labels.iter().map(|l| (l.clone(), *changed)).collect(),
                ..Default::default()
            };
            p.file_mut("a.go").line_mut(*n).merge(&other);
        }
        p
    }

    proptest! {
        #[test]
        fn prop_or_merge_commutes(
            a in prop::collection::vec(arb_line(), 0..5),
            b in prop::collection::vec(arb_line(), 0..5),
        ) {
            let pa = build(&a);
            let pb = build(&b);
            prop_assert_eq!(merge_annotations([&pa, &pb]), merge_annotations([&pb, &pa]));
        }

        #[test]
        fn prop_or_merge_associates(
            a in prop::collection::vec(arb_line(), 0..4),
            b in prop::collection::vec(arb_line(), 0..4),
            c in prop::collection::vec(arb_line(), 0..4),
        ) {
            let (pa, pb, pc) = (build(&a), build(&b), build(&c));
            let left = merge_annotations([&merge_annotations([&pa, &pb]), &pc]);
            let right = merge_annotations([&pa, &merge_annotations([&pb, &pc])]);
            prop_assert_eq!(left, right);
        }
    }
}
