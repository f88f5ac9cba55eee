//! Repository diff classification and blob access.
//!
//! Classifies every file of the `to` revision (plus files deleted since
//! `from`) into a [`ChangeDetail`], and reads file contents of both
//! revisions for the merge engine.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, info};

use crate::annotation::ChangeDetail;
use crate::error::CovdiffError;
use crate::merge::SourceProvider;
use crate::Result;

type Entries = BTreeMap<String, gix::ObjectId>;

/// Blob contents of two revisions of a repository
pub struct GitSources {
    repo: gix::ThreadSafeRepository,
    from_entries: Entries,
    to_entries: Entries,
    details: BTreeMap<String, ChangeDetail>,
}

impl GitSources {
    /// Open the repository containing `repo_path` and index both revisions
    pub fn open(repo_path: impl AsRef<Path>, from: &str, to: &str) -> Result<Self> {
        let repo = gix::discover(repo_path.as_ref()).map_err(|e| {
            CovdiffError::GitError(format!("Failed to discover git repository: {}", e))
        })?;

        let from_tree = commit_tree(&repo, from)?;
        let to_tree = commit_tree(&repo, to)?;

        let mut from_entries = Entries::new();
        collect_tree_entries(&repo, &from_tree, "", &mut from_entries)?;
        let mut to_entries = Entries::new();
        collect_tree_entries(&repo, &to_tree, "", &mut to_entries)?;

        let changes = compute_tree_diff(&from_tree, &to_tree)?;
        let details = classify(&from_entries, &to_entries, changes);
        info!(
            from,
            to,
            files = details.len(),
            changed = details.values().filter(|d| d.content_changed).count(),
            "classified repository changes"
        );

        drop(from_tree);
        drop(to_tree);
        Ok(Self {
            repo: repo.into_sync(),
            from_entries,
            to_entries,
            details,
        })
    }

    /// Change detail of every file in `to`, plus deleted files
    pub fn change_details(&self) -> &BTreeMap<String, ChangeDetail> {
        &self.details
    }

    /// Paths of every file in the `to` revision
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.to_entries.keys().map(String::as_str)
    }

    fn read(&self, entries: &Entries, path: &str) -> Result<Option<String>> {
        match entries.get(path) {
            Some(oid) => read_blob(&self.repo.to_thread_local(), *oid).map(Some),
            None => Ok(None),
        }
    }
}

impl SourceProvider for GitSources {
    fn old_source(&self, path: &str) -> Result<Option<String>> {
        self.read(&self.from_entries, path)
    }

    fn new_source(&self, path: &str) -> Result<Option<String>> {
        self.read(&self.to_entries, path)
    }
}

/// Classify the changes between two revisions of the repository at `repo_path`
pub fn change_details(
    repo_path: impl AsRef<Path>,
    from: &str,
    to: &str,
) -> Result<BTreeMap<String, ChangeDetail>> {
    Ok(GitSources::open(repo_path, from, to)?.details)
}

/// One entry of a tree diff
#[derive(Debug)]
enum TreeChange {
    Added(String),
    Deleted(String),
    Modified(String),
    Renamed {
        from: String,
        to: String,
        content_changed: bool,
    },
}

fn classify(from: &Entries, to: &Entries, changes: Vec<TreeChange>) -> BTreeMap<String, ChangeDetail> {
    let mut details: BTreeMap<String, ChangeDetail> = to
        .keys()
        .map(|path| (path.clone(), ChangeDetail::default()))
        .collect();
    let mut added = BTreeSet::new();
    let mut deleted = BTreeSet::new();

    for change in changes {
        match change {
            TreeChange::Added(path) => {
                added.insert(path);
            }
            TreeChange::Deleted(path) => {
                deleted.insert(path);
            }
            TreeChange::Modified(path) => {
                details.insert(path, ChangeDetail::modified());
            }
            TreeChange::Renamed {
                from,
                to,
                content_changed,
            } => {
                details.insert(to, ChangeDetail::renamed(from, content_changed));
            }
        }
    }

    // pair additions and deletions of identical blobs the tree diff left apart
    for path in &added {
        let oid = to.get(path);
        let source = deleted
            .iter()
            .find(|old| from.get(*old) == oid && oid.is_some())
            .cloned();
        let detail = match source {
            Some(old) => {
                deleted.remove(&old);
                debug!(from = %old, to = %path, "paired identical blobs as rename");
                ChangeDetail::renamed(old, false)
            }
            None => ChangeDetail::new_file(),
        };
        details.insert(path.clone(), detail);
    }
    for path in deleted {
        details.insert(
            path,
            ChangeDetail {
                deleted: true,
                content_changed: true,
                ..Default::default()
            },
        );
    }
    details
}

fn commit_tree<'repo>(repo: &'repo gix::Repository, reference: &str) -> Result<gix::Tree<'repo>> {
    let id = repo
        .rev_parse_single(reference.as_bytes())
        .map_err(|e| CovdiffError::GitError(format!("Failed to resolve '{}': {}", reference, e)))?
        .detach();
    let commit = repo.find_commit(id).map_err(|e| {
        CovdiffError::GitError(format!("Failed to find commit '{}': {}", reference, e))
    })?;
    commit.tree().map_err(|e| {
        CovdiffError::GitError(format!("Failed to get tree for '{}': {}", reference, e))
    })
}

/// Recursively collect all blob entries from a tree
fn collect_tree_entries(
    repo: &gix::Repository,
    tree: &gix::Tree<'_>,
    prefix: &str,
    entries: &mut Entries,
) -> Result<()> {
    for entry in tree.iter() {
        let entry = entry
            .map_err(|e| CovdiffError::GitError(format!("Failed to read tree entry: {}", e)))?;

        let name = entry.filename().to_string();
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        if entry.mode().is_blob() {
            entries.insert(path, entry.oid().to_owned());
        } else if entry.mode().is_tree() {
            let subtree = repo
                .find_object(entry.oid())
                .map_err(|e| CovdiffError::GitError(format!("Failed to find tree: {}", e)))?
                .try_into_tree()
                .map_err(|_| CovdiffError::GitError("Object is not a tree".to_string()))?;
            collect_tree_entries(repo, &subtree, &path, entries)?;
        }
    }
    Ok(())
}

fn compute_tree_diff(from_tree: &gix::Tree<'_>, to_tree: &gix::Tree<'_>) -> Result<Vec<TreeChange>> {
    use gix::object::tree::diff::Action;

    let mut changes = Vec::new();

    from_tree
        .changes()
        .map_err(|e| CovdiffError::GitError(format!("Failed to get tree changes: {}", e)))?
        .options(|opts| {
            opts.track_path();
        })
        .for_each_to_obtain_tree(to_tree, |change| {
            use gix::object::tree::diff::Change;

            let tree_change = match change {
                Change::Addition {
                    entry_mode,
                    location,
                    ..
                } if entry_mode.is_blob() => Some(TreeChange::Added(location.to_string())),
                Change::Deletion {
                    entry_mode,
                    location,
                    ..
                } if entry_mode.is_blob() => Some(TreeChange::Deleted(location.to_string())),
                Change::Modification {
                    previous_entry_mode,
                    entry_mode,
                    location,
                    ..
                } if entry_mode.is_blob() && previous_entry_mode.is_blob() => {
                    Some(TreeChange::Modified(location.to_string()))
                }
                Change::Rewrite {
                    source_location,
                    source_id,
                    entry_mode,
                    id,
                    location,
                    copy,
                    ..
                } if entry_mode.is_blob() => {
                    if copy {
                        Some(TreeChange::Added(location.to_string()))
                    } else {
                        Some(TreeChange::Renamed {
                            from: source_location.to_string(),
                            to: location.to_string(),
                            content_changed: source_id.detach() != id.detach(),
                        })
                    }
                }
                _ => None,
            };

            if let Some(tc) = tree_change {
                changes.push(tc);
            }
            Ok::<_, std::convert::Infallible>(Action::Continue)
        })
        .map_err(|e| CovdiffError::GitError(format!("Failed to compute tree diff: {}", e)))?;

    Ok(changes)
}

/// Read a blob's content as a UTF-8 string
fn read_blob(repo: &gix::Repository, oid: gix::ObjectId) -> Result<String> {
    let object = repo
        .find_object(oid)
        .map_err(|e| CovdiffError::GitError(format!("Failed to find object {}: {}", oid, e)))?;

    let blob = object
        .try_into_blob()
        .map_err(|_| CovdiffError::GitError(format!("Object {} is not a blob", oid)))?;

    Ok(String::from_utf8_lossy(&blob.data).into_owned())
}
