//! Cross-commit counter merging.
//!
//! Counters recorded against an older revision are added into the counters
//! of the current revision. Unchanged files add position by position;
//! changed files go through a block mapping computed from the text of each
//! block, so only blocks that survived unchanged inherit old counts.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blocks::{range_signature, Block};
use crate::diff::{block_mapping, DiffBackend};
use crate::error::CovdiffError;
use crate::source::profile::{Mode, Profile, ProfileBlock};
use crate::source::tree::LineIndex;
use crate::Result;

/// Counters of one file, positional with its blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum Counters {
    Int(Vec<u64>),
    /// One count per label
    Label(Vec<BTreeMap<String, u64>>),
}

impl Counters {
    pub fn len(&self) -> usize {
        match self {
            Counters::Int(c) => c.len(),
            Counters::Label(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add counter `j` of `other` into counter `i`
    pub fn add_at(&mut self, file: &str, i: usize, other: &Counters, j: usize) -> Result<()> {
        match (self, other) {
            (Counters::Int(dst), Counters::Int(src)) => {
                if let (Some(d), Some(s)) = (dst.get_mut(i), src.get(j)) {
                    *d = d.saturating_add(*s);
                }
                Ok(())
            }
            (Counters::Label(dst), Counters::Label(src)) => {
                if let (Some(d), Some(s)) = (dst.get_mut(i), src.get(j)) {
                    for (label, count) in s {
                        let c = d.entry(label.clone()).or_default();
                        *c = c.saturating_add(*count);
                    }
                }
                Ok(())
            }
            _ => Err(CovdiffError::CounterKindMismatch(file.to_string())),
        }
    }

    /// Clamp every count to 0 or 1
    pub fn normalize(&mut self) {
        match self {
            Counters::Int(c) => c.iter_mut().for_each(|v| *v = (*v).min(1)),
            Counters::Label(c) => c
                .iter_mut()
                .flat_map(|m| m.values_mut())
                .for_each(|v| *v = (*v).min(1)),
        }
    }
}

/// Position and statement count of a counted block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterBlock {
    pub block: Block,
    pub num_stmts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounters {
    pub blocks: Vec<CounterBlock>,
    pub counters: Counters,
}

/// Counters of a whole profile, grouped by file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterProfile {
    pub mode: Mode,
    pub files: BTreeMap<String, FileCounters>,
}

impl CounterProfile {
    pub fn from_profile(profile: &Profile) -> Self {
        let mut files: BTreeMap<String, (Vec<CounterBlock>, Vec<u64>)> = BTreeMap::new();
        for pb in &profile.blocks {
            let (blocks, counts) = files.entry(pb.file.clone()).or_default();
            blocks.push(CounterBlock {
                block: pb.block,
                num_stmts: pb.num_stmts,
            });
            counts.push(pb.count);
        }
        Self {
            mode: profile.mode,
            files: files
                .into_iter()
                .map(|(file, (blocks, counts))| {
                    (
                        file,
                        FileCounters {
                            blocks,
                            counters: Counters::Int(counts),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Back to the text format, files in path order.
    ///
    /// Per-label counters are written as their total.
    pub fn into_profile(self) -> Profile {
        let mut profile = Profile::new(self.mode);
        for (file, fc) in self.files {
            let counts: Vec<u64> = match fc.counters {
                Counters::Int(c) => c,
                Counters::Label(c) => c.iter().map(|m| m.values().sum()).collect(),
            };
            for (cb, count) in fc.blocks.into_iter().zip(counts) {
                profile.blocks.push(ProfileBlock {
                    file: file.clone(),
                    block: cb.block,
                    num_stmts: cb.num_stmts,
                    count,
                });
            }
        }
        profile
    }
}

/// How a file of the new profile relates to the old revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChange {
    pub is_new: bool,
    pub content_changed: bool,
    /// Path in the old revision when it differs from the new one
    pub old_file: Option<String>,
}

impl FileChange {
    pub fn new_file() -> Self {
        Self {
            is_new: true,
            ..Default::default()
        }
    }

    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn modified() -> Self {
        Self {
            content_changed: true,
            ..Default::default()
        }
    }

    pub fn renamed(from: impl Into<String>, content_changed: bool) -> Self {
        Self {
            is_new: false,
            content_changed,
            old_file: Some(from.into()),
        }
    }
}

/// File contents of the old and new revision
pub trait SourceProvider: Send + Sync {
    fn old_source(&self, path: &str) -> Result<Option<String>>;
    fn new_source(&self, path: &str) -> Result<Option<String>>;
}

/// In-memory sources, mostly for tests and callers that already hold contents
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    pub old: BTreeMap<String, String>,
    pub new: BTreeMap<String, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_old(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.old.insert(path.into(), content.into());
        self
    }

    pub fn with_new(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.new.insert(path.into(), content.into());
        self
    }
}

impl SourceProvider for MemorySources {
    fn old_source(&self, path: &str) -> Result<Option<String>> {
        Ok(self.old.get(path).cloned())
    }

    fn new_source(&self, path: &str) -> Result<Option<String>> {
        Ok(self.new.get(path).cloned())
    }
}

/// Options for [`Merger`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Fail instead of keeping new counters when a non-new file has no old counters
    pub require_old_files: bool,
}

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_old_files(mut self, require: bool) -> Self {
        self.require_old_files = require;
        self
    }
}

pub struct Merger<'a> {
    backend: &'a dyn DiffBackend,
    sources: &'a dyn SourceProvider,
    options: MergeOptions,
}

impl<'a> Merger<'a> {
    pub fn new(
        backend: &'a dyn DiffBackend,
        sources: &'a dyn SourceProvider,
        options: MergeOptions,
    ) -> Self {
        Self {
            backend,
            sources,
            options,
        }
    }

    /// Merge `old` into `new`, file by file in parallel.
    ///
    /// In set mode the merged counts are clamped to 0/1.
    pub fn merge<F>(
        &self,
        old: &CounterProfile,
        new: &CounterProfile,
        file_change_of: F,
    ) -> Result<CounterProfile>
    where
        F: Fn(&str) -> Result<FileChange> + Sync,
    {
        if old.mode != new.mode {
            warn!(old = %old.mode, new = %new.mode, "merging profiles with different modes");
        }
        let merged: Vec<(String, FileCounters)> = new
            .files
            .par_iter()
            .map(|(path, fc)| {
                let change = file_change_of(path)?;
                let mut counters = self.merge_file(path, fc, old, &change)?;
                if new.mode == Mode::Set {
                    counters.normalize();
                }
                Ok((
                    path.clone(),
                    FileCounters {
                        blocks: fc.blocks.clone(),
                        counters,
                    },
                ))
            })
            .collect::<Result<_>>()?;

        info!(files = merged.len(), "merged counter profiles");
        Ok(CounterProfile {
            mode: new.mode,
            files: merged.into_iter().collect(),
        })
    }

    fn merge_file(
        &self,
        path: &str,
        new: &FileCounters,
        old: &CounterProfile,
        change: &FileChange,
    ) -> Result<Counters> {
        if change.is_new {
            debug!(file = path, "new file keeps its counters");
            return Ok(new.counters.clone());
        }
        let old_path = change.old_file.as_deref().unwrap_or(path);
        let old_fc = old.files.get(old_path).filter(|fc| !fc.counters.is_empty());
        let Some(old_fc) = old_fc else {
            if self.options.require_old_files {
                return Err(CovdiffError::MissingOldFile(old_path.to_string()));
            }
            warn!(file = path, old = old_path, "no old counters, keeping new ones");
            return Ok(new.counters.clone());
        };

        let mut merged = new.counters.clone();
        if !change.content_changed {
            if old_fc.counters.len() != new.counters.len() {
                return Err(CovdiffError::CounterCountMismatch {
                    file: path.to_string(),
                    old: old_fc.counters.len(),
                    new: new.counters.len(),
                });
            }
            for i in 0..merged.len() {
                merged.add_at(path, i, &old_fc.counters, i)?;
            }
            debug!(file = path, counters = merged.len(), "added unchanged counters");
            return Ok(merged);
        }

        let old_src = self.sources.old_source(old_path)?;
        let new_src = self.sources.new_source(path)?;
        let (Some(old_src), Some(new_src)) = (old_src, new_src) else {
            warn!(file = path, "missing source contents, keeping new counters");
            return Ok(merged);
        };
        let old_sigs = signatures(&old_src, &old_fc.blocks);
        let new_sigs = signatures(&new_src, &new.blocks);
        let mapping = block_mapping(self.backend, &old_sigs, &new_sigs)?;
        for (&n, &o) in &mapping {
            merged.add_at(path, n, &old_fc.counters, o)?;
        }
        debug!(
            file = path,
            mapped = mapping.len(),
            total = merged.len(),
            "mapped changed file counters"
        );
        Ok(merged)
    }
}

fn signatures(content: &str, blocks: &[CounterBlock]) -> Vec<String> {
    let index = LineIndex::new(content);
    blocks
        .iter()
        .map(|cb| range_signature(content, &index, &cb.block))
        .collect()
}
