//! Coverage profile text format.
//!
//! ```text
//! mode: count
//! pkg/file.go:12.34,14.2 3 1
//! ```
//!
//! Blocks keep the order in which they appear; counters of one file are
//! positional, so reordering would break merging.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::blocks::Block;
use crate::error::CovdiffError;
use crate::Result;

/// Counter mode named in the profile header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Set,
    #[default]
    Count,
    Atomic,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Set => "set",
            Mode::Count => "count",
            Mode::Atomic => "atomic",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "set" => Ok(Mode::Set),
            "count" => Ok(Mode::Count),
            "atomic" => Ok(Mode::Atomic),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// One counter line of a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBlock {
    pub file: String,
    pub block: Block,
    pub num_stmts: u32,
    pub count: u64,
}

impl ProfileBlock {
    pub fn format_with_count(&self, count: u64) -> String {
        format!("{}:{} {} {}", self.file, self.block, self.num_stmts, count)
    }
}

impl fmt::Display for ProfileBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with_count(self.count))
    }
}

/// A parsed coverage profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub mode: Mode,
    pub blocks: Vec<ProfileBlock>,
}

/// `<file>:<sl>.<sc>,<el>.<ec> <num_stmts> <count>`
const BLOCK_PATTERN: &str = r"^(.+):(\d+)\.(\d+),(\d+)\.(\d+) (\d+) (\d+)$";

fn number<T: FromStr>(value: &str, what: &str, line: usize) -> Result<T> {
    value.parse().map_err(|_| CovdiffError::ProfileParse {
        line,
        message: format!("{} out of range: {}", what, value),
    })
}

impl Profile {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            blocks: Vec::new(),
        }
    }

    /// Parse profile text. Blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().enumerate();
        let (_, header) = lines.next().ok_or_else(|| CovdiffError::ProfileParse {
            line: 1,
            message: "missing mode line".to_string(),
        })?;
        let mode = header
            .strip_prefix("mode: ")
            .ok_or_else(|| CovdiffError::ProfileParse {
                line: 1,
                message: format!("invalid mode line: {}", header),
            })?
            .trim()
            .parse::<Mode>()
            .map_err(|message| CovdiffError::ProfileParse { line: 1, message })?;

        let re = Regex::new(BLOCK_PATTERN).map_err(|e| CovdiffError::ProfileParse {
            line: 0,
            message: e.to_string(),
        })?;
        let mut blocks = Vec::new();
        for (i, line) in lines {
            let lineno = i + 1;
            if line.trim().is_empty() {
                continue;
            }
            let caps = re
                .captures(line)
                .ok_or_else(|| CovdiffError::ProfileParse {
                    line: lineno,
                    message: format!("invalid block line: {}", line),
                })?;
            blocks.push(ProfileBlock {
                file: caps[1].to_string(),
                block: Block::new(
                    number(&caps[2], "start line", lineno)?,
                    number(&caps[3], "start column", lineno)?,
                    number(&caps[4], "end line", lineno)?,
                    number(&caps[5], "end column", lineno)?,
                ),
                num_stmts: number(&caps[6], "statement count", lineno)?,
                count: number(&caps[7], "count", lineno)?,
            });
        }
        Ok(Self { mode, blocks })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| CovdiffError::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Render the profile. With `normalize`, set-mode counts above one are
    /// written as one.
    pub fn format(&self, normalize: bool) -> String {
        let mut out = format!("mode: {}\n", self.mode);
        for block in &self.blocks {
            let count = if normalize && self.mode == Mode::Set {
                block.count.min(1)
            } else {
                block.count
            };
            out.push_str(&block.format_with_count(count));
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: impl AsRef<Path>, normalize: bool) -> Result<()> {
        std::fs::write(path, self.format(normalize))?;
        Ok(())
    }

    /// Clamp set-mode counts to 0/1 in place
    pub fn normalize(&mut self) {
        if self.mode == Mode::Set {
            for block in &mut self.blocks {
                block.count = block.count.min(1);
            }
        }
    }

    /// Counts per file, in block order
    pub fn counters(&self) -> BTreeMap<String, Vec<u64>> {
        let mut counters: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for block in &self.blocks {
            counters
                .entry(block.file.clone())
                .or_default()
                .push(block.count);
        }
        counters
    }

    /// Blocks per file, in block order
    pub fn file_blocks(&self) -> BTreeMap<String, Vec<&ProfileBlock>> {
        let mut files: BTreeMap<String, Vec<&ProfileBlock>> = BTreeMap::new();
        for block in &self.blocks {
            files.entry(block.file.clone()).or_default().push(block);
        }
        files
    }

    /// Replace every count with the positional value from `counters`.
    ///
    /// Fails unless `counters` has exactly one value per block of every file.
    pub fn reset_counters(&mut self, counters: &BTreeMap<String, Vec<u64>>) -> Result<()> {
        let expected: BTreeMap<String, usize> = self
            .counters()
            .into_iter()
            .map(|(file, c)| (file, c.len()))
            .collect();
        for (file, len) in &expected {
            let given = counters.get(file).map_or(0, |c| c.len());
            if given != *len {
                return Err(CovdiffError::CounterCountMismatch {
                    file: file.clone(),
                    old: *len,
                    new: given,
                });
            }
        }
        if let Some(extra) = counters.keys().find(|f| !expected.contains_key(*f)) {
            return Err(CovdiffError::CounterCountMismatch {
                file: extra.clone(),
                old: 0,
                new: counters[extra].len(),
            });
        }

        let mut next: BTreeMap<String, usize> = BTreeMap::new();
        for block in &mut self.blocks {
            let idx = next.entry(block.file.clone()).or_default();
            block.count = counters[&block.file][*idx];
            *idx += 1;
        }
        Ok(())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}
