//! File filtering and discovery with glob pattern support.
//!
//! Paths handled here are relative to a repository or profile root and
//! always use `/` as separator, matching the paths found in coverage
//! profiles and repository diffs.

use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::CovdiffError;
use crate::Result;

/// Configuration for file filtering.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Glob patterns to include (if empty, include everything)
    pub include: Vec<Pattern>,
    /// Glob patterns to exclude
    pub exclude: Vec<Pattern>,
    /// File extensions to keep, without the dot (if empty, keep all)
    pub extensions: Vec<String>,
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| CovdiffError::InvalidGlob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

impl FilterConfig {
    /// Create a filter that accepts every path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.include.push(compile(pattern)?);
        Ok(self)
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.exclude.push(compile(pattern)?);
        Ok(self)
    }

    /// Add multiple include patterns.
    pub fn include_many<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        for pattern in patterns {
            self = self.include(pattern.as_ref())?;
        }
        Ok(self)
    }

    /// Add multiple exclude patterns.
    pub fn exclude_many<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        for pattern in patterns {
            self = self.exclude(pattern.as_ref())?;
        }
        Ok(self)
    }

    /// Only keep files with this extension.
    pub fn extension(mut self, ext: &str) -> Self {
        self.extensions
            .push(ext.trim_start_matches('.').to_string());
        self
    }

    /// Check if a relative path passes the filter.
    ///
    /// Excludes win over includes; an empty include list accepts everything
    /// that is not excluded.
    pub fn matches(&self, path: &str) -> bool {
        if !self.extensions.is_empty() {
            let ext = Path::new(path).extension().and_then(|e| e.to_str());
            if !ext.is_some_and(|ext| self.extensions.iter().any(|e| e == ext)) {
                return false;
            }
        }

        if self.exclude.iter().any(|p| p.matches(path)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.matches(path))
    }
}

/// Check if a directory should be skipped during traversal.
fn should_skip_dir(name: &str) -> bool {
    name.starts_with('.') || name == "target" || name == "vendor"
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Discover files below `root`, returned as sorted `/`-separated paths
/// relative to it.
pub fn discover_files(root: impl AsRef<Path>, filter: &FilterConfig) -> Result<Vec<String>> {
    let root = root.as_ref();

    if !root.exists() {
        return Err(CovdiffError::PathNotFound(root.to_path_buf()));
    }
    if root.is_file() {
        return Err(CovdiffError::file_read(
            root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "expected a directory"),
        ));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(true).into_iter();

    for entry in walker.filter_entry(|e| {
        if e.depth() == 0 {
            return true;
        }
        if e.file_type().is_dir() {
            let name = e.file_name().to_str().unwrap_or("");
            return !should_skip_dir(name);
        }
        true
    }) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_slash_path(root, entry.path()) {
            if filter.matches(&rel) {
                files.push(rel);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Join a `/`-separated relative path onto a root directory
pub fn resolve(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_files(dir: &Path) {
        fs::create_dir_all(dir.join("pkg/util")).unwrap();
        fs::create_dir_all(dir.join("cmd")).unwrap();
        fs::create_dir_all(dir.join("vendor/x")).unwrap();
        fs::create_dir_all(dir.join(".git")).unwrap();

        fs::write(dir.join("pkg/a.go"), "package pkg").unwrap();
        fs::write(dir.join("pkg/a_test.go"), "package pkg").unwrap();
        fs::write(dir.join("pkg/util/b.go"), "package util").unwrap();
        fs::write(dir.join("cmd/main.go"), "package main").unwrap();
        fs::write(dir.join("vendor/x/x.go"), "package x").unwrap();
        fs::write(dir.join(".git/HEAD"), "ref").unwrap();
        fs::write(dir.join("README.md"), "# Readme").unwrap();
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FilterConfig::new();
        assert!(filter.matches("pkg/a.go"));
        assert!(filter.matches("README.md"));
    }

    #[test]
    fn test_filter_with_extension() {
        let filter = FilterConfig::new().extension(".go");
        assert!(filter.matches("pkg/a.go"));
        assert!(!filter.matches("README.md"));
        assert!(!filter.matches("Makefile"));
    }

    #[test]
    fn test_filter_with_include_pattern() {
        let filter = FilterConfig::new().include("pkg/**").unwrap();
        assert!(filter.matches("pkg/a.go"));
        assert!(filter.matches("pkg/util/b.go"));
        assert!(!filter.matches("cmd/main.go"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = FilterConfig::new()
            .include_many(&["pkg/**", "cmd/**"])
            .unwrap()
            .exclude("**/*_test.go")
            .unwrap();
        assert!(filter.matches("pkg/a.go"));
        assert!(filter.matches("cmd/main.go"));
        assert!(!filter.matches("pkg/a_test.go"));
    }

    #[test]
    fn test_discover_files() {
        let temp = tempdir().unwrap();
        create_test_files(temp.path());

        let files = discover_files(temp.path(), &FilterConfig::new().extension("go")).unwrap();
        assert_eq!(
            files,
            vec!["cmd/main.go", "pkg/a.go", "pkg/a_test.go", "pkg/util/b.go"]
        );
    }

    #[test]
    fn test_discover_files_with_filter() {
        let temp = tempdir().unwrap();
        create_test_files(temp.path());

        let filter = FilterConfig::new()
            .extension("go")
            .exclude("**/*_test.go")
            .unwrap()
            .exclude("cmd/**")
            .unwrap();
        let files = discover_files(temp.path(), &filter).unwrap();
        assert_eq!(files, vec!["pkg/a.go", "pkg/util/b.go"]);
    }

    #[test]
    fn test_discover_files_nonexistent() {
        let result = discover_files("/nonexistent/path", &FilterConfig::new());
        assert!(matches!(result, Err(CovdiffError::PathNotFound(_))));
    }

    #[test]
    fn test_resolve_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(resolve(root, "pkg/a.go"), Path::new("/repo/pkg/a.go"));
    }

    #[test]
    fn test_invalid_glob_pattern() {
        let result = FilterConfig::new().include("[invalid");

        if let Err(CovdiffError::InvalidGlob { pattern, .. }) = result {
            assert_eq!(pattern, "[invalid");
        } else {
            panic!("Expected InvalidGlob error");
        }
    }
}
