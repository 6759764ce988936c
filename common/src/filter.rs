//! Pattern-based exclusion of files and directories during a tree scan
//!
//! Patterns are simple globs matched against the *full* path of an entry.
//!
//! # Pattern Syntax
//!
//! - `*` matches any run of characters, path separators included
//! - `?` matches exactly one character
//! - every other character matches itself (no character classes, no alternation)
//!
//! Matching is case-insensitive on Windows and case-sensitive everywhere else.
//!
//! # Examples
//!
//! ```
//! use common::filter::ExclusionPatternSet;
//! use std::path::Path;
//!
//! let mut patterns = ExclusionPatternSet::new();
//! patterns.add("*.tmp").unwrap();
//!
//! assert!(patterns.matches(Path::new("/data/cache/b.tmp")));
//! assert!(!patterns.matches(Path::new("/data/cache/a.txt")));
//! ```

use anyhow::{Context, anyhow};
use std::path::Path;

/// A compiled exclusion pattern together with the text it was built from
#[derive(Debug, Clone)]
pub struct ExclusionPattern {
    /// original pattern string, used in log output
    pub original: String,
    matcher: globset::GlobMatcher,
}

impl ExclusionPattern {
    /// Parse a pattern string into an ExclusionPattern
    pub fn parse(pattern: &str) -> Result<Self, anyhow::Error> {
        if pattern.is_empty() {
            return Err(anyhow!("empty pattern is not allowed"));
        }
        let glob = globset::GlobBuilder::new(&Self::to_glob(pattern))
            .literal_separator(false) // * crosses path separators
            .backslash_escape(false) // \ is a path separator on Windows, never an escape
            .case_insensitive(cfg!(windows))
            .build()
            .with_context(|| format!("invalid exclusion pattern: {}", pattern))?;
        Ok(Self {
            original: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }
    /// Translate a simple-glob expression into globset syntax: `*` and `?` stay wildcards,
    /// everything else is escaped so that it only ever matches itself. Runs of `*` collapse
    /// into one, globset would otherwise read `**` as "any number of directories".
    fn to_glob(pattern: &str) -> String {
        let mut glob = String::with_capacity(pattern.len() * 2);
        let mut literal = String::new();
        for c in pattern.chars() {
            if c == '*' && literal.is_empty() && glob.ends_with('*') {
                continue;
            }
            if c == '*' || c == '?' {
                glob.push_str(&globset::escape(&literal));
                literal.clear();
                glob.push(c);
            } else if cfg!(windows) && c == '\\' {
                // globset normalizes candidate paths to `/` on Windows
                literal.push('/');
            } else {
                literal.push(c);
            }
        }
        glob.push_str(&globset::escape(&literal));
        glob
    }
    /// Check if this pattern matches the given full path
    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }
}

/// Ordered collection of exclusion patterns. An empty set matches nothing.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPatternSet {
    patterns: Vec<ExclusionPattern>,
}

impl ExclusionPatternSet {
    pub fn new() -> Self {
        Self::default()
    }
    /// Build a set from a list of pattern strings
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, anyhow::Error> {
        let mut set = Self::new();
        for pattern in patterns {
            set.add(pattern.as_ref())?;
        }
        Ok(set)
    }
    pub fn add(&mut self, pattern: &str) -> Result<(), anyhow::Error> {
        self.patterns.push(ExclusionPattern::parse(pattern)?);
        Ok(())
    }
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
    /// Returns the first pattern matching `path`, if any
    pub fn find_match(&self, path: &Path) -> Option<&ExclusionPattern> {
        self.patterns.iter().find(|pattern| pattern.matches(path))
    }
    /// True iff `path` satisfies at least one pattern of the set
    pub fn matches(&self, path: &Path) -> bool {
        self.find_match(path).is_some()
    }
}

/// Exclusion patterns applied by the scanner, one set for files and one for directories
#[derive(Debug, Clone, Default)]
pub struct ExclusionSettings {
    /// files matching any of these are not recorded
    pub files: ExclusionPatternSet,
    /// directories matching any of these are skipped together with everything below them
    pub directories: ExclusionPatternSet,
}

impl ExclusionSettings {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_file_exclude(&mut self, pattern: &str) -> Result<(), anyhow::Error> {
        self.files.add(pattern)
    }
    pub fn add_dir_exclude(&mut self, pattern: &str) -> Result<(), anyhow::Error> {
        self.directories.add(pattern)
    }
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
    /// Build settings from command line pieces: either a filter file or the two pattern lists
    pub fn from_args(
        file_patterns: &[String],
        dir_patterns: &[String],
        filter_file: Option<&Path>,
    ) -> Result<Self, anyhow::Error> {
        if let Some(path) = filter_file {
            return Self::from_file(path);
        }
        Ok(Self {
            files: ExclusionPatternSet::from_patterns(file_patterns)
                .context("invalid --exclude-file pattern")?,
            directories: ExclusionPatternSet::from_patterns(dir_patterns)
                .context("invalid --exclude-dir pattern")?,
        })
    }
    /// Parse exclusion settings from a file
    ///
    /// # File Format
    /// ```text
    /// # comments supported
    /// --exclude-file *.tmp
    /// --exclude-file *~
    /// --exclude-dir */node_modules
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read filter file: {:?}", path))?;
        Self::parse_content(&content)
    }
    /// Parse exclusion settings from a string (filter file format)
    pub fn parse_content(content: &str) -> Result<Self, anyhow::Error> {
        let mut settings = Self::new();
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            // skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_num = line_num + 1; // 1-based for error messages
            if let Some(pattern) = line.strip_prefix("--exclude-file ") {
                settings
                    .add_file_exclude(pattern.trim())
                    .with_context(|| format!("line {}: invalid file pattern", line_num))?;
            } else if let Some(pattern) = line.strip_prefix("--exclude-dir ") {
                settings
                    .add_dir_exclude(pattern.trim())
                    .with_context(|| format!("line {}: invalid directory pattern", line_num))?;
            } else {
                return Err(anyhow!(
                    "line {}: invalid syntax '{}', expected '--exclude-file PATTERN' or '--exclude-dir PATTERN'",
                    line_num,
                    line
                ));
            }
        }
        Ok(settings)
    }
}
