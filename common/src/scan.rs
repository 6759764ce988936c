//! Recursive, single-threaded discovery of the files and directories below a root
//!
//! The scan is depth-first and pre-order: a directory is recorded before anything below it.
//! Within one directory the files are recorded first, then every subdirectory is recorded and
//! descended into. Entries are visited in file-name order so two scans of an unchanged tree
//! produce identical sequences.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::filter::ExclusionSettings;
use crate::reserved;

/// Everything a scan discovered, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    /// descend into symlinks pointing at directories
    pub follow_symlinks: bool,
    pub reserved: &'static dyn reserved::ReservedRoots,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
            reserved: reserved::platform_default(),
        }
    }
}

/// Scan the tree below `root`.
///
/// Any directory that cannot be listed aborts the whole scan with an error.
#[instrument(skip(exclusions, settings))]
pub fn scan(
    root: &Path,
    exclusions: &ExclusionSettings,
    settings: &ScanSettings,
) -> anyhow::Result<ScanResult> {
    let mut result = ScanResult::default();
    if settings.reserved.is_protected_root(root) {
        tracing::info!("{:?} is a reserved volume directory, nothing to scan", root);
        return Ok(result);
    }
    scan_dir(root, exclusions, settings, &mut result)?;
    tracing::info!(
        "scanned {:?}: {} files, {} directories",
        root,
        result.files.len(),
        result.directories.len()
    );
    Ok(result)
}

fn scan_dir(
    dir: &Path,
    exclusions: &ExclusionSettings,
    settings: &ScanSettings,
    result: &mut ScanResult,
) -> anyhow::Result<()> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot open directory {:?} for reading", dir))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed traversing directory {:?}", dir))?;
        if is_traversable_dir(&entry, settings)? {
            subdirs.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }
    files.sort();
    subdirs.sort();
    for file in files {
        if let Some(pattern) = exclusions.files.find_match(&file) {
            tracing::debug!("file {:?} excluded by '{}'", &file, &pattern.original);
            continue;
        }
        result.files.push(file);
    }
    for subdir in subdirs {
        if settings.reserved.is_protected_root(&subdir) {
            tracing::debug!("skipping reserved volume directory {:?}", &subdir);
            continue;
        }
        if let Some(pattern) = exclusions.directories.find_match(&subdir) {
            tracing::debug!("directory {:?} excluded by '{}'", &subdir, &pattern.original);
            continue;
        }
        result.directories.push(subdir.clone());
        scan_dir(&subdir, exclusions, settings, result)?;
    }
    Ok(())
}

fn is_traversable_dir(entry: &std::fs::DirEntry, settings: &ScanSettings) -> anyhow::Result<bool> {
    let file_type = entry
        .file_type()
        .with_context(|| format!("failed reading file type of {:?}", entry.path()))?;
    if file_type.is_dir() {
        return Ok(true);
    }
    if file_type.is_symlink() && settings.follow_symlinks {
        // a dangling link is not a directory, it gets recorded as a file
        return Ok(std::fs::metadata(entry.path())
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false));
    }
    Ok(false)
}
