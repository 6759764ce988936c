//! Reserved system directories that are skipped when they sit directly on a volume root
//!
//! Windows keeps a handful of system folders (recycle bin, restore points, recovery partition
//! data) at the top of every volume. Scanning them fails or, worse, copies them. The scanner asks
//! a [`ReservedRoots`] predicate about every directory before recording it; the predicate picked
//! by [`platform_default`] is a no-op on non-Windows targets.

use std::path::Path;

/// Predicate deciding whether a directory is a reserved directory at a volume root
pub trait ReservedRoots: Send + Sync + std::fmt::Debug {
    fn is_protected_root(&self, path: &Path) -> bool;
}

/// Never protects anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReservedRoots;

impl ReservedRoots for NoReservedRoots {
    fn is_protected_root(&self, _path: &Path) -> bool {
        false
    }
}

/// Folder names Windows reserves at the root of a volume
pub const WINDOWS_RESERVED_NAMES: [&str; 3] =
    ["System Volume Information", "$RECYCLE.BIN", "Recovery"];

/// Protects [`WINDOWS_RESERVED_NAMES`] located directly under a drive root (`X:\`) or a UNC
/// share root (`\\server\share`). The same names deeper in the tree are not protected.
///
/// Works on the textual form of the path so it behaves identically on every host.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsReservedRoots;

impl WindowsReservedRoots {
    /// True for `X:\` (exactly one separator) and `\\server\share` (exactly three separators)
    pub fn is_volume_root(path: &str) -> bool {
        let separators = path.matches('\\').count();
        if let Some(unc) = path.strip_prefix(r"\\") {
            return separators == 3 && unc.split('\\').all(|part| !part.is_empty());
        }
        let bytes = path.as_bytes();
        separators == 1
            && bytes.len() == 3
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && bytes[2] == b'\\'
    }
}

impl ReservedRoots for WindowsReservedRoots {
    fn is_protected_root(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        let Some(sep) = text.rfind('\\') else {
            return false;
        };
        let name = &text[sep + 1..];
        if !WINDOWS_RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return false;
        }
        // drive roots keep their trailing separator (`C:\`), share roots do not (`\\srv\share`)
        Self::is_volume_root(&text[..=sep]) || Self::is_volume_root(&text[..sep])
    }
}

/// The predicate matching the platform we are running on
pub fn platform_default() -> &'static dyn ReservedRoots {
    if cfg!(windows) {
        &WindowsReservedRoots
    } else {
        &NoReservedRoots
    }
}
