//! Local clone discovery for the fetch workflow.
//!
//! A working copy is recognised by its `.git` directory. The scanner emits
//! the directory holding the marker and never descends into the marker
//! itself. Working trees are still walked, so a repository nested inside
//! another one's checkout is reported too.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory name identifying a working copy root
pub const METADATA_MARKER: &str = ".git";

/// A repository already present on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepo {
    pub directory: PathBuf,
}

/// Walk `root` and hand every discovered repository to `emit`.
///
/// Fails only when `root` itself cannot be read; errors further down are
/// logged and that entry is skipped. Symlinks are not followed.
pub fn scan_root(root: &Path, emit: &mut dyn FnMut(LocalRepo)) -> Result<usize> {
    let mut found = 0;
    let mut entries = WalkDir::new(root).into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to scan {}", root.display()));
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_dir() || entry.file_name() != METADATA_MARKER {
            continue;
        }

        entries.skip_current_dir();

        if let Some(parent) = entry.path().parent() {
            debug!("Found repository: {}", parent.display());
            found += 1;
            emit(LocalRepo {
                directory: parent.to_path_buf(),
            });
        }
    }

    Ok(found)
}

/// Scan several roots; a failing root is logged and the others still run
pub fn scan_roots(roots: &[PathBuf], emit: &mut dyn FnMut(LocalRepo)) -> usize {
    let mut total = 0;
    for root in roots {
        match scan_root(root, emit) {
            Ok(found) => {
                debug!("Found {} repositories under {}", found, root.display());
                total += found;
            }
            Err(e) => warn!("{:#}", e),
        }
    }
    total
}
