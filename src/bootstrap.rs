//! One-time bootstrap of the input workbook.
//!
//! The engine reads its roster data from a canonical, user-writable copy.
//! Once that copy exists it belongs to the user: later runs never overwrite
//! it, even if the bundled workbook has changed.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{JadwalError, Result};
use crate::paths::{EntryKind, first_existing};
use crate::shell::FileFilter;

/// Filter offered by the interactive fallback picker
pub fn workbook_filter() -> FileFilter {
    FileFilter::new("Excel Workbook", &["xlsx"])
}

/// Make sure `canonical_target` exists and return it.
///
/// 1. An existing target is returned untouched.
/// 2. Otherwise the first existing bundled candidate is copied in.
/// 3. Otherwise `picker` is called once; its selection is copied in.
pub fn ensure_data_file<F>(
    canonical_target: &Path,
    bundled_candidates: &[PathBuf],
    picker: F,
) -> Result<PathBuf>
where
    F: FnOnce() -> Option<PathBuf>,
{
    if canonical_target.is_file() {
        return Ok(canonical_target.to_path_buf());
    }

    if let Some(source) = first_existing(bundled_candidates.iter().map(PathBuf::as_path), EntryKind::File) {
        info!("Bootstrapping data file from bundled copy {:?}", source);
        copy_into_place(source, canonical_target)?;
        return Ok(canonical_target.to_path_buf());
    }

    warn!(
        "No bundled data file among {} candidate(s), asking the user",
        bundled_candidates.len()
    );
    let selection = picker().ok_or_else(|| {
        JadwalError::missing_data_file(format!(
            "no data file selected; expected one at {}",
            canonical_target.display()
        ))
    })?;

    if !selection.is_file() {
        return Err(JadwalError::missing_data_file(format!(
            "selected file {} does not exist",
            selection.display()
        )));
    }

    info!("Bootstrapping data file from user selection {:?}", selection);
    copy_into_place(&selection, canonical_target)?;
    Ok(canonical_target.to_path_buf())
}

fn copy_into_place(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(())
}
