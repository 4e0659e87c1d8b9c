use crate::error::{Result, SheetError};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// `sheet.json` -> `sheet.json.bak`, in the same directory.
pub fn backup_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("sheet.json"));
    name.push(".bak");
    source.with_file_name(name)
}

/// Copies `source` over its `.bak` sibling. Returns `None` when there is
/// nothing to back up yet.
pub fn create_backup(source: &Path) -> Result<Option<PathBuf>> {
    if !source.exists() {
        return Ok(None);
    }
    let dest = backup_path(source);
    fs::copy(source, &dest).map_err(|e| SheetError::io("back up", source, e))?;
    tracing::debug!(backup = %dest.display(), "backup written");
    Ok(Some(dest))
}
