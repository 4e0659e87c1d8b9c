use crate::backup::{backup_path, create_backup};
use crate::error::{Result, SheetError};
use crate::models::Sheet;
use fs2::FileExt;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const SHEET_FILE: &str = "sheet.json";
const LOCK_FILE: &str = "sheet.json.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub indent: usize,
    pub backup: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: 4,
            backup: true,
        }
    }
}

/// Reads a sheet from `path`. A missing file is an empty sheet.
pub fn load(path: &Path) -> Result<Sheet> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no sheet yet");
            return Ok(Sheet::new());
        }
        Err(e) => return Err(SheetError::io("read", path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| SheetError::CorruptData {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `sheet` to `path` without ever truncating the live file.
///
/// The document goes to a synced temp file first, the previous version is
/// copied to `<path>.bak`, then the temp file is renamed over `path`.
/// A failed backup only logs a warning.
pub fn save(sheet: &Sheet, path: &Path, opts: &WriteOptions) -> Result<()> {
    let body = render(sheet, opts.indent)?;
    let tmp = temp_path(path);

    if let Err(e) = write_synced(&tmp, &body) {
        let _ = fs::remove_file(&tmp);
        return Err(SheetError::io("write", &tmp, e));
    }

    if opts.backup {
        if let Err(err) = create_backup(path) {
            tracing::warn!(error = %err, "could not back up sheet, continuing");
        }
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(SheetError::io("replace", path, e));
    }
    if let Err(e) = sync_parent(path) {
        tracing::warn!(error = %e, "could not sync sheet directory");
    }
    tracing::debug!(path = %path.display(), bytes = body.len(), "sheet saved");
    Ok(())
}

pub fn render(sheet: &Sheet, indent: usize) -> Result<Vec<u8>> {
    let pad = vec![b' '; indent];
    let mut out = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&pad));
    sheet
        .serialize(&mut ser)
        .map_err(|e| SheetError::io("serialize", SHEET_FILE, io::Error::other(e)))?;
    out.push(b'\n');
    Ok(out)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(SHEET_FILE);
    path.with_file_name(format!("{name}.tmp"))
}

fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(body)?;
    file.sync_all()
}

/// Flushes the directory entry so a completed rename survives a crash.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => File::open(dir)?.sync_all(),
        None => File::open(".")?.sync_all(),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on `sheet.json.lock`, released on drop.
#[derive(Debug)]
pub struct SheetLock {
    file: File,
}

impl SheetLock {
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| SheetError::io("open", path, e))?;
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| SheetError::io("lock", path, e))?;
        Ok(Self { file })
    }
}

impl Drop for SheetLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// The sheet and its siblings inside one data directory.
#[derive(Debug, Clone)]
pub struct SheetStore {
    dir: PathBuf,
    opts: WriteOptions,
}

impl SheetStore {
    pub fn new(dir: impl Into<PathBuf>, opts: WriteOptions) -> Self {
        Self {
            dir: dir.into(),
            opts,
        }
    }

    /// Creates the data directory if it is missing.
    pub fn open(dir: impl Into<PathBuf>, opts: WriteOptions) -> Result<Self> {
        let store = Self::new(dir, opts);
        fs::create_dir_all(&store.dir).map_err(|e| SheetError::io("create", &store.dir, e))?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sheet_path(&self) -> PathBuf {
        self.dir.join(SHEET_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        backup_path(&self.sheet_path())
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn lock(&self, mode: LockMode) -> Result<SheetLock> {
        SheetLock::acquire(&self.lock_path(), mode)
    }

    pub fn load(&self) -> Result<Sheet> {
        load(&self.sheet_path())
    }

    pub fn save(&self, sheet: &Sheet) -> Result<()> {
        save(sheet, &self.sheet_path(), &self.opts)
    }

    /// Loads, applies `f`, and saves under an exclusive lock.
    pub fn update<F>(&self, f: F) -> Result<Sheet>
    where
        F: FnOnce(&mut Sheet),
    {
        let _guard = self.lock(LockMode::Exclusive)?;
        let mut sheet = self.load()?;
        f(&mut sheet);
        self.save(&sheet)?;
        Ok(sheet)
    }

    /// Removes the sheet file. The backup is left alone. Returns whether a
    /// file existed.
    pub fn delete(&self) -> Result<bool> {
        let _guard = self.lock(LockMode::Exclusive)?;
        let path = self.sheet_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SheetError::io("delete", path, e)),
        }
    }
}
