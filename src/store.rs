// src/store.rs
//
// Local cache: one delimited-text snapshot per dataset kind under the store
// directory. The file's mtime is the only freshness signal.

use std::{fs, io, path::{Path, PathBuf}, time::{Duration, SystemTime}};

use tracing::debug;

use crate::config::DatasetKind;
use crate::config::consts::STORE_SEP;
use crate::csv::{parse_table, rows_to_string};
use crate::error::StoreError;
use crate::table::CanonicalDataset;

#[derive(Clone, Debug)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn path_for(&self, kind: DatasetKind) -> PathBuf {
        self.dir.join(format!("{}.csv", kind.name()))
    }

    pub fn exists(&self, kind: DatasetKind) -> bool {
        self.path_for(kind).is_file()
    }

    pub fn read(&self, kind: DatasetKind) -> Result<CanonicalDataset, StoreError> {
        let path = self.path_for(kind);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(kind)),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let (headers, rows) = parse_table(&text, STORE_SEP)
            .ok_or_else(|| StoreError::Malformed { path: path.clone(), reason: s!("empty file") })?;
        CanonicalDataset::from_rows(kind, &headers, &rows)
            .map_err(|reason| StoreError::Malformed { path, reason })
    }

    /// Replace the snapshot. Written to a sibling temp file, then renamed.
    pub fn write(&self, kind: DatasetKind, ds: &CanonicalDataset) -> Result<PathBuf, StoreError> {
        let path = self.path_for(kind);
        ensure_directory(&self.dir).map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;

        let contents = rows_to_string(&ds.headers(), &ds.to_rows(), STORE_SEP);
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, contents).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path: path.clone(), source })?;

        debug!(kind = kind.name(), rows = ds.len(), path = %path.display(), "cache written");
        Ok(path)
    }

    /// Wall-clock time since the last successful write.
    pub fn age(&self, kind: DatasetKind) -> Result<Duration, StoreError> {
        let path = self.path_for(kind);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(kind)),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        // mtime in the future (clock skew) counts as brand new
        Ok(SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO))
    }

    /// Fresh means present and strictly younger than `max_age`.
    pub fn is_fresh(&self, kind: DatasetKind, max_age: Duration) -> bool {
        matches!(self.age(kind), Ok(age) if age < max_age)
    }
}

pub fn ensure_directory(dir: &Path) -> io::Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Path exists but is not a directory: {}", dir.display()),
        ));
    }
    if !dir.exists() { fs::create_dir_all(dir)?; }
    Ok(())
}
