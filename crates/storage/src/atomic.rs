// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON file persistence: write-to-temp, fsync, rename.
//!
//! All record writers in this crate (task records, the repo registry, the
//! slot affinity map) go through this module so that a crash or concurrent
//! reader never observes a partially-written file.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Abstracts the filesystem operations behind atomic writes, so tests can
/// inject a fake and assert on ordering/failure without touching disk.
pub trait AtomicWriter: Send + Sync + 'static {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;
    fn fsync_file(&self, path: &Path) -> Result<(), StorageError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError>;
    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError>;
    fn remove_dir_all(&self, path: &Path) -> Result<(), StorageError>;
}

/// Production writer backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl AtomicWriter for FsWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let mut file = File::create(path).map_err(|e| StorageError::io(path, e))?;
        file.write_all(data).map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), StorageError> {
        let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
        file.sync_all().map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        std::fs::rename(from, to).map_err(|e| StorageError::io(to, e))
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}

/// Serialize `value` to `path` by writing a sibling `.tmp` file, fsyncing
/// it, then renaming over the destination.
pub fn write_json<W: AtomicWriter, T: Serialize>(
    writer: &W,
    path: &Path,
    value: &T,
) -> Result<(), StorageError> {
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    writer.write_tmp(&tmp_path, &bytes)?;
    writer.fsync_file(&tmp_path)?;
    writer.rename(&tmp_path, path)?;
    Ok(())
}

/// Read and deserialize JSON from `path`, returning `None` if it doesn't exist.
pub fn read_json<W: AtomicWriter, T: DeserializeOwned>(
    writer: &W,
    path: &Path,
) -> Result<Option<T>, StorageError> {
    match writer.read(path)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
