// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent alias -> path allowlist.

use crate::atomic::{read_json, write_json, AtomicWriter, FsWriter, StorageError};
use crate::paths::HostPaths;
use mvm_core::{Clock, RepoEntry, SystemClock};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("I/O error resolving {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a git repository (no .git directory)")]
    NotGitRepo { path: String },
    #[error("unknown repo alias '{alias}'")]
    UnknownRepo { alias: String },
}

/// Registry of repos the orchestrator is allowed to operate on.
///
/// Loaded lazily from `allowed-repos.json` on first access and kept in
/// memory thereafter; every mutation goes back through the same mutex
/// before the next read can observe it, so writes are strictly serialized.
pub struct RegistryStore<W: AtomicWriter + Clone = FsWriter> {
    writer: W,
    host_paths: HostPaths,
    clock: Arc<dyn Clock>,
    entries: Mutex<Option<Vec<RepoEntry>>>,
}

impl RegistryStore<FsWriter> {
    pub fn new(host_paths: HostPaths) -> Self {
        Self::with_writer(FsWriter, host_paths, Arc::new(SystemClock))
    }
}

impl<W: AtomicWriter + Clone> RegistryStore<W> {
    pub fn with_writer(writer: W, host_paths: HostPaths, clock: Arc<dyn Clock>) -> Self {
        Self {
            writer,
            host_paths,
            clock,
            entries: Mutex::new(None),
        }
    }

    /// Allow a repo at `path` under `alias` (or its basename if unset).
    /// Rejects paths without a `.git` directory. On alias collision with a
    /// different path, appends `-2`, `-3`, ... until unique. Re-registering
    /// the same canonical path under the same alias is a no-op that returns
    /// the existing alias; re-registering it under a *different* alias adds
    /// a second entry so both aliases resolve to the path and share affinity.
    pub fn allow(&self, path: &Path, alias: Option<&str>) -> Result<String, RegistryError> {
        let canonical = std::fs::canonicalize(path).map_err(|source| RegistryError::Resolve {
            path: path.display().to_string(),
            source,
        })?;
        if !canonical.join(".git").exists() {
            return Err(RegistryError::NotGitRepo {
                path: canonical.display().to_string(),
            });
        }

        let mut guard = self.entries.lock();
        let entries = self.load_locked(&mut guard)?;

        let base = alias.map(str::to_string).unwrap_or_else(|| {
            canonical
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "repo".to_string())
        });

        if let Some(existing) = entries.iter().find(|e| e.path == canonical && e.alias == base) {
            return Ok(existing.alias.clone());
        }

        let chosen = unique_alias(entries, &base);
        entries.push(RepoEntry::new(chosen.clone(), canonical, self.clock.now()));
        self.persist_locked(entries)?;
        Ok(chosen)
    }

    /// Resolve `alias` to its repo path.
    pub fn resolve(&self, alias: &str) -> Result<PathBuf, RegistryError> {
        let mut guard = self.entries.lock();
        let entries = self.load_locked(&mut guard)?;
        entries
            .iter()
            .find(|e| e.alias == alias)
            .map(|e| e.path.clone())
            .ok_or_else(|| RegistryError::UnknownRepo { alias: alias.to_string() })
    }

    /// List all entries in insertion order.
    pub fn list(&self) -> Result<Vec<RepoEntry>, RegistryError> {
        let mut guard = self.entries.lock();
        Ok(self.load_locked(&mut guard)?.clone())
    }

    /// Remove `alias` if present. Idempotent.
    pub fn remove(&self, alias: &str) -> Result<(), RegistryError> {
        let mut guard = self.entries.lock();
        let entries = self.load_locked(&mut guard)?;
        entries.retain(|e| e.alias != alias);
        self.persist_locked(entries)?;
        Ok(())
    }

    fn load_locked<'a>(
        &self,
        guard: &'a mut Option<Vec<RepoEntry>>,
    ) -> Result<&'a mut Vec<RepoEntry>, RegistryError> {
        if guard.is_none() {
            let loaded: Vec<RepoEntry> =
                read_json(&self.writer, &self.host_paths.allowed_repos_json())?.unwrap_or_default();
            *guard = Some(loaded);
        }
        Ok(guard.as_mut().expect("just initialized"))
    }

    fn persist_locked(&self, entries: &[RepoEntry]) -> Result<(), RegistryError> {
        write_json(&self.writer, &self.host_paths.allowed_repos_json(), &entries)?;
        Ok(())
    }
}

fn unique_alias(entries: &[RepoEntry], base: &str) -> String {
    if !entries.iter().any(|e| e.alias == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !entries.iter().any(|e| e.alias == candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
#[path = "registry_store_tests.rs"]
mod tests;
