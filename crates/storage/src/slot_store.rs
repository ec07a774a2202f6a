// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted repo -> slot affinity map.

use crate::atomic::{read_json, write_json, AtomicWriter, FsWriter, StorageError};
use crate::paths::HostPaths;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// Hash a canonicalized repo path down to a stable 64-bit key.
///
/// Truncating SHA-256 to its first 8 bytes is enough collision resistance
/// for an advisory cache keyed by a bounded number of local repos.
pub fn hash_repo_path(canonical: &Path) -> u64 {
    let digest = Sha256::digest(canonical.as_os_str().as_encoded_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is at least 8 bytes"))
}

/// Persisted map from repo-path hash to the slot last assigned to it.
/// Affinity is advisory: a lookup miss or a busy preferred slot simply
/// falls through to normal scanning in the slot manager.
pub struct SlotAffinityStore<W: AtomicWriter + Clone = FsWriter> {
    writer: W,
    host_paths: HostPaths,
    map: Mutex<Option<HashMap<String, u32>>>,
}

impl SlotAffinityStore<FsWriter> {
    pub fn new(host_paths: HostPaths) -> Self {
        Self::with_writer(FsWriter, host_paths)
    }
}

impl<W: AtomicWriter + Clone> SlotAffinityStore<W> {
    pub fn with_writer(writer: W, host_paths: HostPaths) -> Self {
        Self {
            writer,
            host_paths,
            map: Mutex::new(None),
        }
    }

    pub fn get(&self, canonical: &Path) -> Result<Option<u32>, StorageError> {
        let mut guard = self.map.lock();
        let map = self.load_locked(&mut guard)?;
        Ok(map.get(&key(canonical)).copied())
    }

    pub fn set(&self, canonical: &Path, slot: u32) -> Result<(), StorageError> {
        let mut guard = self.map.lock();
        let map = self.load_locked(&mut guard)?;
        map.insert(key(canonical), slot);
        write_json(&self.writer, &self.host_paths.slot_assignments_json(), map)
    }

    fn load_locked<'a>(
        &self,
        guard: &'a mut Option<HashMap<String, u32>>,
    ) -> Result<&'a mut HashMap<String, u32>, StorageError> {
        if guard.is_none() {
            let loaded: HashMap<String, u32> =
                read_json(&self.writer, &self.host_paths.slot_assignments_json())?.unwrap_or_default();
            *guard = Some(loaded);
        }
        Ok(guard.as_mut().expect("just initialized"))
    }
}

fn key(canonical: &Path) -> String {
    format!("{:016x}", hash_repo_path(canonical))
}

#[cfg(test)]
#[path = "slot_store_tests.rs"]
mod tests;
