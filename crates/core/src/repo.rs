// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry entries for repos the orchestrator is allowed to operate on.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One entry in the allowed-repos registry: an alias mapped to an absolute
/// path on the host filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub alias: String,
    pub path: PathBuf,
    pub added_at: chrono::DateTime<chrono::Utc>,
}

impl RepoEntry {
    pub fn new(alias: impl Into<String>, path: PathBuf, added_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            alias: alias.into(),
            path,
            added_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_all_fields() {
        let now = chrono::Utc::now();
        let entry = RepoEntry::new("svc", PathBuf::from("/repos/svc"), now);
        assert_eq!(entry.alias, "svc");
        assert_eq!(entry.path, PathBuf::from("/repos/svc"));
        assert_eq!(entry.added_at, now);
    }

    #[test]
    fn serde_roundtrip() {
        let entry = RepoEntry::new("svc", PathBuf::from("/repos/svc"), chrono::Utc::now());
        let json = serde_json::to_string(&entry).unwrap();
        let back: RepoEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
