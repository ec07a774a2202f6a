// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-slot persistent directories: `var/`, `container-storage/`, and a
//! sparse nix store image, created lazily and reused across tasks.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sparse image cap: filesystem formatting is deferred to guest first boot.
pub const NIX_STORE_IMAGE_SIZE_BYTES: u64 = 30 * 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SlotEnvError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> SlotEnvError {
    SlotEnvError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Resolved paths for one slot's persistent environment.
#[derive(Debug, Clone)]
pub struct SlotEnv {
    pub var_dir: PathBuf,
    pub container_dir: PathBuf,
    pub nix_store_image: PathBuf,
}

/// Ensure `slots/<slot>/{var,container-storage}` exist and
/// `slots/<slot>/nix-store.img` is present (created sparse if missing).
pub fn ensure_slot_environment(slot_root: &Path) -> Result<SlotEnv, SlotEnvError> {
    let var_dir = slot_root.join("var");
    let container_dir = slot_root.join("container-storage");
    let nix_store_image = slot_root.join("nix-store.img");

    std::fs::create_dir_all(&var_dir).map_err(|e| io_err(&var_dir, e))?;
    std::fs::create_dir_all(&container_dir).map_err(|e| io_err(&container_dir, e))?;

    if !nix_store_image.exists() {
        let file = std::fs::File::create(&nix_store_image).map_err(|e| io_err(&nix_store_image, e))?;
        file.set_len(NIX_STORE_IMAGE_SIZE_BYTES)
            .map_err(|e| io_err(&nix_store_image, e))?;
    }

    Ok(SlotEnv {
        var_dir,
        container_dir,
        nix_store_image,
    })
}

#[cfg(test)]
#[path = "slot_env_tests.rs"]
mod tests;
