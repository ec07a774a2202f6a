// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn creates_var_and_container_dirs() {
    let root = tempdir().unwrap();
    let env = ensure_slot_environment(root.path()).unwrap();
    assert!(env.var_dir.is_dir());
    assert!(env.container_dir.is_dir());
    assert_eq!(env.var_dir, root.path().join("var"));
    assert_eq!(env.container_dir, root.path().join("container-storage"));
}

#[test]
fn creates_sparse_nix_store_image_of_the_capped_size() {
    let root = tempdir().unwrap();
    let env = ensure_slot_environment(root.path()).unwrap();
    assert!(env.nix_store_image.is_file());
    let metadata = std::fs::metadata(&env.nix_store_image).unwrap();
    assert_eq!(metadata.len(), NIX_STORE_IMAGE_SIZE_BYTES);
}

#[test]
fn is_idempotent_and_does_not_truncate_an_existing_image() {
    let root = tempdir().unwrap();
    ensure_slot_environment(root.path()).unwrap();
    let image = root.path().join("nix-store.img");
    std::fs::write(&image, b"some guest data").unwrap();

    ensure_slot_environment(root.path()).unwrap();

    let contents = std::fs::read(&image).unwrap();
    assert_eq!(contents, b"some guest data");
}
