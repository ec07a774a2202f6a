// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Result;
use std::path::Path;

pub fn run(path: &Path, alias: Option<&str>) -> Result<()> {
    let registry = super::registry()?;
    let chosen = registry.allow(path, alias)?;
    let canonical = registry.resolve(&chosen)?;
    println!("registered '{chosen}' -> {}", canonical.display());
    Ok(())
}
