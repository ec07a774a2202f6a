// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Result;

pub fn run(alias: &str) -> Result<()> {
    let registry = super::registry()?;
    registry.remove(alias)?;
    Ok(())
}
