// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::output::OutputFormat;
use anyhow::Result;

pub fn run(format: OutputFormat) -> Result<()> {
    let registry = super::registry()?;
    let entries = registry.list()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            for entry in entries {
                println!("{}: {}", entry.alias, entry.path.display());
            }
        }
    }
    Ok(())
}
