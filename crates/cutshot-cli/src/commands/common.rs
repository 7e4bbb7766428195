//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use cutshot_ir::Problem;

/// Load a problem description from a JSON file.
pub fn load_problem(path: &str) -> Result<Problem> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }

    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    Problem::from_json(&source).with_context(|| format!("Invalid problem description: {path}"))
}

/// Write `json` to `output`, or print it when no file was given.
pub fn emit(json: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write file: {path}"))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
