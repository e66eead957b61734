use anyhow::{Context, Result};
use asm_report_core::db::rebuild_from_dir;
use tracing::info;

use crate::commands::{absolute_from_cwd, load_context, print_json, GlobalArgs};

/// Rebuild the knowledge base from a definitions directory and swap it in.
pub fn update_command(args: &GlobalArgs, defs: Option<&str>, json: bool) -> Result<()> {
    let ctx = load_context(args)?;
    let defs_dir = match defs {
        Some(d) => absolute_from_cwd(d)?,
        None => ctx.definitions_dir.clone(),
    };
    info!(defs = %defs_dir.display(), db = %ctx.db_path.display(), "rebuilding knowledge base");

    let summary = rebuild_from_dir(&defs_dir, &ctx.db_path).with_context(|| {
        format!("Failed to rebuild knowledge base from {}", defs_dir.display())
    })?;

    if json {
        return print_json(&summary);
    }
    println!("Knowledge base rebuilt at {}", ctx.db_path.display());
    println!("  Architectures: {}", summary.architectures);
    println!("  ISAs:          {}", summary.isas);
    println!("  Machine types: {}", summary.machine_types);
    println!("  Instructions:  {}", summary.instructions);
    println!("  Registers:     {}", summary.registers);
    println!("  Definitions:   sha256:{}", summary.definitions_sha256);
    Ok(())
}
