use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use asm_report_core::db::{KbLayout, KnowledgeDb, ReportContext};

use crate::canonicalize_or_current;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub root: String,
    pub db: Option<String>,
    pub config: Option<String>,
}

impl GlobalArgs {
    pub fn new(root: impl Into<String>, db: Option<String>, config: Option<String>) -> Self {
        Self { root: root.into(), db, config }
    }
}

/// Resolve the root, load its config and apply `--config` / `--db` overrides.
pub fn load_context(args: &GlobalArgs) -> Result<ReportContext> {
    let root = canonicalize_or_current(&args.root)?;
    let mut layout = KbLayout::new(&root);
    if let Some(config) = &args.config {
        let path = absolute_from_cwd(config)?;
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
        layout.config_path = path;
    }
    let db_override = match &args.db {
        Some(db) => Some(absolute_from_cwd(db)?),
        None => None,
    };
    Ok(ReportContext::from_layout(layout)?.with_db_path(db_override))
}

/// Open the live knowledge base named by the context.
pub fn open_knowledge_db(ctx: &ReportContext) -> Result<KnowledgeDb> {
    KnowledgeDb::open(&ctx.db_path)
        .with_context(|| format!("Failed to open knowledge base at {}", ctx.db_path.display()))
}

pub fn absolute_from_cwd(path: &str) -> Result<PathBuf> {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        return Ok(p);
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(p))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize JSON")?);
    Ok(())
}
