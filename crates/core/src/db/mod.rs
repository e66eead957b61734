//! Knowledge-base storage, layout and configuration.
//!
//! The knowledge base is a SQLite file with one table per section:
//! - `architectures`: architecture records by ID
//! - `elf_machine_types`: ELF `e_machine` code -> architecture ID
//! - `isas`: ISA records by ID
//! - `instructions` / `registers`: per-architecture name -> ISA ID indices
//! - `metadata`: build timestamp and definition digest
//!
//! Writers never modify the live file. [`rebuild`] populates a staging file
//! inside an exclusive transaction and renames it over the live path once
//! complete, so readers see either the old base or the new one.

mod builder;
mod config;
mod context;
mod knowledge_db;
mod layout;
mod models;
mod util;

pub use builder::{
    definitions_digest, rebuild, stage_rebuild, IdAllocator, RebuildSummary, StagedKnowledgeBase,
};
pub use config::{DbConfig, DisassemblerConfig, ReportConfig};
pub use context::ReportContext;
pub use knowledge_db::{
    ArchitectureIndex, KbError, KbResult, KnowledgeDb, Snapshot, CURRENT_SCHEMA_VERSION,
};
pub use layout::KbLayout;
pub use models::{Architecture, ArchitectureId, ArchitectureStats, Isa, IsaId, KbMetadata};
pub use util::load_report_config;

use std::path::Path;

use crate::definitions::load_definitions_dir;

/// Load, validate and index a definitions directory, then swap it in as the live base.
pub fn rebuild_from_dir(definitions_dir: &Path, live_path: &Path) -> KbResult<RebuildSummary> {
    let batch = load_definitions_dir(definitions_dir)?.validate()?;
    rebuild(live_path, &batch)
}
