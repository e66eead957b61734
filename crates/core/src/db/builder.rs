use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::db::knowledge_db::create_schema;
use crate::db::{ArchitectureId, IsaId, KbError, KbResult};
use crate::definitions::{ValidatedArchitecture, ValidatedBatch};

/// Hands out architecture and ISA IDs for one rebuild.
///
/// The two sequences are independent and start at 1. Each rebuild owns its
/// own allocator, so there is no process-wide counter.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next_architecture: i64,
    next_isa: i64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next_architecture: 1, next_isa: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn architecture(&mut self) -> ArchitectureId {
        let id = ArchitectureId(self.next_architecture);
        self.next_architecture += 1;
        id
    }

    pub fn isa(&mut self) -> IsaId {
        let id = IsaId(self.next_isa);
        self.next_isa += 1;
        id
    }
}

/// Counts reported after a successful rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub architectures: u64,
    pub isas: u64,
    pub machine_types: u64,
    pub instructions: u64,
    pub registers: u64,
    pub definitions_sha256: String,
}

/// A fully populated knowledge base that is not yet live.
///
/// The staging file sits next to the live path so the final rename stays on
/// one filesystem. Dropping a staged store without committing deletes it.
#[derive(Debug)]
pub struct StagedKnowledgeBase {
    file: NamedTempFile,
    live_path: PathBuf,
    summary: RebuildSummary,
}

impl StagedKnowledgeBase {
    pub fn staging_path(&self) -> &Path {
        self.file.path()
    }

    /// Atomically replace the live store with this one.
    pub fn commit(self) -> KbResult<RebuildSummary> {
        let Self { file, live_path, summary } = self;
        file.persist(&live_path)
            .map_err(|e| KbError::Io { path: live_path.clone(), source: e.error })?;
        info!(path = %live_path.display(), "knowledge base swapped in");
        Ok(summary)
    }
}

/// Build a complete knowledge base for `batch` beside `live_path` without touching it.
pub fn stage_rebuild(live_path: &Path, batch: &ValidatedBatch) -> KbResult<StagedKnowledgeBase> {
    let dir = match live_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| KbError::Io { path: dir.clone(), source })?;

    let file = tempfile::Builder::new()
        .prefix(".knowledge-")
        .suffix(".staging")
        .tempfile_in(&dir)
        .map_err(|source| KbError::Io { path: dir.clone(), source })?;
    debug!(staging = %file.path().display(), "staging knowledge base");

    let summary = {
        let mut conn = Connection::open(file.path())?;
        let summary = populate(&mut conn, batch, &mut IdAllocator::new())?;
        conn.close().map_err(|(_, e)| KbError::Sql(e))?;
        summary
    };

    Ok(StagedKnowledgeBase { file, live_path: live_path.to_path_buf(), summary })
}

/// Replace the live knowledge base with one built from `batch`.
///
/// On any error the staging store is discarded and the live store is left as it was.
pub fn rebuild(live_path: &Path, batch: &ValidatedBatch) -> KbResult<RebuildSummary> {
    stage_rebuild(live_path, batch)?.commit()
}

/// SHA-256 over the canonical JSON form of a validated batch.
pub fn definitions_digest(batch: &ValidatedBatch) -> String {
    let mut hasher = Sha256::new();
    // Serializing plain strings, integers and bools cannot fail.
    if let Ok(bytes) = serde_json::to_vec(batch) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}

fn populate(
    conn: &mut Connection,
    batch: &ValidatedBatch,
    ids: &mut IdAllocator,
) -> KbResult<RebuildSummary> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
    create_schema(&tx)?;

    for arch in batch.architectures() {
        let arch_id = ids.architecture();
        insert_architecture(&tx, arch_id, arch)?;
        for isa in arch.isas() {
            let isa_id = ids.isa();
            insert_isa(&tx, arch_id, isa_id, isa)?;
        }
    }

    let digest = definitions_digest(batch);
    tx.execute(
        "INSERT INTO metadata (key, value) VALUES ('built_at', ?1), ('definitions_sha256', ?2)",
        params![Utc::now().to_rfc3339(), digest],
    )?;

    let count = |table: &str| -> KbResult<u64> {
        let n: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as u64)
    };
    let summary = RebuildSummary {
        architectures: count("architectures")?,
        isas: count("isas")?,
        machine_types: count("elf_machine_types")?,
        instructions: count("instructions")?,
        registers: count("registers")?,
        definitions_sha256: digest,
    };

    tx.commit()?;
    Ok(summary)
}

fn insert_architecture(
    conn: &Connection,
    id: ArchitectureId,
    arch: &ValidatedArchitecture,
) -> KbResult<()> {
    let def = arch.definition();
    conn.execute(
        "INSERT INTO architectures (id, name, sigil) VALUES (?1, ?2, ?3)",
        params![id.0, def.name, def.sigil.to_string()],
    )?;
    info!(architecture = %def.name, %id, isas = arch.isas().len(), "indexing architecture");

    let mut lookup =
        conn.prepare_cached("SELECT architecture_id FROM elf_machine_types WHERE machine = ?1")?;
    let mut upsert = conn.prepare_cached(
        "INSERT OR REPLACE INTO elf_machine_types (machine, architecture_id) VALUES (?1, ?2)",
    )?;
    for &machine in &def.elf_machine_types {
        let previous: Option<i64> =
            lookup.query_row(params![machine], |row| row.get(0)).optional()?;
        if let Some(prev) = previous.filter(|p| *p != id.0) {
            warn!(
                machine,
                previous = %ArchitectureId(prev),
                architecture = %def.name,
                "ELF machine type reassigned to a later architecture"
            );
        }
        upsert.execute(params![machine, id.0])?;
    }
    Ok(())
}

fn insert_isa(
    conn: &Connection,
    arch_id: ArchitectureId,
    id: IsaId,
    isa: &crate::definitions::IsaDefinition,
) -> KbResult<()> {
    let inherits = serde_json::to_string(&isa.inherits)
        .map_err(|e| KbError::corrupt(format!("cannot encode inherits of '{}': {e}", isa.name)))?;
    conn.execute(
        r#"
        INSERT INTO isas (id, architecture_id, name, description, vendor_specific, inherits)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![id.0, arch_id.0, isa.name, isa.description, isa.vendor_specific, inherits],
    )?;
    debug!(isa = %isa.name, %id, instructions = isa.instructions.len(), registers = isa.registers.len(), "indexing ISA");

    index_names(conn, "instructions", "mnemonic", arch_id, id, &isa.instructions)?;
    index_names(conn, "registers", "name", arch_id, id, &isa.registers)?;
    Ok(())
}

/// Insert names into one per-architecture index; a later owner replaces an earlier one.
fn index_names(
    conn: &Connection,
    table: &str,
    column: &str,
    arch_id: ArchitectureId,
    isa_id: IsaId,
    names: &[String],
) -> KbResult<()> {
    let mut lookup = conn.prepare_cached(&format!(
        "SELECT isa_id FROM {table} WHERE architecture_id = ?1 AND {column} = ?2"
    ))?;
    let mut upsert = conn.prepare_cached(&format!(
        "INSERT OR REPLACE INTO {table} (architecture_id, {column}, isa_id) VALUES (?1, ?2, ?3)"
    ))?;
    for name in names {
        let previous: Option<i64> =
            lookup.query_row(params![arch_id.0, name], |row| row.get(0)).optional()?;
        if let Some(prev) = previous.filter(|p| *p != isa_id.0) {
            debug!(table, name = %name, previous = %IsaId(prev), owner = %isa_id, "index entry overwritten");
        }
        upsert.execute(params![arch_id.0, name, isa_id.0])?;
    }
    Ok(())
}
