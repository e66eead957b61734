use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Transaction};
use thiserror::Error;

use crate::db::{Architecture, ArchitectureId, ArchitectureStats, Isa, IsaId, KbMetadata};
use crate::definitions::DefinitionError;
use crate::services::classify::IsaIndex;

/// Schema version written by the index builder and required by readers.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Tables every knowledge base must contain, one per store section.
pub(crate) const SECTIONS: [&str; 6] =
    ["architectures", "elf_machine_types", "isas", "instructions", "registers", "metadata"];

/// Error type for knowledge-base operations.
#[derive(Debug, Error)]
pub enum KbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A definition failed to load or validate; nothing was written.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// No architecture in the live knowledge base claims this ELF machine type.
    #[error("No architecture claims ELF machine type {machine} (0x{machine:04X})")]
    ArchitectureNotFound { machine: u16 },

    /// Lookup by name found nothing.
    #[error("Unknown architecture '{0}'")]
    UnknownArchitecture(String),

    /// The live store file does not exist yet.
    #[error("Knowledge base not found at {}; run `asm-report update` first", path.display())]
    NotBuilt { path: PathBuf },

    /// The store was written by a newer version of this crate.
    #[error("Unsupported schema version {found}; this build reads version {supported}")]
    UnsupportedSchemaVersion { found: i32, supported: i32 },

    /// A required section or record is missing, or the file is not a knowledge base.
    #[error("Knowledge base store is corrupt: {reason}")]
    StoreCorrupt { reason: String },
}

impl KbError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        KbError::StoreCorrupt { reason: reason.into() }
    }
}

/// Convenience result type for knowledge-base operations.
pub type KbResult<T> = Result<T, KbError>;

/// Read-only handle on the live knowledge base.
///
/// The connection stays bound to the file that was live when it was opened;
/// a rebuild that swaps in a new store does not affect it.
#[derive(Debug)]
pub struct KnowledgeDb {
    conn: Connection,
}

impl KnowledgeDb {
    /// Open the live store read-only and check that every section is present.
    pub fn open(path: &Path) -> KbResult<Self> {
        if !path.is_file() {
            return Err(KbError::NotBuilt { path: path.to_path_buf() });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        verify_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Expose the underlying connection for advanced callers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a read transaction. All lookups of one resolve+classify run go through it.
    pub fn snapshot(&self) -> KbResult<Snapshot<'_>> {
        let tx = self.conn.unchecked_transaction()?;
        Ok(Snapshot { tx })
    }
}

/// A read-only transaction over the knowledge base.
#[derive(Debug)]
pub struct Snapshot<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> Snapshot<'conn> {
    /// List all architectures (ordered by id).
    pub fn architectures(&self) -> KbResult<Vec<Architecture>> {
        let mut stmt = self.tx.prepare(
            r#"
            SELECT id, name, sigil
            FROM architectures
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, name, sigil) = row?;
            out.push(self.hydrate_architecture(ArchitectureId(id), name, &sigil)?);
        }
        Ok(out)
    }

    pub fn architecture(&self, id: ArchitectureId) -> KbResult<Option<Architecture>> {
        let row = self
            .tx
            .query_row(
                "SELECT name, sigil FROM architectures WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            Some((name, sigil)) => Ok(Some(self.hydrate_architecture(id, name, &sigil)?)),
            None => Ok(None),
        }
    }

    /// Every architecture with this name, ordered by id.
    ///
    /// Names are not unique: a batch may define the same family twice, with
    /// ISAs attached to the later record.
    pub fn architectures_named(&self, name: &str) -> KbResult<Vec<Architecture>> {
        let mut stmt = self.tx.prepare(
            "SELECT id, sigil FROM architectures WHERE name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, sigil) = row?;
            out.push(self.hydrate_architecture(ArchitectureId(id), name.to_string(), &sigil)?);
        }
        if out.is_empty() {
            return Err(KbError::UnknownArchitecture(name.to_string()));
        }
        Ok(out)
    }

    /// Resolve the architecture that owns an ELF `e_machine` code.
    pub fn resolve_machine(&self, machine: u16) -> KbResult<Architecture> {
        let id: Option<i64> = self
            .tx
            .query_row(
                "SELECT architecture_id FROM elf_machine_types WHERE machine = ?1",
                params![machine],
                |row| row.get(0),
            )
            .optional()?;
        let id = ArchitectureId(id.ok_or(KbError::ArchitectureNotFound { machine })?);
        self.architecture(id)?.ok_or_else(|| {
            KbError::corrupt(format!("machine type {machine} maps to missing {id}"))
        })
    }

    /// Every (machine type, owner) pair in the reverse index, ordered by machine type.
    pub fn machine_types(&self) -> KbResult<Vec<(u16, ArchitectureId)>> {
        let mut stmt = self.tx.prepare(
            "SELECT machine, architecture_id FROM elf_machine_types ORDER BY machine",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u16>(0)?, ArchitectureId(row.get::<_, i64>(1)?)))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn stats(&self, id: ArchitectureId) -> KbResult<ArchitectureStats> {
        let count = |sql: &str| -> KbResult<u64> {
            let n: i64 = self.tx.query_row(sql, params![id.0], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(ArchitectureStats {
            isas: count("SELECT COUNT(*) FROM isas WHERE architecture_id = ?1")?,
            instructions: count("SELECT COUNT(*) FROM instructions WHERE architecture_id = ?1")?,
            registers: count("SELECT COUNT(*) FROM registers WHERE architecture_id = ?1")?,
        })
    }

    pub fn isa(&self, id: IsaId) -> KbResult<Option<Isa>> {
        let mut stmt = self.tx.prepare_cached(
            r#"
            SELECT id, architecture_id, name, description, vendor_specific, inherits
            FROM isas
            WHERE id = ?1
            "#,
        )?;
        let row = stmt.query_row(params![id.0], map_isa_row).optional()?;
        row.map(decode_isa).transpose()
    }

    /// ISAs of one architecture, in build order.
    pub fn isas(&self, architecture: ArchitectureId) -> KbResult<Vec<Isa>> {
        let mut stmt = self.tx.prepare(
            r#"
            SELECT id, architecture_id, name, description, vendor_specific, inherits
            FROM isas
            WHERE architecture_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![architecture.0], map_isa_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_isa(row?)?);
        }
        Ok(out)
    }

    pub fn metadata(&self) -> KbResult<KbMetadata> {
        let get = |key: &str| -> KbResult<String> {
            self.tx
                .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?
                .ok_or_else(|| KbError::corrupt(format!("metadata key '{key}' is missing")))
        };
        Ok(KbMetadata { built_at: get("built_at")?, definitions_sha256: get("definitions_sha256")? })
    }

    /// Instruction and register indices of one architecture.
    pub fn index(&self, architecture: &Architecture) -> ArchitectureIndex<'_> {
        ArchitectureIndex { conn: &self.tx, architecture_id: architecture.id }
    }

    fn hydrate_architecture(
        &self,
        id: ArchitectureId,
        name: String,
        sigil: &str,
    ) -> KbResult<Architecture> {
        let mut chars = sigil.chars();
        let sigil = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(KbError::corrupt(format!("{id} has invalid sigil {sigil:?}"))),
        };
        let mut stmt = self.tx.prepare_cached(
            "SELECT machine FROM elf_machine_types WHERE architecture_id = ?1 ORDER BY machine",
        )?;
        let machines = stmt
            .query_map(params![id.0], |row| row.get::<_, u16>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Architecture { id, name, sigil, elf_machine_types: machines })
    }
}

type IsaRow = (i64, i64, String, String, bool, String);

fn map_isa_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IsaRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn decode_isa(row: IsaRow) -> KbResult<Isa> {
    let (id, architecture_id, name, description, vendor_specific, inherits) = row;
    let inherits: Vec<String> = serde_json::from_str(&inherits)
        .map_err(|e| KbError::corrupt(format!("isa#{id} has unreadable inherits list: {e}")))?;
    Ok(Isa {
        id: IsaId(id),
        architecture_id: ArchitectureId(architecture_id),
        name,
        description,
        vendor_specific,
        inherits,
    })
}

/// Per-architecture instruction and register indices, read through a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ArchitectureIndex<'s> {
    conn: &'s Connection,
    architecture_id: ArchitectureId,
}

impl ArchitectureIndex<'_> {
    fn lookup(&self, sql: &str, key: &str) -> KbResult<Option<String>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let row: Option<(i64, Option<String>)> = stmt
            .query_row(params![self.architecture_id.0, key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        match row {
            None => Ok(None),
            Some((_, Some(name))) => Ok(Some(name)),
            Some((isa_id, None)) => Err(KbError::corrupt(format!(
                "'{key}' in {} maps to missing isa#{isa_id}",
                self.architecture_id
            ))),
        }
    }
}

impl IsaIndex for ArchitectureIndex<'_> {
    fn instruction_isa(&self, mnemonic: &str) -> KbResult<Option<String>> {
        self.lookup(
            r#"
            SELECT i.isa_id, isas.name
            FROM instructions i LEFT JOIN isas ON isas.id = i.isa_id
            WHERE i.architecture_id = ?1 AND i.mnemonic = ?2
            "#,
            mnemonic,
        )
    }

    fn register_isa(&self, register: &str) -> KbResult<Option<String>> {
        self.lookup(
            r#"
            SELECT r.isa_id, isas.name
            FROM registers r LEFT JOIN isas ON isas.id = r.isa_id
            WHERE r.architecture_id = ?1 AND r.name = ?2
            "#,
            register,
        )
    }
}

/// Create every section of an empty store and stamp the schema version.
pub(crate) fn create_schema(conn: &Connection) -> KbResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE architectures (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL,
            sigil TEXT NOT NULL
        );

        CREATE TABLE elf_machine_types (
            machine         INTEGER PRIMARY KEY,
            architecture_id INTEGER NOT NULL
        );

        CREATE TABLE isas (
            id              INTEGER PRIMARY KEY,
            architecture_id INTEGER NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL,
            vendor_specific INTEGER NOT NULL,
            inherits        TEXT NOT NULL
        );

        CREATE TABLE instructions (
            architecture_id INTEGER NOT NULL,
            mnemonic        TEXT NOT NULL,
            isa_id          INTEGER NOT NULL,
            PRIMARY KEY (architecture_id, mnemonic)
        ) WITHOUT ROWID;

        CREATE TABLE registers (
            architecture_id INTEGER NOT NULL,
            name            TEXT NOT NULL,
            isa_id          INTEGER NOT NULL,
            PRIMARY KEY (architecture_id, name)
        ) WITHOUT ROWID;

        CREATE TABLE metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        PRAGMA user_version = 1;
        "#,
    )?;
    Ok(())
}

/// Reject files that are not knowledge bases this crate can read.
fn verify_schema(conn: &Connection) -> KbResult<()> {
    let version = match current_schema_version(conn) {
        Ok(v) => v,
        Err(e) if e.sqlite_error_code() == Some(ErrorCode::NotADatabase) => {
            return Err(KbError::corrupt("file is not a SQLite database"));
        }
        Err(e) => return Err(e.into()),
    };
    if version > CURRENT_SCHEMA_VERSION {
        return Err(KbError::UnsupportedSchemaVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version != CURRENT_SCHEMA_VERSION {
        return Err(KbError::corrupt(format!("unexpected schema version {version}")));
    }

    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let tables = stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<Result<
        HashSet<_>,
        _,
    >>()?;
    for section in SECTIONS {
        if !tables.contains(section) {
            return Err(KbError::corrupt(format!("section '{section}' is missing")));
        }
    }
    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
}
