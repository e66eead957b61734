use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an architecture record.
///
/// Allocated from the architecture-scoped sequence of a single rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchitectureId(pub i64);

/// Identifier of an ISA record, allocated independently of architecture IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsaId(pub i64);

impl fmt::Display for ArchitectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arch#{}", self.0)
    }
}

impl fmt::Display for IsaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "isa#{}", self.0)
    }
}

/// Architecture record as stored in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Architecture {
    pub id: ArchitectureId,
    /// Family name (e.g., "x86_64", "aarch64").
    pub name: String,
    /// Character that prefixes register operands in disassembly (e.g., `%`).
    pub sigil: char,
    /// ELF `e_machine` codes currently mapped to this architecture.
    ///
    /// A code claimed by a later architecture in the same build is not listed here.
    pub elf_machine_types: Vec<u16>,
}

/// ISA extension record as stored in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Isa {
    pub id: IsaId,
    pub architecture_id: ArchitectureId,
    pub name: String,
    pub description: String,
    pub vendor_specific: bool,
    /// Declared parent ISA names, kept verbatim and never expanded.
    pub inherits: Vec<String>,
}

/// Index sizes for a single architecture, used by `info`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchitectureStats {
    pub isas: u64,
    pub instructions: u64,
    pub registers: u64,
}

/// Provenance of the live knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KbMetadata {
    /// RFC 3339 timestamp of the rebuild that produced this store.
    pub built_at: String,
    /// SHA-256 (hex) of the validated definition batch.
    pub definitions_sha256: String,
}
