use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::db::{ArchitectureId, KbError, Snapshot};
use crate::services::classify::{classify, UsageReport};
use crate::services::disassembly::{DisassemblyError, LineSyntax, RawEncoding};
use crate::services::elf::{machine_name, read_elf_machine, ElfError};
use crate::services::objdump::DisassemblyBackend;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error(transparent)]
    Elf(#[from] ElfError),
    #[error(transparent)]
    Kb(#[from] KbError),
    #[error(transparent)]
    Disassembly(#[from] DisassemblyError),
}

/// Outcome of classifying one binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub binary: PathBuf,
    pub machine: u16,
    pub machine_name: String,
    pub architecture: String,
    pub architecture_id: ArchitectureId,
    pub instruction_lines: u64,
    pub usage: UsageReport,
}

/// Resolve a binary's architecture and classify its disassembly.
///
/// All knowledge-base reads go through `snapshot`, so a rebuild that lands
/// meanwhile does not change the result.
pub fn inspect_binary(
    snapshot: &Snapshot<'_>,
    backend: &dyn DisassemblyBackend,
    binary: &Path,
    raw_encoding: RawEncoding,
) -> Result<InspectReport, InspectError> {
    let machine = read_elf_machine(binary)?;
    let architecture = snapshot.resolve_machine(machine)?;
    info!(
        binary = %binary.display(),
        machine,
        architecture = %architecture.name,
        backend = backend.name(),
        "classifying binary"
    );

    let syntax = LineSyntax::new(architecture.sigil, raw_encoding);
    let counts = backend.disassemble(binary, &syntax)?;
    let usage = classify(&snapshot.index(&architecture), &counts)?;

    Ok(InspectReport {
        binary: binary.to_path_buf(),
        machine,
        machine_name: machine_name(machine).to_string(),
        architecture: architecture.name,
        architecture_id: architecture.id,
        instruction_lines: counts.instruction_lines,
        usage,
    })
}
