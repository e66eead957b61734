use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use goblin::elf::header::{self, Header};
use goblin::elf::Elf;
use thiserror::Error;

/// Bytes needed for the largest (64-bit) ELF file header.
const HEADER_LEN: u64 = header::header64::SIZEOF_EHDR as u64;

#[derive(Debug, Error)]
pub enum ElfError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Only ELF objects are supported.
    #[error("{} is not an ELF file: {reason}", path.display())]
    NotElf { path: PathBuf, reason: String },
}

/// Parse an ELF file header from the start of `bytes`.
pub fn parse_elf_header(bytes: &[u8]) -> Result<Header, goblin::error::Error> {
    Elf::parse_header(bytes)
}

/// Read the `e_machine` code from a binary's ELF header.
pub fn read_elf_machine(path: &Path) -> Result<u16, ElfError> {
    let io_err = |source| ElfError::Io { path: path.to_path_buf(), source };
    let mut bytes = Vec::with_capacity(HEADER_LEN as usize);
    File::open(path).map_err(io_err)?.take(HEADER_LEN).read_to_end(&mut bytes).map_err(io_err)?;

    let header = parse_elf_header(&bytes)
        .map_err(|e| ElfError::NotElf { path: path.to_path_buf(), reason: e.to_string() })?;
    Ok(header.e_machine)
}

/// Conventional name of an ELF machine code (e.g. `EM_X86_64`).
pub fn machine_name(machine: u16) -> &'static str {
    header::machine_to_str(machine)
}
