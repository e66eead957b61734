//! Read-path services: ELF header reading, disassembly parsing and ISA classification.

pub mod classify;
pub mod disassembly;
pub mod elf;
pub mod inspect;
pub mod objdump;
