//! asm-report-core
//!
//! Core library behind `asm-report`: reports which ISA extensions a compiled
//! ELF binary actually uses.
//!
//! This crate holds the knowledge base of architecture/ISA definitions (load,
//! validate, atomic rebuild, read-only queries), the disassembly line parser,
//! and the classifier that turns token counts into per-ISA usage. The CLI is
//! a thin frontend over it.

pub mod db;
pub mod definitions;
pub mod services;
