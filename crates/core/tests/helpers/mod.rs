#![allow(dead_code)]

use std::path::{Path, PathBuf};

use asm_report_core::definitions::{
    ArchitectureDefinition, DefinitionBatch, IsaDefinition, ValidatedBatch,
};
use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness};

/// x86_64 with Base/SSE/AVX, plus aarch64 with Base/NEON.
pub fn sample_batch() -> DefinitionBatch {
    let mut batch = DefinitionBatch::new();
    batch.add_architecture(ArchitectureDefinition::new("x86_64", vec![62]));
    batch.add_isa(
        "x86_64",
        IsaDefinition::new("Base")
            .with_instructions(["mov", "push", "pop", "ret"])
            .with_registers(["eax", "rax", "rbp", "rsp"]),
    );
    batch.add_isa(
        "x86_64",
        IsaDefinition::new("SSE").with_instructions(["addps", "movaps"]).with_registers(["xmm0"]),
    );
    let mut avx = IsaDefinition::new("AVX").with_instructions(["vaddps"]).with_registers(["ymm0"]);
    avx.inherits = vec!["SSE".into()];
    avx.description = "Advanced Vector Extensions".into();
    batch.add_isa("x86_64", avx);

    batch.add_architecture(ArchitectureDefinition::new("aarch64", vec![183]).with_sigil('%'));
    batch.add_isa("aarch64", IsaDefinition::new("Base").with_instructions(["mov", "ldr"]));
    let mut neon = IsaDefinition::new("NEON").with_instructions(["fmla"]);
    neon.vendor_specific = false;
    batch.add_isa("aarch64", neon);
    batch
}

pub fn sample_validated() -> ValidatedBatch {
    sample_batch().validate().expect("sample batch is valid")
}

/// Minimal relocatable ELF object for `arch`.
pub fn write_elf(dir: &Path, name: &str, arch: Architecture) -> PathBuf {
    let obj = Object::new(BinaryFormat::Elf, arch, Endianness::Little);
    let path = dir.join(name);
    std::fs::write(&path, obj.write().expect("emit elf")).expect("write elf");
    path
}

pub const X86_LISTING: &str = "\
/tmp/fixture.o:     file format elf64-x86-64

Disassembly of section .text:

0000000000000000 <main>:
   0:\t55\tpush   %rbp
   1:\t48 89 e5\tmov    %rsp,%rbp
   4:\t89 45 fc\tmov    %eax,-0x4(%rbp)
   7:\t0f 58 c0\taddps  %xmm0,%xmm0
   a:\tc5 fc 58 c0\tvaddps %ymm0,%ymm0,%ymm0
   e:\t0f 0b\tud2
  10:\t5d\tpop    %rbp
  11:\tc3\tret
";
