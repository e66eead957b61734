mod helpers;

use std::collections::BTreeSet;

use asm_report_core::db::{rebuild, KbError, KnowledgeDb};
use asm_report_core::definitions::{ArchitectureDefinition, DefinitionBatch};
use helpers::sample_validated;
use tempfile::tempdir;

#[test]
fn resolver_returns_owning_architecture() {
    let dir = tempdir().expect("tempdir");
    let live = dir.path().join("knowledge.db");
    rebuild(&live, &sample_validated()).expect("rebuild");

    let db = KnowledgeDb::open(&live).expect("open");
    let snap = db.snapshot().expect("snapshot");
    assert_eq!(snap.resolve_machine(62).expect("x86_64").name, "x86_64");
    assert_eq!(snap.resolve_machine(183).expect("aarch64").name, "aarch64");
}

#[test]
fn unclaimed_machine_type_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let live = dir.path().join("knowledge.db");
    rebuild(&live, &sample_validated()).expect("rebuild");

    let db = KnowledgeDb::open(&live).expect("open");
    let snap = db.snapshot().expect("snapshot");
    let err = snap.resolve_machine(0xF3).unwrap_err();
    assert!(matches!(err, KbError::ArchitectureNotFound { machine: 0xF3 }));
    assert!(err.to_string().contains("243"), "unexpected message: {err}");
}

#[test]
fn machine_types_round_trip_with_last_write_wins() {
    let dir = tempdir().expect("tempdir");
    let live = dir.path().join("knowledge.db");

    let mut batch = DefinitionBatch::new();
    batch.add_architecture(ArchitectureDefinition::new("x86", vec![3, 6]));
    batch.add_architecture(ArchitectureDefinition::new("x86_64", vec![62, 6]));
    batch.add_architecture(ArchitectureDefinition::new("arm", vec![40, 40]));
    rebuild(&live, &batch.clone().validate().expect("valid")).expect("rebuild");

    let db = KnowledgeDb::open(&live).expect("open");
    let snap = db.snapshot().expect("snapshot");

    let declared: BTreeSet<u16> =
        batch.architectures.iter().flat_map(|a| a.elf_machine_types.iter().copied()).collect();
    let recovered: BTreeSet<u16> =
        snap.machine_types().expect("machine types").into_iter().map(|(m, _)| m).collect();
    assert_eq!(declared, recovered);

    // Code 6 was claimed twice; the later architecture owns it.
    assert_eq!(snap.resolve_machine(6).expect("resolve").name, "x86_64");
    let x86 = snap.architectures_named("x86").expect("x86").remove(0);
    assert_eq!(x86.elf_machine_types, vec![3]);
    let arm = snap.architectures_named("arm").expect("arm").remove(0);
    assert_eq!(arm.elf_machine_types, vec![40]);
}

#[test]
fn unknown_architecture_name_is_reported() {
    let dir = tempdir().expect("tempdir");
    let live = dir.path().join("knowledge.db");
    rebuild(&live, &sample_validated()).expect("rebuild");

    let db = KnowledgeDb::open(&live).expect("open");
    let snap = db.snapshot().expect("snapshot");
    let err = snap.architectures_named("sparc").unwrap_err();
    assert!(matches!(err, KbError::UnknownArchitecture(ref n) if n == "sparc"));
}

#[test]
fn sigil_is_stored_per_architecture() {
    let dir = tempdir().expect("tempdir");
    let live = dir.path().join("knowledge.db");
    let mut batch = DefinitionBatch::new();
    batch.add_architecture(ArchitectureDefinition::new("mips", vec![8]).with_sigil('$'));
    rebuild(&live, &batch.validate().expect("valid")).expect("rebuild");

    let db = KnowledgeDb::open(&live).expect("open");
    let snap = db.snapshot().expect("snapshot");
    assert_eq!(snap.resolve_machine(8).expect("mips").sigil, '$');
}

#[test]
fn duplicate_names_return_every_architecture_with_its_own_isas() {
    let dir = tempdir().expect("tempdir");
    let live = dir.path().join("knowledge.db");
    let mut batch = DefinitionBatch::new();
    batch.add_architecture(ArchitectureDefinition::new("arm", vec![40]));
    batch.add_architecture(ArchitectureDefinition::new("arm", vec![183]));
    batch.add_isa(
        "arm",
        asm_report_core::definitions::IsaDefinition::new("Base").with_instructions(["mov", "ldr"]),
    );
    rebuild(&live, &batch.validate().expect("valid")).expect("rebuild");

    let db = KnowledgeDb::open(&live).expect("open");
    let snap = db.snapshot().expect("snapshot");
    let arms = snap.architectures_named("arm").expect("arm");
    assert_eq!(arms.len(), 2);
    assert_eq!(arms[0].elf_machine_types, vec![40]);
    assert_eq!(arms[1].elf_machine_types, vec![183]);

    // ISAs attach to the later record, and that record is part of the lookup.
    assert_eq!(snap.stats(arms[0].id).expect("stats").isas, 0);
    let stats = snap.stats(arms[1].id).expect("stats");
    assert_eq!((stats.isas, stats.instructions), (1, 2));
    assert_eq!(snap.resolve_machine(183).expect("resolve").id, arms[1].id);
}
