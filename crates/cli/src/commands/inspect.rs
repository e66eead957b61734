use std::collections::BTreeMap;

use anyhow::{Context, Result};
use asm_report_core::services::inspect::{inspect_binary, InspectReport};
use asm_report_core::services::objdump::ObjdumpBackend;

use crate::commands::{absolute_from_cwd, load_context, open_knowledge_db, print_json, GlobalArgs};

/// Classify the ISA usage of one or more binaries.
///
/// Every binary is classified before anything is printed, so a failure on
/// any of them produces no report at all.
pub fn inspect_command(
    args: &GlobalArgs,
    binaries: &[String],
    json: bool,
    show_gaps: bool,
) -> Result<()> {
    let ctx = load_context(args)?;
    let db = open_knowledge_db(&ctx)?;
    let snap = db.snapshot()?;
    let backend = ObjdumpBackend::from_config(&ctx.config.disassembler);

    let mut reports = Vec::with_capacity(binaries.len());
    for binary in binaries {
        let binary = absolute_from_cwd(binary)?;
        let report =
            inspect_binary(&snap, &backend, &binary, ctx.config.disassembler.raw_encoding)
                .with_context(|| format!("Failed to inspect {}", binary.display()))?;
        reports.push(report);
    }

    if json {
        return print_json(&reports);
    }
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_report(report, show_gaps);
    }
    Ok(())
}

fn print_report(report: &InspectReport, show_gaps: bool) {
    println!("Binary: {}", report.binary.display());
    println!(
        "Architecture: {} (machine type {} {})",
        report.architecture, report.machine, report.machine_name
    );
    println!("Instructions scanned: {}", report.instruction_lines);

    let isas = &report.usage.isas;
    if isas.is_empty() {
        println!("No known ISA usage found.");
    } else {
        let width = isas.keys().map(|k| k.len()).max().unwrap_or(0);
        println!("ISA usage:");
        for (isa, count) in isas {
            println!("  {isa:<width$} : {count}");
        }
    }

    if show_gaps {
        print_gaps("Unmapped instructions", &report.usage.unmapped_instructions);
        print_gaps("Unmapped registers", &report.usage.unmapped_registers);
    }
}

fn print_gaps(label: &str, gaps: &BTreeMap<String, u64>) {
    if gaps.is_empty() {
        return;
    }
    println!("{label} ({}):", gaps.len());
    for (name, count) in gaps {
        println!("  {name} : {count}");
    }
}
