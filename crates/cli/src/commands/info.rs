use anyhow::Result;
use asm_report_core::db::{Architecture, ArchitectureStats, Isa, KbMetadata};
use asm_report_core::services::elf::machine_name;
use serde::Serialize;

use crate::commands::{load_context, open_knowledge_db, print_json, GlobalArgs};

#[derive(Debug, Serialize)]
pub struct ArchitectureSummary {
    #[serde(flatten)]
    pub architecture: Architecture,
    pub isa_count: u64,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeBaseInfo {
    pub db_path: String,
    pub metadata: KbMetadata,
    pub architectures: Vec<ArchitectureSummary>,
}

#[derive(Debug, Serialize)]
pub struct ArchitectureDetail {
    #[serde(flatten)]
    pub architecture: Architecture,
    pub stats: ArchitectureStats,
    pub isas: Vec<Isa>,
}

/// List architectures, or show the architectures called `name` in detail.
pub fn info_command(args: &GlobalArgs, name: Option<&str>, json: bool) -> Result<()> {
    let ctx = load_context(args)?;
    let db = open_knowledge_db(&ctx)?;
    let snap = db.snapshot()?;

    let Some(name) = name else {
        let mut architectures = Vec::new();
        for architecture in snap.architectures()? {
            let isa_count = snap.stats(architecture.id)?.isas;
            architectures.push(ArchitectureSummary { architecture, isa_count });
        }
        let info = KnowledgeBaseInfo {
            db_path: ctx.db_path.display().to_string(),
            metadata: snap.metadata()?,
            architectures,
        };
        if json {
            return print_json(&info);
        }
        println!("Knowledge base: {}", info.db_path);
        println!("Built at: {}", info.metadata.built_at);
        if info.architectures.is_empty() {
            println!("No architectures defined.");
            return Ok(());
        }
        println!("Architectures:");
        for summary in &info.architectures {
            println!(
                "- {} ({} ISAs, machine types: {})",
                summary.architecture.name,
                summary.isa_count,
                format_machines(&summary.architecture.elf_machine_types)
            );
        }
        return Ok(());
    };

    // Names are not unique; show every architecture that carries this one.
    let mut details = Vec::new();
    for architecture in snap.architectures_named(name)? {
        details.push(ArchitectureDetail {
            stats: snap.stats(architecture.id)?,
            isas: snap.isas(architecture.id)?,
            architecture,
        });
    }
    if json {
        return print_json(&details);
    }
    for (i, detail) in details.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_detail(detail);
    }
    Ok(())
}

fn print_detail(detail: &ArchitectureDetail) {
    println!("Architecture: {} ({})", detail.architecture.name, detail.architecture.id);
    println!("  Machine types: {}", format_machines(&detail.architecture.elf_machine_types));
    println!("  Register sigil: {}", detail.architecture.sigil);
    println!("  Instructions: {}", detail.stats.instructions);
    println!("  Registers: {}", detail.stats.registers);
    println!("  ISAs ({}):", detail.stats.isas);
    for isa in &detail.isas {
        let mut line = format!("    - {}", isa.name);
        if isa.vendor_specific {
            line.push_str(" [vendor]");
        }
        if !isa.inherits.is_empty() {
            line.push_str(&format!(" (inherits: {})", isa.inherits.join(", ")));
        }
        if !isa.description.is_empty() {
            line.push_str(&format!(": {}", isa.description));
        }
        println!("{line}");
    }
}

fn format_machines(machines: &[u16]) -> String {
    if machines.is_empty() {
        return "none".to_string();
    }
    machines.iter().map(|m| format!("{m} ({})", machine_name(*m))).collect::<Vec<_>>().join(", ")
}
