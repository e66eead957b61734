//! Aggregation of token frequencies into per-ISA usage counts.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::KbResult;
use crate::services::disassembly::TokenCounts;

/// Lookup capability the classifier needs from one architecture's indices.
///
/// `Ok(None)` means the name is not indexed (a knowledge-base gap).
pub trait IsaIndex {
    fn instruction_isa(&self, mnemonic: &str) -> KbResult<Option<String>>;
    fn register_isa(&self, register: &str) -> KbResult<Option<String>>;
}

/// In-memory index, used for tests and for callers that assemble indices themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    instructions: HashMap<String, String>,
    registers: HashMap<String, String>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a mnemonic to an ISA; a later call for the same mnemonic wins.
    pub fn instruction(mut self, mnemonic: impl Into<String>, isa: impl Into<String>) -> Self {
        self.instructions.insert(mnemonic.into(), isa.into());
        self
    }

    pub fn register(mut self, register: impl Into<String>, isa: impl Into<String>) -> Self {
        self.registers.insert(register.into(), isa.into());
        self
    }
}

impl IsaIndex for MemoryIndex {
    fn instruction_isa(&self, mnemonic: &str) -> KbResult<Option<String>> {
        Ok(self.instructions.get(mnemonic).cloned())
    }

    fn register_isa(&self, register: &str) -> KbResult<Option<String>> {
        Ok(self.registers.get(register).cloned())
    }
}

/// Result of one classification run. Maps are ordered by name so reports diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// ISA name -> summed occurrence count of its instructions and registers.
    pub isas: BTreeMap<String, u64>,
    /// Mnemonics with no index entry, with their occurrence counts.
    pub unmapped_instructions: BTreeMap<String, u64>,
    /// Register tokens with no index entry, with their occurrence counts.
    pub unmapped_registers: BTreeMap<String, u64>,
}

/// Sum mnemonic and register counts per owning ISA.
///
/// Tokens missing from the index are recorded as gaps and contribute nothing.
/// Only index failures (e.g. a corrupt store) are errors.
pub fn classify(index: &dyn IsaIndex, counts: &TokenCounts) -> KbResult<UsageReport> {
    let mut report = UsageReport::default();

    for (mnemonic, &n) in &counts.mnemonics {
        match index.instruction_isa(mnemonic)? {
            Some(isa) => *report.isas.entry(isa).or_insert(0) += n,
            None => {
                debug!(mnemonic = %mnemonic, "mnemonic not in knowledge base");
                report.unmapped_instructions.insert(mnemonic.clone(), n);
            }
        }
    }
    for (register, &n) in &counts.registers {
        match index.register_isa(register)? {
            Some(isa) => *report.isas.entry(isa).or_insert(0) += n,
            None => {
                debug!(register = %register, "register not in knowledge base");
                report.unmapped_registers.insert(register.clone(), n);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(mnemonics: &[(&str, u64)], registers: &[(&str, u64)]) -> TokenCounts {
        let mut c = TokenCounts::default();
        for (m, n) in mnemonics {
            c.mnemonics.insert(m.to_string(), *n);
        }
        for (r, n) in registers {
            c.registers.insert(r.to_string(), *n);
        }
        c
    }

    #[test]
    fn instructions_and_registers_sum_into_one_isa() {
        let index = MemoryIndex::new()
            .instruction("mov", "Base")
            .register("eax", "Base")
            .register("rbp", "Base");
        let report = classify(&index, &counts(&[("mov", 1)], &[("eax", 1), ("rbp", 1)])).unwrap();
        assert_eq!(report.isas.len(), 1);
        assert_eq!(report.isas["Base"], 3);
        assert!(report.unmapped_instructions.is_empty());
    }

    #[test]
    fn unmapped_tokens_are_gaps_not_errors() {
        let index = MemoryIndex::new().instruction("mov", "Base");
        let report =
            classify(&index, &counts(&[("mov", 2), ("vpdpbusd", 5)], &[("zmm0", 1)])).unwrap();
        assert_eq!(report.isas["Base"], 2);
        assert_eq!(report.unmapped_instructions["vpdpbusd"], 5);
        assert_eq!(report.unmapped_registers["zmm0"], 1);
    }

    #[test]
    fn several_isas_are_reported_separately() {
        let index = MemoryIndex::new()
            .instruction("mov", "Base")
            .instruction("vaddps", "AVX")
            .register("ymm1", "AVX");
        let report =
            classify(&index, &counts(&[("mov", 4), ("vaddps", 2)], &[("ymm1", 3)])).unwrap();
        let sorted: Vec<_> = report.isas.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(sorted, vec![("AVX", 5), ("Base", 4)]);
    }

    #[test]
    fn json_keys_are_ordered_by_name() {
        let index = MemoryIndex::new()
            .instruction("vaddps", "AVX")
            .instruction("mov", "Base")
            .instruction("addps", "SSE");
        let tokens = counts(
            &[("mov", 1), ("addps", 1), ("vaddps", 1), ("ud2", 1), ("hlt", 1)],
            &[("zmm0", 1), ("k1", 1)],
        );
        let report = classify(&index, &tokens).unwrap();
        let json = serde_json::to_string(&report).unwrap();

        let at = |needle: &str| json.find(needle).unwrap();
        assert!(at("\"AVX\"") < at("\"Base\"") && at("\"Base\"") < at("\"SSE\""));
        assert!(at("\"hlt\"") < at("\"ud2\""));
        assert!(at("\"k1\"") < at("\"zmm0\""));
    }

    #[test]
    fn empty_counts_give_empty_report() {
        let report = classify(&MemoryIndex::new(), &TokenCounts::default()).unwrap();
        assert_eq!(report, UsageReport::default());
    }
}
