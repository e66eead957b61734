//! Architecture and ISA definition records.
//!
//! Definitions are the input of a knowledge-base rebuild. They arrive either
//! from YAML files on disk (see [`load_definitions_dir`]) or are constructed
//! directly by callers, and must pass [`DefinitionBatch::validate`] before the
//! index builder accepts them.

mod loader;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use loader::load_definitions_dir;

/// Register sigil used when a definition does not name one.
pub const DEFAULT_SIGIL: char = '%';

fn default_sigil() -> char {
    DEFAULT_SIGIL
}

/// Errors raised while reading or validating definitions.
///
/// Every variant is a malformed-definition failure: the rebuild is aborted and
/// the live knowledge base is left as it was.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// A record is structurally incomplete.
    #[error("Malformed definition {record}: {reason}")]
    Malformed { record: String, reason: String },

    /// A definition file or directory could not be read.
    #[error("Malformed definition {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A definition file is not valid YAML for its record type.
    #[error("Malformed definition {}: {source}", path.display())]
    Unparsable {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl DefinitionError {
    fn malformed(record: impl Into<String>, reason: impl Into<String>) -> Self {
        DefinitionError::Malformed { record: record.into(), reason: reason.into() }
    }
}

/// Architecture definition (`<arch>.yml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureDefinition {
    pub name: String,
    /// ELF `e_machine` codes claimed by this architecture.
    #[serde(rename = "types", alias = "elf_machine_types")]
    pub elf_machine_types: Vec<u16>,
    #[serde(default = "default_sigil")]
    pub sigil: char,
}

impl ArchitectureDefinition {
    pub fn new(name: impl Into<String>, elf_machine_types: Vec<u16>) -> Self {
        Self { name: name.into(), elf_machine_types, sigil: DEFAULT_SIGIL }
    }

    pub fn with_sigil(mut self, sigil: char) -> Self {
        self.sigil = sigil;
        self
    }
}

/// ISA extension definition (one file under `<arch>/`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IsaDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "vendor_specific")]
    pub vendor_specific: bool,
    /// Informational only; never expanded into instruction membership.
    #[serde(default)]
    pub inherits: Vec<String>,
    #[serde(default)]
    pub registers: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl IsaDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_registers<I, S>(mut self, registers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registers = registers.into_iter().map(Into::into).collect();
        self
    }
}

/// An ISA definition together with the name of the architecture it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedIsa {
    pub architecture: String,
    pub isa: IsaDefinition,
}

/// Unvalidated input of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionBatch {
    pub architectures: Vec<ArchitectureDefinition>,
    pub isas: Vec<AttachedIsa>,
}

impl DefinitionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_architecture(&mut self, definition: ArchitectureDefinition) -> &mut Self {
        self.architectures.push(definition);
        self
    }

    pub fn add_isa(&mut self, architecture: impl Into<String>, isa: IsaDefinition) -> &mut Self {
        self.isas.push(AttachedIsa { architecture: architecture.into(), isa });
        self
    }

    /// Check structural completeness and group ISAs under their architecture.
    ///
    /// Input order is preserved for both architectures and ISAs, which fixes
    /// the ID allocation order of the rebuild.
    pub fn validate(self) -> Result<ValidatedBatch, DefinitionError> {
        let mut known = HashSet::new();
        for (idx, arch) in self.architectures.iter().enumerate() {
            if arch.name.trim().is_empty() {
                return Err(DefinitionError::malformed(
                    format!("architecture #{}", idx + 1),
                    "name is empty",
                ));
            }
            if arch.elf_machine_types.is_empty() {
                return Err(DefinitionError::malformed(
                    format!("architecture '{}'", arch.name),
                    "no ELF machine types declared",
                ));
            }
            if arch.sigil.is_whitespace() {
                return Err(DefinitionError::malformed(
                    format!("architecture '{}'", arch.name),
                    "register sigil must not be whitespace",
                ));
            }
            known.insert(arch.name.clone());
        }

        let mut architectures: Vec<ValidatedArchitecture> = self
            .architectures
            .into_iter()
            .map(|definition| ValidatedArchitecture { definition, isas: Vec::new() })
            .collect();

        for attached in self.isas {
            if attached.isa.name.trim().is_empty() {
                return Err(DefinitionError::malformed(
                    format!("ISA under architecture '{}'", attached.architecture),
                    "name is empty",
                ));
            }
            if !known.contains(&attached.architecture) {
                return Err(DefinitionError::malformed(
                    format!("ISA '{}'", attached.isa.name),
                    format!("attached to unknown architecture '{}'", attached.architecture),
                ));
            }
            // Duplicate architecture names are allowed; ISAs attach to the last one.
            if let Some(owner) =
                architectures.iter_mut().rev().find(|a| a.definition.name == attached.architecture)
            {
                owner.isas.push(attached.isa);
            }
        }

        Ok(ValidatedBatch { architectures })
    }
}

/// An architecture with its ISAs, after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedArchitecture {
    definition: ArchitectureDefinition,
    isas: Vec<IsaDefinition>,
}

impl ValidatedArchitecture {
    pub fn definition(&self) -> &ArchitectureDefinition {
        &self.definition
    }

    pub fn isas(&self) -> &[IsaDefinition] {
        &self.isas
    }
}

/// Definitions that passed validation; the only input the index builder accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedBatch {
    architectures: Vec<ValidatedArchitecture>,
}

impl ValidatedBatch {
    pub fn architectures(&self) -> &[ValidatedArchitecture] {
        &self.architectures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x86_batch() -> DefinitionBatch {
        let mut batch = DefinitionBatch::new();
        batch.add_architecture(ArchitectureDefinition::new("x86_64", vec![62]));
        batch.add_isa("x86_64", IsaDefinition::new("Base").with_instructions(["mov"]));
        batch
    }

    #[test]
    fn validate_groups_isas_under_architecture() {
        let validated = x86_batch().validate().expect("valid batch");
        assert_eq!(validated.architectures().len(), 1);
        assert_eq!(validated.architectures()[0].isas()[0].name, "Base");
    }

    #[test]
    fn validate_rejects_empty_architecture_name() {
        let mut batch = x86_batch();
        batch.add_architecture(ArchitectureDefinition::new("  ", vec![3]));
        let err = batch.validate().unwrap_err();
        assert!(err.to_string().contains("architecture #2"), "unexpected error: {err}");
    }

    #[test]
    fn validate_rejects_missing_machine_types() {
        let mut batch = DefinitionBatch::new();
        batch.add_architecture(ArchitectureDefinition::new("mips", vec![]));
        let err = batch.validate().unwrap_err();
        assert!(err.to_string().contains("no ELF machine types"));
    }

    #[test]
    fn validate_rejects_isa_for_unknown_architecture() {
        let mut batch = x86_batch();
        batch.add_isa("sparc", IsaDefinition::new("VIS"));
        match batch.validate() {
            Err(DefinitionError::Malformed { record, reason }) => {
                assert_eq!(record, "ISA 'VIS'");
                assert!(reason.contains("sparc"));
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_unnamed_isa() {
        let mut batch = x86_batch();
        batch.add_isa("x86_64", IsaDefinition::new(""));
        assert!(batch.validate().is_err());
    }

    #[test]
    fn isa_yaml_uses_kebab_case_vendor_flag() {
        let isa: IsaDefinition = serde_yaml::from_str(
            "name: AVX2\ndescription: Advanced Vector Extensions 2\nvendor-specific: true\ninherits: [AVX]\ninstructions: [vpbroadcastb]\n",
        )
        .unwrap();
        assert!(isa.vendor_specific);
        assert_eq!(isa.inherits, vec!["AVX".to_string()]);
        assert!(isa.registers.is_empty());
    }

    #[test]
    fn architecture_yaml_defaults_sigil() {
        let arch: ArchitectureDefinition =
            serde_yaml::from_str("name: x86_64\ntypes: [62]\n").unwrap();
        assert_eq!(arch.sigil, DEFAULT_SIGIL);
        assert_eq!(arch.elf_machine_types, vec![62]);
    }
}
