use serde::{Deserialize, Serialize};

use crate::services::disassembly::RawEncoding;

/// Location of the knowledge-base file (typically relative to the root).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DbConfig {
    pub path: String,
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// How the external disassembler is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisassemblerConfig {
    /// Executable name or path. `OBJDUMP_BIN` overrides it at run time.
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the binary path.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Whether the listing carries raw instruction bytes.
    #[serde(default = "default_raw_encoding")]
    pub raw_encoding: RawEncoding,
}

fn default_program() -> String {
    "llvm-objdump".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--no-show-raw-insn".to_string(), "-d".to_string()]
}

fn default_raw_encoding() -> RawEncoding {
    RawEncoding::Hidden
}

impl Default for DisassemblerConfig {
    fn default() -> Self {
        Self { program: default_program(), args: default_args(), raw_encoding: default_raw_encoding() }
    }
}

/// Serializable configuration, read from `.asm-report/config.json` when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportConfig {
    /// Config format version.
    pub config_version: String,
    pub db: DbConfig,
    /// Definitions directory (typically relative to the root).
    pub definitions_dir: String,
    #[serde(default)]
    pub disassembler: DisassemblerConfig,
}

impl ReportConfig {
    pub fn new(db_path: impl Into<String>, definitions_dir: impl Into<String>) -> Self {
        Self {
            config_version: "0.1.0".to_string(),
            db: DbConfig::new(db_path),
            definitions_dir: definitions_dir.into(),
            disassembler: DisassemblerConfig::default(),
        }
    }
}
