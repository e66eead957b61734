use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::db::DisassemblerConfig;
use crate::services::disassembly::{
    count_tokens, lossy_lines, DisassemblyError, LineSyntax, TokenCounts,
};

/// Source of disassembly text for one binary.
pub trait DisassemblyBackend {
    /// Disassemble `binary` and count its tokens.
    fn disassemble(&self, binary: &Path, syntax: &LineSyntax)
        -> Result<TokenCounts, DisassemblyError>;
    fn name(&self) -> &'static str;
}

/// Runs an objdump-compatible tool and streams its stdout through the parser.
#[derive(Debug, Clone)]
pub struct ObjdumpBackend {
    program: PathBuf,
    args: Vec<String>,
}

impl ObjdumpBackend {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// Build from config; `OBJDUMP_BIN` overrides the configured program.
    pub fn from_config(config: &DisassemblerConfig) -> Self {
        let program = std::env::var_os("OBJDUMP_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&config.program));
        Self::new(program, config.args.clone())
    }

    fn tool(&self) -> String {
        self.program.display().to_string()
    }
}

/// Stop and reap a disassembler whose output is no longer wanted.
fn abandon(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to stop disassembler after stream error");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "failed to reap disassembler after stream error");
    }
}

impl DisassemblyBackend for ObjdumpBackend {
    fn disassemble(
        &self,
        binary: &Path,
        syntax: &LineSyntax,
    ) -> Result<TokenCounts, DisassemblyError> {
        // Allow tests to feed a canned listing instead of needing objdump installed.
        if let Some(fake) = std::env::var_os("ASM_REPORT_FAKE_OBJDUMP") {
            debug!(listing = ?fake, "reading listing from ASM_REPORT_FAKE_OBJDUMP");
            let file = File::open(&fake).map_err(DisassemblyError::Stream)?;
            return count_tokens(lossy_lines(BufReader::new(file)), syntax);
        }

        debug!(tool = %self.program.display(), args = ?self.args, binary = %binary.display(), "spawning disassembler");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DisassemblyError::Spawn { tool: self.tool(), source })?;

        let scanned = match child.stdout.take() {
            Some(stdout) => count_tokens(lossy_lines(BufReader::new(stdout)), syntax),
            None => Err(DisassemblyError::Stream(io::Error::other("disassembler stdout not captured"))),
        };
        let counts = match scanned {
            Ok(counts) => counts,
            Err(err) => {
                abandon(&mut child);
                return Err(err);
            }
        };

        let status = child.wait().map_err(DisassemblyError::Stream)?;
        if !status.success() {
            return Err(DisassemblyError::ExternalToolFailure {
                tool: self.tool(),
                status: status.to_string(),
            });
        }
        Ok(counts)
    }

    fn name(&self) -> &'static str {
        "objdump"
    }
}

/// Backend over an in-memory listing, for callers that already hold the text.
#[derive(Debug, Clone, Default)]
pub struct ListingBackend {
    listing: String,
}

impl ListingBackend {
    pub fn new(listing: impl Into<String>) -> Self {
        Self { listing: listing.into() }
    }
}

impl DisassemblyBackend for ListingBackend {
    fn disassemble(
        &self,
        _binary: &Path,
        syntax: &LineSyntax,
    ) -> Result<TokenCounts, DisassemblyError> {
        count_tokens(lossy_lines(self.listing.as_bytes()), syntax)
    }

    fn name(&self) -> &'static str {
        "listing"
    }
}
