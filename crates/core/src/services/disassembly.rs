//! Line-oriented parsing of disassembler output into token frequency tables.
//!
//! A line counts as an instruction when, after optional leading whitespace,
//! it starts with a hex address terminated by `:` followed by a mnemonic.
//! Register tokens follow the architecture's sigil and end at `,`, `:`, `)`,
//! whitespace or end of line. Anything else is skipped without complaint.

use std::collections::HashMap;
use std::io::{self, BufRead};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::definitions::DEFAULT_SIGIL;

/// Failures of the line source feeding the parser.
#[derive(Debug, Error)]
pub enum DisassemblyError {
    /// Reading a line failed for a reason other than end of stream.
    #[error("Disassembly stream failed: {0}")]
    Stream(#[source] io::Error),

    /// The disassembler could not be started.
    #[error("Failed to spawn disassembler '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The disassembler exited with a failure status.
    #[error("Disassembler '{tool}' failed ({status})")]
    ExternalToolFailure { tool: String, status: String },
}

/// Whether the listing interleaves raw instruction bytes between address and mnemonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEncoding {
    /// Skip a tab-terminated field of hex byte groups when one is present
    /// (GNU objdump default output).
    #[default]
    Auto,
    /// The listing never carries raw bytes (`--no-show-raw-insn`).
    Hidden,
}

/// Per-architecture lexical settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSyntax {
    pub sigil: char,
    pub raw_encoding: RawEncoding,
}

impl Default for LineSyntax {
    fn default() -> Self {
        Self { sigil: DEFAULT_SIGIL, raw_encoding: RawEncoding::Auto }
    }
}

impl LineSyntax {
    pub fn new(sigil: char, raw_encoding: RawEncoding) -> Self {
        Self { sigil, raw_encoding }
    }
}

/// One instruction line, borrowed from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLine<'a> {
    pub address: &'a str,
    pub mnemonic: &'a str,
    pub registers: Vec<&'a str>,
}

/// Mnemonic and register frequency tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub mnemonics: HashMap<String, u64>,
    pub registers: HashMap<String, u64>,
    /// Number of lines recognised as instructions.
    #[serde(default)]
    pub instruction_lines: u64,
}

impl TokenCounts {
    /// Parse one line and add its tokens. Returns whether the line was an instruction.
    pub fn record_line(&mut self, line: &str, syntax: &LineSyntax) -> bool {
        let Some(parsed) = parse_line(line, syntax) else {
            return false;
        };
        self.instruction_lines += 1;
        *self.mnemonics.entry(parsed.mnemonic.to_string()).or_insert(0) += 1;
        for reg in parsed.registers {
            *self.registers.entry(reg.to_string()).or_insert(0) += 1;
        }
        true
    }
}

fn is_blank(c: char) -> bool {
    c.is_whitespace()
}

fn is_register_end(c: char) -> bool {
    matches!(c, ',' | ':' | ')') || c.is_whitespace()
}

fn is_address(field: &str) -> bool {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// A field of space-separated hex groups as printed for raw instruction bytes.
///
/// A lone group only counts when it is a single byte or is followed by the
/// padding GNU objdump prints after wider encodings; otherwise hex-looking
/// mnemonics such as `fadd` would be swallowed.
fn is_byte_field(field: &str) -> bool {
    let groups: Vec<&str> = field.split_whitespace().collect();
    let all_hex = !groups.is_empty()
        && groups.iter().all(|g| g.len() % 2 == 0 && g.chars().all(|c| c.is_ascii_hexdigit()));
    if !all_hex {
        return false;
    }
    groups.len() > 1 || groups[0].len() == 2 || field.ends_with(char::is_whitespace)
}

/// Parse a single disassembly line. `None` for anything that is not an instruction.
pub fn parse_line<'a>(line: &'a str, syntax: &LineSyntax) -> Option<InstructionLine<'a>> {
    let line = line.trim_start_matches(is_blank);
    let colon = line.find(':')?;
    let address = &line[..colon];
    if !is_address(address) {
        return None;
    }

    let mut rest = line[colon + 1..].trim_start_matches(is_blank);
    if syntax.raw_encoding == RawEncoding::Auto {
        match rest.split_once('\t') {
            Some((bytes, after)) if is_byte_field(bytes) => {
                rest = after.trim_start_matches(is_blank);
            }
            // Continuation line holding only the tail of a long encoding.
            None if is_byte_field(rest) => return None,
            _ => {}
        }
    }

    let end = rest.find(is_blank).unwrap_or(rest.len());
    let mnemonic = &rest[..end];
    if mnemonic.is_empty() {
        return None;
    }

    let mut registers = Vec::new();
    let mut operands = &rest[end..];
    while let Some(at) = operands.find(syntax.sigil) {
        let token_start = &operands[at + syntax.sigil.len_utf8()..];
        let len = token_start.find(is_register_end).unwrap_or(token_start.len());
        if len > 0 {
            registers.push(&token_start[..len]);
        }
        operands = &token_start[len..];
    }

    Some(InstructionLine { address, mnemonic, registers })
}

/// Scan a line stream to completion, accumulating token counts.
///
/// Lines are processed one at a time; the stream is never buffered whole.
/// End of stream is normal termination. Any read error aborts the scan.
pub fn count_tokens<I>(lines: I, syntax: &LineSyntax) -> Result<TokenCounts, DisassemblyError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut counts = TokenCounts::default();
    let mut skipped = 0u64;
    for line in lines {
        let line = line.map_err(DisassemblyError::Stream)?;
        if !counts.record_line(&line, syntax) {
            skipped += 1;
        }
    }
    debug!(
        instructions = counts.instruction_lines,
        skipped,
        mnemonics = counts.mnemonics.len(),
        registers = counts.registers.len(),
        "disassembly scanned"
    );
    Ok(counts)
}

/// Lines of a reader with invalid UTF-8 replaced rather than rejected.
pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines { reader, buf: Vec::new() }
}

/// Iterator returned by [`lossy_lines`].
#[derive(Debug)]
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let text = String::from_utf8_lossy(&self.buf);
                Some(Ok(text.trim_end_matches(['\n', '\r']).to_string()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str, syntax: LineSyntax) -> TokenCounts {
        count_tokens(lossy_lines(text.as_bytes()), &syntax).unwrap()
    }

    #[test]
    fn gnu_line_with_raw_bytes() {
        let parsed =
            parse_line(" 1004:\t89 45 fc\tmov    %eax,-0x4(%rbp)", &LineSyntax::default()).unwrap();
        assert_eq!(parsed.address, "1004");
        assert_eq!(parsed.mnemonic, "mov");
        assert_eq!(parsed.registers, vec!["eax", "rbp"]);
    }

    #[test]
    fn example_line_counts() {
        let counts = scan(" 1004:\t89 45 fc\tmov    %eax,-0x4(%rbp)\n", LineSyntax::default());
        assert_eq!(counts.mnemonics.len(), 1);
        assert_eq!(counts.mnemonics["mov"], 1);
        assert_eq!(counts.registers["eax"], 1);
        assert_eq!(counts.registers["rbp"], 1);
        assert_eq!(counts.registers.len(), 2);
    }

    #[test]
    fn section_headers_and_labels_are_skipped() {
        let syntax = LineSyntax::default();
        assert!(parse_line("Disassembly of section .text:", &syntax).is_none());
        assert!(parse_line("0000000000001000 <_start>:", &syntax).is_none());
        assert!(parse_line("", &syntax).is_none());
        assert!(parse_line("/tmp/a.out:     file format elf64-x86-64", &syntax).is_none());
        assert!(parse_line("    1000:", &syntax).is_none());
    }

    #[test]
    fn llvm_listing_without_raw_bytes() {
        let syntax = LineSyntax::new('%', RawEncoding::Hidden);
        let parsed = parse_line("    1130:      \tmovl\t%edi, -0x14(%rbp)", &syntax).unwrap();
        assert_eq!(parsed.mnemonic, "movl");
        assert_eq!(parsed.registers, vec!["edi", "rbp"]);
    }

    #[test]
    fn register_tokens_stop_at_colon_and_paren() {
        let parsed =
            parse_line("  4005d6:\tf3 aa\trep stos %al,%es:(%rdi)", &LineSyntax::default()).unwrap();
        assert_eq!(parsed.mnemonic, "rep");
        assert_eq!(parsed.registers, vec!["al", "es", "rdi"]);
    }

    #[test]
    fn bare_sigils_are_ignored() {
        let parsed = parse_line("10: nop %, %)", &LineSyntax::new('%', RawEncoding::Hidden)).unwrap();
        assert_eq!(parsed.mnemonic, "nop");
        assert!(parsed.registers.is_empty());
    }

    #[test]
    fn continuation_bytes_are_not_instructions() {
        let text = "  401000:\t48 b8 00 00 00 00 00 \tmovabs $0x0,%rax\n  401007:\t00 00 00 \n";
        let counts = scan(text, LineSyntax::default());
        assert_eq!(counts.instruction_lines, 1);
        assert_eq!(counts.mnemonics["movabs"], 1);
        assert_eq!(counts.registers["rax"], 1);
    }

    #[test]
    fn architecture_sigil_is_respected() {
        let syntax = LineSyntax::new('$', RawEncoding::Hidden);
        let parsed = parse_line("  80: addu $v0,$a0,$a1", &syntax).unwrap();
        assert_eq!(parsed.registers, vec!["v0", "a0", "a1"]);
    }

    #[test]
    fn aarch64_word_encoding_is_skipped() {
        let parsed =
            parse_line("  400078:\td503201f \tnop", &LineSyntax::new('%', RawEncoding::Auto))
                .unwrap();
        assert_eq!(parsed.mnemonic, "nop");
    }

    #[test]
    fn hex_looking_mnemonic_is_not_taken_for_bytes() {
        let syntax = LineSyntax::default();
        let arm = parse_line("  400078:\tfadd\td0, d1, d2", &syntax).unwrap();
        assert_eq!(arm.mnemonic, "fadd");

        let x87 = parse_line("    1130:\tfadd\t%st(1),%st", &syntax).unwrap();
        assert_eq!(x87.mnemonic, "fadd");
        assert_eq!(x87.registers, vec!["st(1", "st"]);

        let bare = parse_line("    1134:\tfadd", &syntax).unwrap();
        assert_eq!(bare.mnemonic, "fadd");
    }

    #[test]
    fn padded_encodings_are_still_skipped() {
        let syntax = LineSyntax::default();
        assert_eq!(parse_line("  1000:\t55\tpush   %rbp", &syntax).unwrap().mnemonic, "push");
        assert_eq!(parse_line("  2000:\tde c1 \tfaddp  %st,%st(1)", &syntax).unwrap().mnemonic, "faddp");
        assert_eq!(parse_line("  400080:\t1e622820 \tfadd\td0, d1, d2", &syntax).unwrap().mnemonic, "fadd");
        assert!(parse_line("  401007:\t00 ", &syntax).is_none());
    }

    #[test]
    fn counts_accumulate_across_lines() {
        let text = "\
Disassembly of section .text:

0000000000001000 <_start>:
    1000:\t55\tpush   %rbp
    1001:\t48 89 e5\tmov    %rsp,%rbp
    1004:\t89 45 fc\tmov    %eax,-0x4(%rbp)
";
        let counts = scan(text, LineSyntax::default());
        assert_eq!(counts.instruction_lines, 3);
        assert_eq!(counts.mnemonics["mov"], 2);
        assert_eq!(counts.mnemonics["push"], 1);
        assert_eq!(counts.registers["rbp"], 3);
        assert_eq!(counts.registers["rsp"], 1);
    }

    #[test]
    fn invalid_utf8_does_not_abort() {
        let bytes: &[u8] = b"  10:\tc3\tret\n\xff\xfe garbage\n  11:\tc3\tret\n";
        let counts = count_tokens(lossy_lines(bytes), &LineSyntax::default()).unwrap();
        assert_eq!(counts.mnemonics["ret"], 2);
    }

    #[test]
    fn read_error_aborts_with_stream_error() {
        let lines = vec![
            Ok("  10:\tc3\tret".to_string()),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")),
            Ok("  11:\tc3\tret".to_string()),
        ];
        let err = count_tokens(lines, &LineSyntax::default()).unwrap_err();
        assert!(matches!(err, DisassemblyError::Stream(_)));
        assert!(err.to_string().contains("pipe closed"));
    }
}
