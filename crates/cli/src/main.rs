use anyhow::Result;
use asm_report::commands::{info_command, inspect_command, update_command, GlobalArgs};
use asm_report::init_logging;
use clap::{Parser, Subcommand};

/// Report which ISA extensions a compiled ELF binary actually uses.
///
/// This CLI is a thin wrapper around `asm-report-core` (exposed in code as `asm_report_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "asm-report",
    version,
    about = "Report ISA extension usage of ELF binaries",
    long_about = None
)]
struct Cli {
    /// Root directory holding `.asm-report/` and `defs/`.
    #[arg(long, global = true, env = "ASM_REPORT_HOME", default_value = ".")]
    root: String,

    /// Knowledge-base file to use instead of the configured one.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Config file to use instead of `<root>/.asm-report/config.json`.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging on stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known architectures, or show every architecture with a given name in detail.
    Info {
        /// Architecture name (e.g., x86_64).
        arch: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Resolve each binary's architecture and report its ISA usage.
    Inspect {
        /// Paths to ELF binaries.
        #[arg(required = true, num_args = 1..)]
        binaries: Vec<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also list mnemonics and registers missing from the knowledge base.
        #[arg(long, default_value_t = false)]
        show_gaps: bool,
    },

    /// Rebuild the knowledge base from a definitions directory.
    ///
    /// The new base is written beside the live one and swapped in only when
    /// complete; on any error the live base is left untouched.
    #[command(visible_alias = "up")]
    Update {
        /// Definitions directory. Defaults to the configured one (`defs/` under the root).
        #[arg(long)]
        defs: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let args = GlobalArgs::new(cli.root, cli.db, cli.config);

    match cli.command {
        Command::Info { arch, json } => info_command(&args, arch.as_deref(), json)?,
        Command::Inspect { binaries, json, show_gaps } => {
            inspect_command(&args, &binaries, json, show_gaps)?
        }
        Command::Update { defs, json } => update_command(&args, defs.as_deref(), json)?,
    }

    Ok(())
}
