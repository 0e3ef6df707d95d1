//! promote: validate and deploy tracker project packages from a commit.
//!
//! # Usage
//!
//! ```text
//! promote changes [--json]
//! promote check [--force] [--target <alias|url>] [--json]
//! promote deploy [--force] [--dry-run] [--target <alias|url>] [--json]
//! promote whoami [--target <alias|url>]
//! ```
//!
//! Every command accepts `--repo <dir>`, `--config <file>` and `--verbose`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    changes::ChangesArgs, check::CheckArgs, deploy::DeployArgs, whoami::WhoamiArgs, GlobalArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "promote",
    version,
    about = "Validate and deploy tracker project packages between server stages",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the files the current commit changed and how they are classified.
    Changes(ChangesArgs),

    /// Run the consistency checks against the changed packages.
    Check(CheckArgs),

    /// Check, then deploy the changed packages to the target server.
    Deploy(DeployArgs),

    /// Show which server account the commit author resolves to.
    Whoami(WhoamiArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    match cli.command {
        Commands::Changes(args) => args.run(&cli.global),
        Commands::Check(args) => args.run(&cli.global),
        Commands::Deploy(args) => args.run(&cli.global),
        Commands::Whoami(args) => args.run(&cli.global),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
