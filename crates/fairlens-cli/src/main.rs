//! # fairlens CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fairlens_cli::signing::{
    run_encode, run_keygen, run_sign, run_verify, EncodeArgs, KeygenArgs, SignArgs, VerifyArgs,
};
use fairlens_cli::simulate::{run_simulate, SimulateArgs};

/// FairLens: milestone escrow released against verifier attestations.
#[derive(Parser, Debug)]
#[command(name = "fairlens", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to an escrow configuration YAML.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a verifier Ed25519 keypair.
    Keygen(KeygenArgs),

    /// Print the canonical attestation message for the given fields.
    Encode(EncodeArgs),

    /// Sign an attestation with a verifier key.
    Sign(SignArgs),

    /// Verify a signature over an attestation message.
    Verify(VerifyArgs),

    /// Replay an escrow scenario and print the final state.
    Simulate(SimulateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Keygen(args) => run_keygen(&args),
        Commands::Encode(args) => run_encode(&args),
        Commands::Sign(args) => run_sign(&args),
        Commands::Verify(args) => run_verify(&args),
        Commands::Simulate(args) => fairlens_cli::load_config(cli.config.as_deref())
            .and_then(|config| run_simulate(&args, config)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
