//! Cut&Shoot command-line interface.
//!
//! The main entry point for the `cutshot` CLI tool: partition a workload,
//! plan backends and shots, or sweep the subcircuit count.

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{partition, plan, sweep, version};

/// Cut&Shoot - MILP planning for circuit-cutting workloads
#[derive(Parser)]
#[command(name = "cutshot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: partition, select backends, allocate shots
    Plan {
        /// Problem description (JSON)
        #[arg(short, long)]
        input: String,

        /// Output file for the plan (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Partition the workload graph only
    Partition {
        /// Problem description (JSON)
        #[arg(short, long)]
        input: String,

        /// Output file for the partition plan (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Sweep the subcircuit count and rank candidates by solver objective
    /// plus reconstruction cost
    Sweep {
        /// Problem description (JSON)
        #[arg(short, long)]
        input: String,

        /// Largest subcircuit count to try (sweeps 1..=max)
        #[arg(short, long)]
        max: usize,

        /// Reconstruction channels per cut
        #[arg(long, default_value = "16.0")]
        channels_per_cut: f64,

        /// Output file for the winning plan (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Plan { input, output } => plan::execute(&input, output.as_deref()),

        Commands::Partition { input, output } => partition::execute(&input, output.as_deref()),

        Commands::Sweep { input, max, channels_per_cut, output } => {
            sweep::execute(&input, max, channels_per_cut, output.as_deref())
        }

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
