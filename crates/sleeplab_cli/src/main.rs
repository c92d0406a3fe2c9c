//! SleepLab CLI
//!
//! Command-line tools for CPAP flow analysis.
//!
//! # Commands
//!
//! - `analyze` - Analyze a flow recording and print its metrics
//! - `simulate` - Run a recording through an in-process store and both stations
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::analyze::{AnalysisArgs, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SleepLab command-line tools.
#[derive(Parser)]
#[command(name = "sleeplab")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a flow recording
    Analyze {
        /// Flow file
        file: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Output format (text, json)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,

        /// Write the waveform PNG here
        #[arg(long)]
        image: Option<PathBuf>,

        /// Write the metrics JSON here
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// Upload a recording through an in-process store and show both stations
    Simulate {
        /// Flow file
        file: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Medical record number
        #[arg(long)]
        mrn: u64,

        /// Room number
        #[arg(long)]
        room: u32,

        /// Patient name
        #[arg(long)]
        name: Option<String>,

        /// Pressure setting during the recording (4-25)
        #[arg(long)]
        cpap: i64,

        /// Pressure the monitoring station sets after the upload
        #[arg(long)]
        set_pressure: Option<i64>,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "200")]
        poll_interval_ms: u64,

        /// Number of poll intervals to run before printing
        #[arg(long, default_value = "3")]
        polls: u32,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            file,
            analysis,
            output,
            image,
            metrics,
        } => {
            let text = commands::analyze::run(
                &file,
                &analysis,
                output,
                image.as_deref(),
                metrics.as_deref(),
            )?;
            print!("{}", text);
        }
        Commands::Simulate {
            file,
            analysis,
            mrn,
            room,
            name,
            cpap,
            set_pressure,
            poll_interval_ms,
            polls,
        } => {
            let options = commands::simulate::SimulateOptions {
                file,
                analysis,
                mrn,
                room,
                name,
                cpap,
                set_pressure,
                poll_interval_ms,
                polls,
            };
            let outcome = commands::simulate::run(&options)?;
            print!("{}", outcome);
        }
        Commands::Version => {
            println!("SleepLab CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
