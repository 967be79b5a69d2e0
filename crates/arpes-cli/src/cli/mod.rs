mod commands;
mod helpers;
mod loaders;

use arpes_core::ArpesError;
use clap::Parser;
use loaders::LoadError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let arpes_error = error.as_arpes_error();
            eprintln!("{}", arpes_error.diagnostic_line());
            arpes_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "arpes-rs", version, about = "ARPES angle-to-momentum conversion")]
struct Cli {
    /// Log conversion decisions at debug level (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Convert a cut, map or photon-energy scan to momentum space
    Convert(commands::ConvertArgs),
    /// Solve offsets so one calibration point sits at the momentum origin, then cut through it
    ThroughPoint(commands::ThroughPointArgs),
    /// Like through-point, also rotating the azimuth so a second point lies on the through axis
    ThroughPair(commands::ThroughPairArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Convert(args) => commands::run_convert_command(args),
        CliCommand::ThroughPoint(args) => commands::run_through_point_command(args),
        CliCommand::ThroughPair(args) => commands::run_through_pair_command(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ArpesError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_arpes_error(&self) -> ArpesError {
        match self {
            Self::Usage(message) => ArpesError::invalid_input("INPUT.CLI_USAGE", message.trim_end().to_string()),
            Self::Compute(error) => error.clone(),
            Self::Load(error) => error.as_arpes_error(),
            Self::Internal(error) => ArpesError::io("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<ArpesError> for CliError {
    fn from(error: ArpesError) -> Self {
        Self::Compute(error)
    }
}
