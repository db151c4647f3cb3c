pub mod cli;
pub mod run_config;

pub use run_config::RunConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "phone-validator")]
#[command(about = "Validates phone numbers in batches against a remote lookup service")]
pub struct CliConfig {
    #[arg(long, default_value = "config.txt", help = "key=value run configuration")]
    pub config: String,

    #[arg(long, default_value = "input_numbers.csv", help = "Numbers in the first column")]
    pub input: String,

    #[arg(long, default_value = ".")]
    pub output_dir: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}
