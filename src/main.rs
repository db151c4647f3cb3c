use anyhow::Context;
use clap::Parser;
use phone_validator::utils::error::{ErrorSeverity, ValidatorError};
use phone_validator::utils::logger;
use phone_validator::{CliConfig, LocalStorage, LookupPipeline, RunConfig, ValidationEngine};
use std::path::Path;

fn exit_code(e: &ValidatorError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn report_and_exit(phase: &str, e: ValidatorError) -> ! {
    tracing::error!(
        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
        phase,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e).max(1));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting phone-validator");
    tracing::debug!("CLI config: {:?}", cli);

    // 配置錯誤在任何網路請求之前終止
    let config = match RunConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => report_and_exit("Configuration", e),
    };
    tracing::info!(
        "Config: batch_size={}, concurrency={}, retries={}, endpoint={}",
        config.batch_size,
        config.concurrency,
        config.retries,
        config.endpoint
    );

    let input = std::env::current_dir()
        .context("cannot resolve the working directory")?
        .join(&cli.input);
    let storage = LocalStorage::new(cli.output_dir.clone());
    let pipeline = LookupPipeline::new(storage, &config, input.to_string_lossy());

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    let engine = ValidationEngine::new_with_monitoring(pipeline, cli.monitor);

    match engine.run().await {
        Ok(file_name) => {
            let output_path = Path::new(&cli.output_dir).join(file_name);
            tracing::info!("✅ Validation completed successfully!");
            println!("✅ Validation completed successfully!");
            println!("📁 Output saved to: {}", output_path.display());
            Ok(())
        }
        Err(e) => report_and_exit("Validation run", e),
    }
}
