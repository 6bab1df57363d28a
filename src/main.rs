use clap::Parser;
use hewston_bars::cli::{self, Cli, Commands};
use hewston_bars::config::Config;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration; a missing file means defaults
    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config.with_base_dir(cli.data_dir.clone()),
        Err(e) => {
            eprintln!("Error: could not load config from {}: {:#}", cli.config, e);
            return ExitCode::from(2);
        }
    };

    // Initialize telemetry
    if let Err(e) = hewston_bars::telemetry::init_telemetry(&config.telemetry) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Commands::Derive(args) => args.execute(&config).await,
        Commands::DeriveAll(args) => args.execute(&config).await,
        Commands::Datasets(args) => args.execute(&config).await,
        Commands::Config => toml::to_string_pretty(&config)
            .map(|text| print!("{text}"))
            .map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            let code = cli::exit_code(&e);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
