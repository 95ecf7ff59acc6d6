use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{LevelFilter, error, info};
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use file_taxes::captcha::CaptchaResolver;
use file_taxes::codec;
use file_taxes::config::{Config, data_dir};
use file_taxes::domain::RunReport;
use file_taxes::notify;
use file_taxes::orchestrator::Orchestrator;
use file_taxes::portal::Portal;
use file_taxes::session::Session;

fn setup_logging(verbose: bool, debug: bool) -> Result<PathBuf> {
    let log_dir = data_dir().join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("file-taxes.log");
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let level = if debug {
        LevelFilter::Debug
    } else if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    // RUST_LOG is parsed last so it wins over the flags
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("file_taxes", level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

/// Full filing run; returns whether everything succeeded
async fn run_filing(config: &Config) -> bool {
    let portal = Portal::new(&config.http.base_url);
    let mut orchestrator = Orchestrator::new(
        portal,
        CaptchaResolver::from_config(&config.captcha),
        notify::from_config(&config.notify),
    );

    let setup = config
        .credential()
        .and_then(|credential| Ok((credential, Session::from_config(config)?)));
    let (credential, mut session) = match setup {
        Ok(ready) => ready,
        Err(e) => {
            let report = orchestrator.abort(&e).await;
            print_report(&report);
            return false;
        }
    };

    println!(
        "{} {} for period {}",
        "Filing".cyan(),
        credential.identifier(),
        orchestrator.period()
    );
    let report = orchestrator.run(&mut session, &credential).await;
    print_report(&report);
    report.is_success()
}

fn print_report(report: &RunReport) {
    if let Some(fatal) = &report.fatal {
        println!("{} {}", "✗".red(), fatal.message);
    }
    if report.authenticated && report.entries.is_empty() && report.fatal.is_none() {
        println!("{}", "No pending actions".green());
    }
    for entry in &report.entries {
        if entry.result.succeeded {
            println!("{} {}: {}", "✓".green(), entry.obligation, entry.result.message);
        } else {
            println!("{} {}: {}", "✗".red(), entry.obligation, entry.result.message.red());
        }
    }

    match report.category() {
        None => {
            info!("Run finished successfully");
            println!("{}", "Done".green());
        }
        Some(category) => {
            error!("Run failed: {}", category);
            println!("{}", format!("Run failed: {}", category).red());
        }
    }
}

fn handle_encode_command(json: &str) -> Result<bool> {
    let value: serde_json::Value = serde_json::from_str(json).context("Argument is not valid JSON")?;
    println!("{}", codec::encode(&value).context("Failed to encode")?);
    Ok(true)
}

fn handle_decode_command(envelope: &str) -> Result<bool> {
    let value = codec::decode(envelope.trim()).context("Failed to decode envelope")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(true)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Run) => Ok(run_filing(config).await),
        Some(Commands::Encode { json }) => handle_encode_command(json),
        Some(Commands::Decode { envelope }) => handle_decode_command(envelope),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; flags and environment override the file
    let config = Config::load(cli.config.as_ref())
        .context("Failed to load configuration")?
        .resolve(&cli.overrides());

    setup_logging(config.verbose, config.debug).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    let success = run_application(&cli, &config).await.context("Application failed")?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
