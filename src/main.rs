//! crzp-thesis - CRZP thesis catalogue from the command line
//!
//! Each retrieval subcommand runs one isolated browser session and prints
//! the same text the conversation tools return.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crzp_thesis::{
    CatalogueError, Config, ProcessSupervisor, ThesisTools, ensure_browser_installed,
    fetch_abstracts, format_abstracts, format_listing, load_yaml_config, render_error,
    retrieve_pdf, search_theses,
};

#[derive(Debug, Parser)]
#[command(name = "crzp-thesis", version, about = "Search theses in the CRZP catalogue")]
struct Cli {
    /// YAML config file (defaults to $CRZP_CONFIG, then ./config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Find or download a Chromium build; run once before anything else
    Setup,
    /// List theses matching a search term
    Search { term: String },
    /// Print the abstracts of a thesis detail page
    Abstract { detail_url: String },
    /// Download the PDF of a thesis detail page, if it has one
    Pdf { detail_url: String },
    /// Run the PDF-to-text helper until Ctrl-C or SIGTERM
    Helper,
    /// Print the tool definitions as JSON
    Tools,
    /// Invoke a tool by name with JSON arguments
    Call { name: String, args: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CatalogueError>() {
                Some(catalogue_error) => eprintln!("{}", render_error(catalogue_error)),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(load_yaml_config()?),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Setup => {
            let path = ensure_browser_installed(&config.browser).await?;
            println!("Browser ready: {}", path.display());
        }
        Command::Search { term } => {
            let records = search_theses(&config, &term).await?;
            println!("{}", format_listing(&records));
        }
        Command::Abstract { detail_url } => {
            let abstracts = fetch_abstracts(&config, &detail_url).await?;
            println!("{}", format_abstracts(&abstracts));
        }
        Command::Pdf { detail_url } => {
            println!("{}", retrieve_pdf(&config, &detail_url).await?);
        }
        Command::Helper => run_helper(config).await?,
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&ThesisTools::definitions())?);
        }
        Command::Call { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("Tool arguments must be a JSON object")?;
            println!("{}", ThesisTools::new(config).execute(&name, args).await);
        }
    }

    Ok(())
}

async fn run_helper(config: Config) -> Result<()> {
    let supervisor = ProcessSupervisor::from_config(config.helper);
    let pid = supervisor.start().await?;
    println!("Helper running (pid {})", pid.map_or("unknown".to_string(), |p| p.to_string()));

    let signal = shutdown_signal().await;
    info!("Shutting down helper ({})", signal);
    supervisor.stop().await;
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM
///
/// The runtime does not run destructors on SIGTERM, so the helper would be
/// orphaned unless `stop()` runs first.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "Ctrl-C",
        _ = terminate => "SIGTERM",
    }
}
