use std::path::{Path, PathBuf};
use std::process::ExitCode;

use action_flow::SwapOrchestrator;
use action_locator::SelectorCatalogue;
use anyhow::{Context, Result};
use cdp_adapter::BrowserSession;
use clap::{Parser, Subcommand};
use swapbot_cli::cli::{init_logging, load_env_overrides, render, OutputFormat};
use swapbot_cli::{ConfigError, RunMode, SwapBot, SwapbotConfig, VERSION};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    debug: bool,

    /// Run the browser headless regardless of mode and HEADLESS
    #[arg(long, global = true)]
    headless: bool,

    /// YAML file overriding selector sets per role
    #[arg(long, value_name = "FILE", global = true)]
    catalogue: Option<PathBuf>,

    /// Chrome or Chromium executable
    #[arg(long, value_name = "PATH", global = true)]
    chrome: Option<PathBuf>,

    /// Browser profile directory holding the wallet state
    #[arg(long, value_name = "DIR", global = true)]
    user_data_dir: Option<PathBuf>,

    /// Unpacked wallet extension to load (repeatable)
    #[arg(long = "extension", value_name = "DIR", global = true)]
    extensions: Vec<PathBuf>,

    #[arg(short, long, default_value = "human", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Buy or sell using ACTION, AMOUNT and HEADLESS
    Run {
        /// buy or sell; defaults to ACTION, then buy
        action: Option<String>,
    },
    /// Buy ETH_AMOUNT worth of the token in a visible browser
    Buy,
    /// Sell TOKEN_AMOUNT tokens in a visible browser
    Sell,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.debug)?;
    info!("Starting swapbot v{}", VERSION);
    load_env_overrides(Path::new(".env"));

    let mode = match cli.command {
        None => RunMode::Generic { action: None },
        Some(Commands::Run { action }) => RunMode::Generic { action },
        Some(Commands::Buy) => RunMode::QuickBuy,
        Some(Commands::Sell) => RunMode::QuickSell,
    };

    let mut config = SwapbotConfig::from_env();
    if cli.user_data_dir.is_some() {
        config.user_data_dir = cli.user_data_dir.clone();
    }
    config.extensions.extend(cli.extensions.iter().cloned());
    if config.extensions.is_empty() {
        warn!("No wallet extension configured; wallet popups cannot appear");
    }
    let plan = match config.plan(&mode, cli.headless) {
        Ok(plan) => plan,
        Err(err @ ConfigError::InvalidAction(_)) => {
            eprintln!("{}", err);
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err.into()),
    };
    let token_address = config.token_address()?.to_string();

    let catalogue = match &cli.catalogue {
        Some(path) => SelectorCatalogue::from_path(path)
            .with_context(|| format!("Failed to load selector catalogue {}", path.display()))?,
        None => SelectorCatalogue::okx_default(),
    };

    let cancel = CancellationToken::new();
    let orchestrator = SwapOrchestrator::new(catalogue)
        .context("Selector catalogue is unusable")?
        .with_cancel_token(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling run");
            cancel.cancel();
        }
    });

    let session = BrowserSession::new(config.cdp_config(&plan, cli.chrome.clone()));
    let bot = SwapBot::new(session, orchestrator);

    match bot.run(&token_address, &plan).await {
        Ok(result) => {
            println!("{}", render(&result, cli.output)?);
            Ok(if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(err) => {
            error!(error = %err, "Run aborted");
            eprintln!("Error: {}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}
