mod cli;
mod error;
mod logging;
mod present;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use appcast_core::{
    AppIdentity, CheckContext, CheckOutcome, Cycle, DecisionStore, HttpFeedFetcher,
    JsonFileDecisionStore, StoreError, UpdateEngine, Version,
};
use appcast_platform::AppPaths;
use clap::Parser;
use log::{debug, error, warn};

use crate::cli::{Cli, Command, remind_later_interval};
use crate::error::AppError;
use crate::settings::AppcastSettings;

const DEFAULT_APP_NAME: &str = "appcast";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            error!("{error}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let paths = AppPaths::new()
        .map_err(|e| AppError::store_failed("resolve data directories", StoreError::from(e)))?;
    let _ = paths.ensure_dirs();

    let settings_path = cli.config.clone().unwrap_or_else(|| paths.settings_file());
    let (settings, settings_error) = match AppcastSettings::try_load_from(&settings_path) {
        Ok(settings) => (settings, None),
        Err(error) => (AppcastSettings::default(), Some(error)),
    };

    let log_file = paths.log_file();
    logging::init_logging(
        Some(&log_file),
        cli.verbose || settings.debug_logging,
        settings.max_log_size_bytes,
    );
    match settings_error {
        Some(error) => warn!("{error}; using default settings"),
        None => debug!("Using settings from {}", settings_path.display()),
    }

    let store = Arc::new(JsonFileDecisionStore::new(paths));
    let context = build_context(&cli, &settings)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .user_agent(concat!("appcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AppError::http_client)?;
    let fetcher = Arc::new(HttpFeedFetcher::new(client));

    let (engine, mut outcomes) = UpdateEngine::new(context, fetcher, store.clone());

    match cli.command {
        Command::Check { wait, open } => {
            let outcome = match engine.check_once().await {
                Cycle::Finished(outcome) => outcome,
                Cycle::Deferred { until } => {
                    println!("{}", present::describe_deferred(until));
                    if !wait {
                        return Ok(ExitCode::SUCCESS);
                    }
                    engine.start();
                    match outcomes.recv().await {
                        Some(outcome) => outcome,
                        None => return Ok(ExitCode::FAILURE),
                    }
                }
            };

            match outcome {
                CheckOutcome::Checked(result) => {
                    println!("{}", present::describe_result(&result));
                    if open || settings.open_download_page {
                        present::open_download_page(&result)?;
                    }
                    Ok(ExitCode::SUCCESS)
                }
                CheckOutcome::Failed(details) => Err(AppError::update_check_failed(details)),
            }
        }
        Command::Skip { version } => {
            let version: Version = version
                .parse()
                .map_err(|e| AppError::invalid_setting("version", e))?;
            engine
                .skip(&version)
                .map_err(|e| AppError::store_failed("record skipped version", e))?;
            println!("Skipping {version} and older");
            Ok(ExitCode::SUCCESS)
        }
        Command::RemindLater { lead, unit } => {
            let interval = remind_later_interval(lead, unit, settings.remind_later())
                .map_err(|e| AppError::invalid_setting("reminder interval", e))?;
            let deadline = engine
                .remind_later(interval)
                .map_err(|e| AppError::store_failed("record reminder", e))?;
            println!("{}", present::describe_deferred(deadline));
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let state = store
                .read_state(engine.namespace())
                .map_err(|e| AppError::store_failed("read decision state", e))?;
            println!("{}", engine.namespace());
            println!("{}", present::describe_state(&state, chrono::Utc::now()));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_context(cli: &Cli, settings: &AppcastSettings) -> Result<CheckContext, AppError> {
    let publisher = cli.publisher.clone().or_else(|| settings.publisher.clone());
    let app_name = cli
        .app_name
        .clone()
        .or_else(|| settings.app_name.clone())
        .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
    let identity = AppIdentity::new(publisher, app_name);

    let feed_url = cli
        .feed_url
        .clone()
        .or_else(|| settings.feed_url.clone())
        .unwrap_or_default();
    if feed_url.is_empty() && matches!(cli.command, Command::Check { .. }) {
        return Err(AppError::missing_setting("feed URL"));
    }

    let installed = match cli
        .installed
        .as_deref()
        .or(settings.installed_version.as_deref())
    {
        Some(raw) => raw
            .parse::<Version>()
            .map_err(|e| AppError::invalid_setting("installed version", e))?,
        None if matches!(cli.command, Command::Check { .. }) => {
            return Err(AppError::missing_setting("installed version"));
        }
        None => Version::new(0, 0, 0, 0),
    };

    Ok(CheckContext::new(feed_url, installed, identity).with_remind_later(settings.remind_later()))
}
