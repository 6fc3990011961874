//! Command dispatch
//!
//! Resolves the flags into a [`RunConfig`](crate::downloader::RunConfig), a
//! Weatherbit client and a retry policy, then hands the run to the executor.

use super::summary::{print_failure, print_nothing_to_do, print_run_summary, print_status, StatusReport};
use super::{Cli, CliError, Commands, OutputFormat, RunArgs, TerminalPrompt};
use crate::catalog::Catalog;
use crate::downloader::{
    generate_all, ConfirmEvery, DownloadError, RateLimiter, RetryPolicy, RoundBudget,
    RunExecutor, RunSeed,
};
use crate::fetcher::http::build_http_client;
use crate::fetcher::WeatherbitClient;
use crate::resume::{CheckpointStore, FailureLog};
use crate::shutdown::SharedShutdown;
use std::sync::Arc;
use tracing::{error, info};

/// Execute the parsed command line
pub async fn execute(cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
    let result = match &cli.command {
        Commands::Status => return show_status(cli),
        Commands::Run(args) => match build_tasks(args) {
            Ok(tasks) => run(cli, RunSeed::Fresh(tasks), shutdown).await,
            Err(e) => Err(e),
        },
        Commands::Resume => run(cli, RunSeed::Resume, shutdown).await,
        Commands::RetryFailed => run(cli, RunSeed::FailureLog, shutdown).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(CliError::DownloadError(DownloadError::NothingToDo(reason))) => {
            print_nothing_to_do(&reason, cli.output_format)
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            print_failure(&e, cli.output_format)?;
            Err(e)
        }
    }
}

async fn run(cli: &Cli, seed: RunSeed, shutdown: SharedShutdown) -> Result<(), CliError> {
    let config = cli.run_config();
    let client = Arc::new(build_client(cli)?);

    let executor = RunExecutor::new(config, client.clone(), client, retry_policy(cli))
        .with_shutdown(shutdown)
        .with_progress_bar(cli.output_format == OutputFormat::Human);

    let summary = executor.execute(seed).await?;
    let failure_log = FailureLog::in_dir(&cli.state_dir);
    print_run_summary(&summary, cli.output_format, failure_log.path())
}

/// Read the catalog and tile every selected station
fn build_tasks(args: &RunArgs) -> Result<Vec<crate::FetchTask>, CliError> {
    if args.report_types.is_empty() {
        return Err(CliError::InvalidArgument(
            "at least one report type is required".to_string(),
        ));
    }

    let catalog = Catalog::from_path(&args.catalog)?;
    let selected = catalog.select(&args.report_types);
    let tasks = generate_all(&selected, args.start, args.end)?;

    info!(
        stations = selected.len(),
        problematic = catalog.problematic(),
        tasks = tasks.len(),
        start = %args.start,
        end = %args.end,
        "Generated fetch tasks"
    );
    Ok(tasks)
}

fn build_client(cli: &Cli) -> Result<WeatherbitClient, CliError> {
    let api_key = cli.api_key.clone().ok_or_else(|| {
        CliError::InvalidArgument("an API key is required (--api-key or WEATHERBIT_API_KEY)".to_string())
    })?;

    let http = build_http_client(cli.run_config().fetch_timeout)?;
    let mut client = WeatherbitClient::new(http, cli.base_url.clone(), api_key)?
        .with_unparseable_policy(cli.unparseable_policy());
    if let Some(per_minute) = cli.requests_per_minute {
        client = client.with_rate_limiter(Arc::new(RateLimiter::per_minute(per_minute)));
    }
    Ok(client)
}

/// Unattended runs get a fixed round budget; interactive runs ask on the terminal
fn retry_policy(cli: &Cli) -> Arc<dyn RetryPolicy> {
    if cli.unattended {
        Arc::new(RoundBudget::new(cli.max_retry_rounds))
    } else {
        Arc::new(ConfirmEvery::new(
            cli.retry_round_size,
            Arc::new(TerminalPrompt),
        ))
    }
}

fn show_status(cli: &Cli) -> Result<(), CliError> {
    let checkpoint = CheckpointStore::new(&cli.state_dir).load()?;
    let failed = FailureLog::in_dir(&cli.state_dir).len()?;
    let report = StatusReport::new(&cli.state_dir, checkpoint.as_ref(), failed);
    print_status(&report, cli.output_format)
}
