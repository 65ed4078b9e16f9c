use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    PerLabel,
    Combined,
}

#[derive(Debug, Parser)]
#[command(
    name = "apptrack",
    version,
    about = "Sync labelled job-application mail into a Google Sheet"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output structured JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to <config dir>/apptrack/config.json)
    #[arg(long, global = true, env = "APPTRACK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one incremental sync pass
    Sync(SyncArgs),
    /// Show the target spreadsheet and its stored watermark
    Status(StatusArgs),
    /// Check an identity token from a sign-in flow
    VerifyToken { id_token: String },
}

#[derive(Debug, Args)]
struct SyncArgs {
    #[arg(long)]
    sheet_name: Option<String>,
    /// Query all labels at once instead of one query per label
    #[arg(long, default_value_t = false)]
    combined: bool,
    #[arg(long, value_enum, conflicts_with = "combined")]
    mode: Option<ModeArg>,
    /// Requests in flight while fetching
    #[arg(long)]
    concurrency: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    max_results: Option<u32>,
    /// Label whose messages become rows
    #[arg(long)]
    record_label: Option<String>,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long)]
    sheet_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::dispatch(cli).await
}

/// `RUST_LOG` when it is set and parses, otherwise `warn`.
fn log_filter(directives: Option<&str>) -> tracing_subscriber::EnvFilter {
    directives
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| tracing_subscriber::EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("warn"))
}

mod commands {
    use std::sync::Arc;

    use anyhow::{Context, Result};

    use apptrack::auth::{handle_sign_in, SignInOutcome};
    use apptrack::config::{AppConfig, ConfigOverrides};
    use apptrack::connectors::{GmailApiClient, GoogleSession, GoogleTokenVerifier, SheetsApiClient};
    use apptrack::output::{self, OutputFormat, SheetStatus};
    use apptrack::sheets::{find_by_name, WatermarkStore};
    use apptrack::sync::{QueryMode, SyncOrchestrator};

    use super::{Cli, Commands, ModeArg, StatusArgs, SyncArgs};

    pub async fn dispatch(cli: Cli) -> Result<()> {
        let config_path = cli.config.as_deref();
        match cli.command {
            Commands::Sync(args) => handle_sync(config_path, args, cli.json).await,
            Commands::Status(args) => handle_status(config_path, args, cli.json).await,
            Commands::VerifyToken { id_token } => {
                handle_verify_token(config_path, &id_token, cli.json).await
            }
        }
    }

    async fn handle_sync(
        config_path: Option<&std::path::Path>,
        args: SyncArgs,
        json: bool,
    ) -> Result<()> {
        let mode = match (args.combined, args.mode) {
            (true, _) | (_, Some(ModeArg::Combined)) => Some(QueryMode::Combined),
            (false, Some(ModeArg::PerLabel)) => Some(QueryMode::PerLabel),
            (false, None) => None,
        };
        let config = AppConfig::load(
            config_path,
            ConfigOverrides {
                sheet_name: args.sheet_name,
                mode,
                concurrency: args.concurrency,
                timeout_secs: args.timeout_secs,
                max_results: args.max_results,
                record_label: args.record_label,
            },
        )
        .context("load apptrack configuration")?;

        let session = google_session(&config)?;
        let gmail = GmailApiClient::new(Arc::clone(&session));
        let sheets = SheetsApiClient::new(session);

        let mut orchestrator = SyncOrchestrator::new(&gmail, &sheets, config.sync_options());
        let report = orchestrator
            .run()
            .await
            .with_context(|| format!("sync into spreadsheet '{}'", config.sheet_name))?;

        let formatted = output::format_sync_report(OutputFormat::from_json_flag(json), &report)?;
        println!("{formatted}");
        Ok(())
    }

    async fn handle_status(
        config_path: Option<&std::path::Path>,
        args: StatusArgs,
        json: bool,
    ) -> Result<()> {
        let config = AppConfig::load(
            config_path,
            ConfigOverrides {
                sheet_name: args.sheet_name,
                ..ConfigOverrides::default()
            },
        )
        .context("load apptrack configuration")?;

        let session = google_session(&config)?;
        let sheets = SheetsApiClient::new(session);

        let found = find_by_name(&sheets, &config.sheet_name)
            .await
            .with_context(|| format!("look up spreadsheet '{}'", config.sheet_name))?;
        let watermark = match &found {
            Some(file) => WatermarkStore::new(&sheets, &file.id)
                .read()
                .await
                .context("read stored watermark")?,
            None => None,
        };

        let status = SheetStatus {
            sheet_name: config.sheet_name.clone(),
            spreadsheet_id: found.map(|file| file.id),
            watermark,
        };
        let formatted = output::format_status(OutputFormat::from_json_flag(json), &status)?;
        println!("{formatted}");
        Ok(())
    }

    async fn handle_verify_token(
        config_path: Option<&std::path::Path>,
        id_token: &str,
        json: bool,
    ) -> Result<()> {
        let config = AppConfig::load(config_path, ConfigOverrides::default())
            .context("load apptrack configuration")?;
        let verifier = GoogleTokenVerifier::new(config.client_id.clone());

        let outcome = handle_sign_in(&verifier, id_token)
            .await
            .context("verify identity token")?;
        let formatted = output::format_sign_in(OutputFormat::from_json_flag(json), &outcome)?;
        println!("{formatted}");

        if matches!(outcome, SignInOutcome::Rejected { .. }) {
            std::process::exit(1);
        }
        Ok(())
    }

    fn google_session(config: &AppConfig) -> Result<Arc<GoogleSession>> {
        let credentials = config
            .credentials()
            .context("resolve Google API credentials")?;
        let session = GoogleSession::new(credentials).with_request_timeout(config.request_timeout);
        let session = match &config.token_url {
            Some(token_url) => session.with_token_url(token_url.clone()),
            None => session,
        };
        Ok(Arc::new(session))
    }
}
