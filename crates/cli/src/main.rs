use anyhow::Context;
use clap::{Parser, Subcommand};
use refdata_core::session::replay::ReplayGateway;
use refdata_core::session::{Session, SessionOptions};
use refdata_core::domain::TimeCoercion;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "refdata")]
struct Args {
    /// Recorded session (JSON) to play back instead of a live server.
    #[arg(long)]
    replay: PathBuf,

    /// Server host; overrides REFDATA_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Server port; overrides REFDATA_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Seconds to wait for a terminal response; overrides REFDATA_TIMEOUT_SECS.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Decode TIME fields as date-times anchored on 0001-01-01.
    #[arg(long)]
    legacy_time: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Current field values for one or more securities.
    Snapshot {
        #[arg(long, value_delimiter = ',', required = true)]
        securities: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
    },
    /// Daily field values over an inclusive date range.
    History {
        #[arg(long, value_delimiter = ',', required = true)]
        securities: Vec<String>,
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
        /// First date (YYYY-MM-DD).
        #[arg(long)]
        start: String,
        /// Last date (YYYY-MM-DD).
        #[arg(long)]
        end: String,
    },
    /// Intraday bars for one security on one day.
    Bars {
        #[arg(long)]
        security: String,
        /// TRADE, BID, ASK, BEST_BID or BEST_ASK.
        #[arg(long, default_value = "TRADE")]
        event_type: String,
        /// Bar length in minutes.
        #[arg(long, default_value_t = 60)]
        interval: u32,
        /// Trading day (YYYY-MM-DD). Defaults to the previous weekday.
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = refdata_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = run(args, &settings).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "refdata run failed");
    }
    res
}

async fn run(args: Args, settings: &refdata_core::config::Settings) -> anyhow::Result<()> {
    let mut options = SessionOptions::from_settings(settings);
    if let Some(host) = args.host {
        options.server_host = host;
    }
    if let Some(port) = args.port {
        options.server_port = port;
    }
    if let Some(secs) = args.timeout_secs {
        options.request_timeout = Duration::from_secs(secs);
    }
    if args.legacy_time {
        options.time_coercion = TimeCoercion::LegacyDateTime;
    }

    let gateway = ReplayGateway::from_path(&args.replay)?;
    let mut session = Session::new(gateway, options);
    session.open().await.context("failed to open session")?;
    tracing::debug!(
        service = %session.options().service,
        timeout_secs = session.options().request_timeout.as_secs(),
        "running command"
    );

    let output = commands::execute(&mut session, args.command).await;
    session.close().await;
    let output = output?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_sentry(settings: &refdata_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
