use std::io::Write;
use std::net::SocketAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::signal::unix::SignalKind;

use huginn::backend::hass;
use huginn::config;
use huginn::error::ApiResult;
use huginn::server;
use huginn::server::appstate::AppState;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "debug",
        "hyper_util=info",
        "reqwest=info",
        "sqlx=warn",
        "tower_http::trace::on_request=info",
        "h2=info",
        "axum::rejection=trace",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()
    } else {
        pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()
    }
    .map_err(|err| huginn::error::ApiError::service_error(err.to_string()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {err}");
        }
    };

    let terminate = async {
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => log::error!("Failed to install SIGTERM handler: {err}"),
        }
    };

    tokio::select! {
        () = ctrl_c => log::warn!("Ctrl-C pressed, exiting.."),
        () = terminate => log::warn!("SIGTERM received, exiting.."),
    }
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let args = Args::parse();

    let mut config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully");
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let appstate = AppState::from_config(config).await?;

    let poll_interval = appstate.config().hub.poll_interval_secs();
    let poller = tokio::spawn(hass::poll_loop(appstate.cache(), poll_interval));
    log::info!("Polling Home Assistant every {poll_interval}s");

    let conf = appstate.config();
    let addr = SocketAddr::from((conf.server.listen_address, conf.server.port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("Opening listen port on {addr}");

    let service = server::build_service(appstate);
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("Huginn error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
