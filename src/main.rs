use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use tokio::signal;
use tokio::signal::unix::SignalKind;

use hdg::Registry;
use hdg::catalog::default_registry;
use hdg_bridge::backend::boiler::{HdgClient, Transport};
use hdg_bridge::config;
use hdg_bridge::error::ApiResult;
use hdg_bridge::server::{self, appstate::AppState, http::HttpServer};
use svc::runner::{ServiceRunner, StopHandle};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,
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
        "tower_http::trace::on_request=info",
        "axum::rejection=trace",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

fn load_registry(config: &config::AppConfig) -> ApiResult<Registry> {
    match &config.catalog_file {
        Some(path) => {
            log::info!("Loading data point catalog from [{path}]");
            Ok(Registry::load(path)?)
        }
        None => {
            log::debug!("Using built-in data point catalog");
            Ok(default_registry()?)
        }
    }
}

fn install_signal_handlers(stop: &StopHandle) -> ApiResult<()> {
    fn shutdown(msg: &str, stop: &StopHandle) {
        log::warn!("{msg}");
        let _ = std::io::stderr().flush();
        stop.stop();
    }

    let handle = stop.clone();
    tokio::spawn(async move {
        if matches!(signal::ctrl_c().await, Ok(())) {
            shutdown("Ctrl-C pressed, exiting..", &handle);
        }
    });

    let handle = stop.clone();
    let mut signal = signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        if matches!(signal.recv().await, Some(())) {
            shutdown("SIGTERM received, exiting..", &handle);
        }
    });

    Ok(())
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let args = Args::parse();

    let config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully");

    let registry = load_registry(&config)?;

    let client = HdgClient::new(&config.boiler)?;
    let bconf = config.boiler.clone();
    match client.check_connection().await {
        Ok(()) => log::info!("[{}] Boiler at {} is reachable", bconf.name, bconf.url),
        Err(err) => log::warn!("[{}] Boiler at {} did not respond: {err}", bconf.name, bconf.url),
    }

    let (appstate, poller) = AppState::from_config(config, registry, Arc::new(client));

    let sconf = appstate.config().server.clone();

    let mut runner = ServiceRunner::new();
    runner.register("arbiter", appstate.arbiter())?;
    runner.register("poller", poller)?;
    runner.register("setter", appstate.setter())?;
    runner.register(
        "http",
        HttpServer::new(
            sconf.ipaddress,
            sconf.http_port,
            server::build_service(appstate.clone()),
        ),
    )?;

    install_signal_handlers(&runner.stop_handle())?;

    runner.run().await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("HDG bridge error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
