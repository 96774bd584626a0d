//! seatwatch - live seat availability for one train carriage.
//!
//! Usage:
//!   seatwatch --carriage 3
//!   seatwatch -c 3 --host 10.0.0.2 --json
//!
//! Settings come from defaults, then `SEATWATCH_*` environment variables,
//! then flags. Logs go to stderr (`RUST_LOG`, default `info`).

mod display;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use seatwatch_coap::UdpTransport;
use seatwatch_core::{
    changed_only, ObservationSession, RouterChannels, SessionConfig, SessionEnd, Shutdown,
    TargetId, TargetRange, TeeStatus, TracingStatus,
};
use tracing_subscriber::EnvFilter;

use crate::display::{OutputFormat, Renderer};

#[derive(Parser)]
#[command(name = "seatwatch")]
#[command(about = "Live seat availability monitor for train carriages")]
struct Args {
    /// Carriage number to monitor (1-10)
    #[arg(short = 'c', long, value_parser = parse_carriage, value_name = "1-10")]
    carriage: TargetId,

    /// CoAP server host
    #[arg(long)]
    host: Option<String>,

    /// CoAP server port (default 5683)
    #[arg(long)]
    port: Option<u16>,

    /// Seats per carriage
    #[arg(long)]
    capacity: Option<i64>,

    /// Connection attempts before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Seconds to wait between connection attempts
    #[arg(long, value_name = "SECS")]
    retry_delay: Option<f64>,

    /// Print unchanged notifications too
    #[arg(long)]
    all: bool,

    /// Emit JSON lines instead of text
    #[arg(long)]
    json: bool,
}

fn parse_carriage(raw: &str) -> Result<TargetId, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{raw:?} is not a carriage number"))?;
    TargetRange::default()
        .validate(value)
        .map_err(|e| e.to_string())
}

impl Args {
    fn apply(&self, mut config: SessionConfig) -> Result<SessionConfig, String> {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(secs) = self.retry_delay {
            config.retry.delay = Duration::try_from_secs_f64(secs)
                .map_err(|e| format!("invalid --retry-delay {secs}: {e}"))?;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match SessionConfig::from_env()
        .map_err(|e| e.to_string())
        .and_then(|config| args.apply(config))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        carriage = args.carriage.get(),
        host = %config.host,
        capacity = config.capacity,
        "seatwatch starting"
    );

    let RouterChannels {
        router,
        observation_rx,
        status_rx,
    } = RouterChannels::new();
    let observer = if args.all {
        router.observer()
    } else {
        changed_only(router.observer())
    };
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let renderer = Renderer::new(args.carriage, config.capacity, format);
    let render_task = tokio::spawn(renderer.run(observation_rx, status_rx));

    let session =
        ObservationSession::new(Arc::new(UdpTransport::default()), &config, args.carriage);
    let mut session = match session {
        Ok(session) => session
            .with_observer(observer)
            .with_status(TeeStatus(vec![Box::new(TracingStatus), Box::new(router)])),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.trigger();
        }
    });

    let result = session.run(shutdown).await;
    // Dropping the session closes the channels so the renderer drains and exits.
    drop(session);
    let _ = render_task.await;

    match result {
        Ok(SessionEnd::Ended) | Ok(SessionEnd::Cancelled) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
