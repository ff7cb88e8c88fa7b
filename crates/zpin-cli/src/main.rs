//! zpin launcher.
//!
//! ```text
//! zpin [CONFIG.json]
//! ```
//!
//! The configuration comes from the first argument or `ZPIN_CONFIG`; with
//! neither, the built-in defaults are used. `ZPIN_BUS_MODE` switches between
//! the physical bus and the console simulation, `RUST_LOG` sets the log
//! filter. Logs go to stderr so the console simulation owns stdout.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use zpin_core::{BusMode, MachineConfig};
use zpin_hardware::matrix::{Clock, MatrixHandle, MonotonicClock, ScannerHandle};
use zpin_hardware::mock::{ConsoleTransport, MockMatrix};
use zpin_hardware::{BusTransport, Machine};

const CONFIG_ENV: &str = "ZPIN_CONFIG";

/// How often queued switch events are drained into the log.
const EVENT_POLL: Duration = Duration::from_millis(10);

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!(version = zpin_core::VERSION, "zpin starting");

    let config = load_config()?;
    info!(
        mode = ?config.bus.mode,
        boards = config.boards.len(),
        switches = config.switches.len(),
        "configuration loaded"
    );

    let bus = open_bus(&config)?;
    let machine = Arc::new(Machine::new(config, bus));

    // the console transport blocks on stdin
    let attaching = Arc::clone(&machine);
    let attached = tokio::task::spawn_blocking(move || attaching.attach_boards())
        .await
        .context("board attach task panicked")??;
    for (slot, identity) in &attached {
        info!(slot = slot.as_u8(), %identity, "board ready");
    }

    let shutdown = CancellationToken::new();
    let scanner = start_scanner(&machine, shutdown.child_token())?;
    let events = tokio::spawn(log_events(scanner.matrix().clone(), shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");
    shutdown.cancel();

    events.await.context("event task panicked")?;
    tokio::task::spawn_blocking(move || scanner.shutdown())
        .await
        .context("scanner shutdown panicked")??;
    info!("stopped");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config() -> Result<MachineConfig> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from);

    let mut config = match &path {
        Some(path) => MachineConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => {
            warn!("no configuration given, using defaults");
            MachineConfig::default()
        }
    };
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    Ok(config)
}

fn open_bus(config: &MachineConfig) -> Result<Box<dyn BusTransport>> {
    match config.bus.mode {
        BusMode::Simulated => {
            info!("board bus simulated on the console");
            Ok(Box::new(ConsoleTransport::stdio()))
        }
        BusMode::Physical => physical_bus(config),
    }
}

#[cfg(feature = "hardware-gpio")]
fn physical_bus(config: &MachineConfig) -> Result<Box<dyn BusTransport>> {
    let bus = zpin_hardware::gpio::PiBus::new(config.bus.spi_clock_hz)?;
    Ok(Box::new(bus))
}

#[cfg(not(feature = "hardware-gpio"))]
fn physical_bus(_config: &MachineConfig) -> Result<Box<dyn BusTransport>> {
    anyhow::bail!("physical bus needs the `hardware-gpio` feature; set ZPIN_BUS_MODE=simulated to run without it")
}

fn start_scanner(machine: &Machine, token: CancellationToken) -> Result<ScannerHandle> {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    match machine.config().bus.mode {
        BusMode::Simulated => {
            let (pins, _switches) = MockMatrix::new();
            Ok(machine.scanner(pins, clock)?.spawn_with_token(token)?)
        }
        BusMode::Physical => physical_scanner(machine, clock, token),
    }
}

#[cfg(feature = "hardware-gpio")]
fn physical_scanner(
    machine: &Machine,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
) -> Result<ScannerHandle> {
    let pins = zpin_hardware::gpio::PiMatrix::new(machine.config().matrix.column_count())?;
    Ok(machine.scanner(pins, clock)?.spawn_with_token(token)?)
}

#[cfg(not(feature = "hardware-gpio"))]
fn physical_scanner(
    _machine: &Machine,
    _clock: Arc<dyn Clock>,
    _token: CancellationToken,
) -> Result<ScannerHandle> {
    anyhow::bail!("switch matrix pins need the `hardware-gpio` feature")
}

async fn log_events(matrix: MatrixHandle, shutdown: CancellationToken) {
    let mut poll = tokio::time::interval(EVENT_POLL);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = poll.tick() => {
                for event in matrix.drain_events() {
                    info!(%event, name = ?event.name, "switch");
                }
            }
        }
    }
}
