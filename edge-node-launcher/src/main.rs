//! Edge Node Launcher - control panel for a locally running edge node container
//!
//! This launcher:
//! - Starts and stops the edge node container through Docker
//! - Follows the address and telemetry files the node writes to its volume
//! - Shows status, identity and load charts, refreshed on a fixed cadence
//! - Checks for launcher updates at a much lower cadence

mod address;
mod charts;
mod config;
mod console;
mod display;
mod platform;
mod runtime;
mod scheduler;
mod telemetry;
mod updater;
mod volume;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use address::{AddressState, AddressTracker};
use config::LauncherConfig;
use console::{ConsoleCommand, ConsolePresenter};
use display::ADDRESS_UNAVAILABLE;
use platform::PlatformInfo;
use runtime::{ContainerLifecycle, ContainerRuntime, DockerRuntime};
use scheduler::{RefreshScheduler, SchedulerSettings};
use telemetry::HistoryStore;
use updater::CommandUpdateChecker;
use volume::{FsVolume, VolumeSource};

const LOG_ENV: &str = "EDGE_NODE_LOG";

type Launcher = RefreshScheduler<DockerRuntime, FsVolume, CommandUpdateChecker, ConsolePresenter>;

/// Command line verb, `run` when none is given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Start,
    Stop,
    Toggle,
    Status,
    InitConfig,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("run") => Ok(Command::Run),
            Some("start") => Ok(Command::Start),
            Some("stop") => Ok(Command::Stop),
            Some("toggle") => Ok(Command::Toggle),
            Some("status") => Ok(Command::Status),
            Some("init-config") => Ok(Command::InitConfig),
            Some(other) => anyhow::bail!(
                "Unknown command `{}` (expected run, start, stop, toggle, status or init-config)",
                other
            ),
        }
    }
}

fn init_logging(force_debug: bool) {
    let default = if force_debug {
        "edge_node_launcher=debug"
    } else {
        "edge_node_launcher=info"
    };
    let filter = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Docker must answer before anything else is attempted
async fn ensure_runtime(runtime: &mut DockerRuntime) {
    if let Err(e) = runtime.check().await {
        error!("Docker is not available: {}", e);
        error!("Install and start Docker, then relaunch the Edge Node Launcher.");
        std::process::exit(1);
    }
}

async fn run(config: LauncherConfig) -> Result<()> {
    info!("Edge Node Launcher v{} starting...", env!("CARGO_PKG_VERSION"));
    match std::env::current_dir() {
        Ok(dir) => info!("Working directory: {}", dir.display()),
        Err(e) => warn!("Working directory unavailable: {}", e),
    }
    PlatformInfo::discover().log();

    let mut runtime = DockerRuntime::from_config(&config.container);
    ensure_runtime(&mut runtime).await;
    runtime
        .initialize()
        .await
        .context("Failed to initialize the edge node container")?;

    let volume = FsVolume::from_config(&config.container);
    info!("Watching telemetry history at {}", volume.history_path().display());

    let mut launcher: Launcher = RefreshScheduler::new(
        runtime,
        volume,
        CommandUpdateChecker::new(&config.update),
        ConsolePresenter::new(),
        SchedulerSettings::from_config(&config),
    );

    let mut refresh_timer = interval(config.refresh_interval());
    refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Refreshing every {}s, {}",
        config.refresh_interval().as_secs(),
        ConsoleCommand::help()
    );

    loop {
        tokio::select! {
            _ = refresh_timer.tick() => {
                let report = launcher.tick().await;
                if report.skipped {
                    continue;
                }
                for failed in report.steps.iter().filter(|t| !t.ok) {
                    warn!("Refresh step `{}` failed, keeping last known state", failed.step.name());
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                    Some(ConsoleCommand::Quit) => break,
                    Some(command) => handle_console(&mut launcher, command).await,
                    None if line.trim().is_empty() => {}
                    None => warn!("Unknown command `{}` ({})", line.trim(), ConsoleCommand::help()),
                },
                Ok(None) => {
                    debug!("stdin closed, console commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },

            _ = &mut shutdown => {
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    info!("Edge Node Launcher stopped");
    Ok(())
}

async fn handle_console(launcher: &mut Launcher, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Toggle => match launcher.toggle().await {
            Ok(status) => info!("Edge Node container is now {:?}", status),
            Err(e) => error!("Toggle failed: {:#}", e),
        },
        ConsoleCommand::Status => match launcher.display() {
            Some(snapshot) => launcher.presenter().show(snapshot),
            None => info!("No refresh completed yet"),
        },
        ConsoleCommand::Address => match launcher.identity() {
            AddressState::Known(identity) => info!("Address: {} Name: {}", identity.address, identity.name),
            AddressState::Unavailable => info!("{}", ADDRESS_UNAVAILABLE),
            AddressState::Unknown => info!("Address not read yet"),
        },
        ConsoleCommand::Quit => {}
    }
}

/// One-shot container commands, printing the resulting panel state as JSON
async fn control(config: &LauncherConfig, command: Command) -> Result<()> {
    let mut runtime = DockerRuntime::from_config(&config.container);
    ensure_runtime(&mut runtime).await;
    if matches!(command, Command::Start | Command::Toggle) {
        runtime
            .initialize()
            .await
            .context("Failed to initialize the edge node container")?;
    }

    let mut lifecycle = ContainerLifecycle::new(runtime);
    let status = match command {
        Command::Start => lifecycle.start().await,
        Command::Stop => lifecycle.stop().await,
        Command::Toggle => lifecycle.toggle().await,
        _ => lifecycle.query().await,
    }
    .context("Container command failed")?;

    let mut volume = FsVolume::from_config(&config.container);
    let mut address = AddressTracker::new();
    let mut history = HistoryStore::new(config.refresh.max_history_queue);
    if status.is_running() {
        let raw = volume.read_address().await.context("Failed to read address file")?;
        address.refresh(raw.as_deref());
        let raw = volume.read_history().await.context("Failed to read telemetry history")?;
        history.load(raw.as_deref());
    }

    let snapshot = display::project(address.state(), history.snapshot(), status, None);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // no .env is fine

    let command = Command::parse(std::env::args().nth(1).as_deref())?;
    let config = LauncherConfig::load().await.context("Failed to load configuration")?;
    init_logging(config.display.force_debug);

    match command {
        Command::Run => run(config).await.context("Launcher execution failed"),
        Command::InitConfig => {
            let path = config.save().await.context("Failed to write configuration")?;
            info!("Configuration written to {}", path.display());
            Ok(())
        }
        command => control(&config, command).await,
    }
}
