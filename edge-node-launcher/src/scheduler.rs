//! Fixed-cadence refresh engine
//!
//! Each tick runs, in order:
//! 1. container status query (toggle button follows it immediately)
//! 2. address file refresh, only while the container runs
//! 3. telemetry history refresh, only while the container runs
//! 4. display re-projection and chart redraw, change-gated
//! 5. throttled update check, whatever the container state
//!
//! Steps are timed and isolated: a failing step is logged and the tick moves on.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::address::{AddressState, AddressTracker};
use crate::charts::{project_charts, ChartRenderer, Theme};
use crate::config::LauncherConfig;
use crate::display::{self, DisplayField, DisplaySink, DisplaySnapshot, ToggleButton};
use crate::runtime::{ContainerLifecycle, ContainerRuntime, ContainerStatus};
use crate::telemetry::{HistoryStore, TelemetrySnapshot};
use crate::updater::{UpdateCheck, UpdateThrottle};
use crate::volume::VolumeSource;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_history_queue: usize,
    pub chart_window: usize,
    pub theme: Theme,
    pub auto_update: bool,
    pub update_interval: Duration,
    /// Every update check logs as if it were the first
    pub force_verbose: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            max_history_queue: config.refresh.max_history_queue,
            chart_window: config.refresh.chart_window,
            theme: config.display.theme,
            auto_update: config.update.enabled,
            update_interval: config.update_interval(),
            force_verbose: config.display.force_debug,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&LauncherConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Status,
    Address,
    Telemetry,
    Display,
    Update,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::Status => "status",
            Step::Address => "address",
            Step::Telemetry => "telemetry",
            Step::Display => "display",
            Step::Update => "update",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepTiming {
    pub step: Step,
    pub elapsed: Duration,
    pub ok: bool,
}

/// What a tick did, for diagnostics
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// `None` when the tick was skipped
    pub status: Option<ContainerStatus>,
    pub steps: Vec<StepTiming>,
    pub update_checked: bool,
    pub skipped: bool,
}

impl TickReport {
    #[cfg(test)]
    pub fn step(&self, step: Step) -> Option<&StepTiming> {
        self.steps.iter().find(|t| t.step == step)
    }

    pub fn total(&self) -> Duration {
        self.steps.iter().map(|t| t.elapsed).sum()
    }

    fn record(&mut self, step: Step, started: Instant, ok: bool) {
        self.steps.push(StepTiming {
            step,
            elapsed: started.elapsed(),
            ok,
        });
    }
}

/// Clears the in-flight flag when the pass ends, however it ends
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(Arc::clone(flag)))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the engine state and drives one reconciliation pass per tick
pub struct RefreshScheduler<R, V, U, P> {
    lifecycle: ContainerLifecycle<R>,
    volume: V,
    updater: U,
    presenter: P,
    address: AddressTracker,
    history: HistoryStore,
    throttle: UpdateThrottle,
    shown_toggle: Option<ToggleButton>,
    display: Option<DisplaySnapshot>,
    charts_drawn: bool,
    // telemetry changed since the charts were last drawn
    charts_stale: bool,
    settings: SchedulerSettings,
    in_flight: Arc<AtomicBool>,
}

impl<R, V, U, P> RefreshScheduler<R, V, U, P>
where
    R: ContainerRuntime,
    V: VolumeSource,
    U: UpdateCheck,
    P: DisplaySink + ChartRenderer,
{
    pub fn new(runtime: R, volume: V, updater: U, presenter: P, settings: SchedulerSettings) -> Self {
        Self {
            lifecycle: ContainerLifecycle::new(runtime),
            volume,
            updater,
            presenter,
            address: AddressTracker::new(),
            history: HistoryStore::new(settings.max_history_queue),
            throttle: UpdateThrottle::new(settings.update_interval),
            shown_toggle: None,
            display: None,
            charts_drawn: false,
            charts_stale: false,
            settings,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn identity(&self) -> &AddressState {
        self.address.state()
    }

    #[cfg(test)]
    pub fn telemetry(&self) -> &TelemetrySnapshot {
        self.history.snapshot()
    }

    pub fn display(&self) -> Option<&DisplaySnapshot> {
        self.display.as_ref()
    }

    #[cfg(test)]
    pub fn last_status(&self) -> Option<ContainerStatus> {
        self.lifecycle.last_status()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    #[cfg(test)]
    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub async fn tick(&mut self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// One full reconciliation pass, `now` feeding the update throttle
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!("Refresh already in progress, skipping tick");
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        };

        let mut report = TickReport::default();

        let started = Instant::now();
        let (status, ok) = self.refresh_status().await;
        report.record(Step::Status, started, ok);
        report.status = Some(status);

        if status.is_running() {
            let started = Instant::now();
            let ok = self.refresh_address().await;
            report.record(Step::Address, started, ok);

            let started = Instant::now();
            let ok = self.refresh_telemetry().await;
            report.record(Step::Telemetry, started, ok);
        } else {
            info!("Edge Node is not running. Skipping refresh.");
        }

        let started = Instant::now();
        self.refresh_display(status);
        report.record(Step::Display, started, true);

        if self.settings.auto_update {
            let started = Instant::now();
            report.update_checked = self
                .throttle
                .maybe_run(now, &mut self.updater, self.settings.force_verbose)
                .await;
            report.record(Step::Update, started, true);
        }

        let timings: Vec<String> = report
            .steps
            .iter()
            .map(|t| format!("{} {:.3}s", t.step.name(), t.elapsed.as_secs_f64()))
            .collect();
        debug!(
            "Tick took {:.3}s ({}), container {}, update check {}",
            report.total().as_secs_f64(),
            timings.join(", "),
            report.status.map_or("unknown", ContainerStatus::as_str),
            if report.update_checked { "ran" } else { "not due" }
        );

        report
    }

    /// Toggle the container, then repaint the button from the re-queried status
    pub async fn toggle(&mut self) -> anyhow::Result<ContainerStatus> {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            anyhow::bail!("a refresh is in progress, try again");
        };

        let outcome = self.lifecycle.toggle().await;
        let status = match &outcome {
            Ok(status) => *status,
            Err(_) => self.lifecycle.last_status().unwrap_or(ContainerStatus::Stopped),
        };
        self.sync_toggle(status);
        Ok(outcome?)
    }

    async fn refresh_status(&mut self) -> (ContainerStatus, bool) {
        let (status, ok) = match self.lifecycle.query().await {
            Ok(status) => (status, true),
            Err(e) => {
                let fallback = self.lifecycle.last_status().unwrap_or(ContainerStatus::Stopped);
                error!("Failed to query container status: {} (assuming {:?})", e, fallback);
                (fallback, false)
            }
        };
        self.sync_toggle(status);
        (status, ok)
    }

    fn sync_toggle(&mut self, status: ContainerStatus) {
        let toggle = ToggleButton::for_status(status);
        if self.shown_toggle.as_ref() != Some(&toggle) {
            self.presenter.apply(&DisplayField::Toggle(toggle.clone()));
            self.shown_toggle = Some(toggle);
        }
    }

    async fn refresh_address(&mut self) -> bool {
        match self.volume.read_address().await {
            Ok(raw) => {
                self.address.refresh(raw.as_deref());
                true
            }
            Err(e) => {
                warn!("Failed to read address file: {}", e);
                false
            }
        }
    }

    async fn refresh_telemetry(&mut self) -> bool {
        match self.volume.read_history().await {
            Ok(raw) => {
                let (snapshot, changed) = self.history.load(raw.as_deref());
                if changed && snapshot.is_empty() {
                    debug!("Telemetry history cleared, charts show no data");
                }
                self.charts_stale |= changed;
                true
            }
            Err(e) => {
                warn!("Failed to read telemetry history: {}", e);
                false
            }
        }
    }

    fn refresh_display(&mut self, status: ContainerStatus) {
        let next = display::project(
            self.address.state(),
            self.history.snapshot(),
            status,
            self.display.as_ref(),
        );
        for field in display::changes(self.display.as_ref(), &next) {
            // already handled by the status step
            if matches!(field, DisplayField::Toggle(_)) {
                continue;
            }
            self.presenter.apply(&field);
        }
        self.display = Some(next);

        if self.charts_stale || !self.charts_drawn {
            let frames = project_charts(self.history.snapshot(), self.settings.chart_window, self.settings.theme);
            for frame in &frames {
                self.presenter.draw(frame);
            }
            self.charts_drawn = true;
            self.charts_stale = false;
        }
    }

    #[cfg(test)]
    fn flight_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.in_flight)
    }
}
