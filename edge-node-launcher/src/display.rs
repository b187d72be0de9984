//! Display projection
//!
//! Derives the text shown on the control panel from the engine state. The
//! projection is recomputed each tick; [`changes`] then picks out only the
//! fields that differ from what the presentation layer already shows.

use serde::Serialize;

use crate::address::AddressState;
use crate::runtime::ContainerStatus;
use crate::telemetry::TelemetrySnapshot;

pub const STOPPED_UPTIME: &str = "STOPPED";
pub const NOT_AVAILABLE: &str = "N/A";
pub const ADDRESS_UNAVAILABLE: &str = "Address file not found.";

pub const LAUNCH_BUTTON_TEXT: &str = "Launch Edge Node";
pub const STOP_BUTTON_TEXT: &str = "Stop Edge Node";

/// Text color of the status banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    Neutral,
    Positive,
    Warning,
}

impl TextColor {
    pub fn token(self) -> &'static str {
        match self {
            TextColor::Neutral => "white",
            TextColor::Positive => "lightgreen",
            TextColor::Warning => "red",
        }
    }
}

/// Container toggle button, labelled with the action it will perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleButton {
    pub label: &'static str,
    pub background: &'static str,
}

impl ToggleButton {
    pub fn for_status(status: ContainerStatus) -> Self {
        match status {
            ContainerStatus::Running => Self {
                label: STOP_BUTTON_TEXT,
                background: "red",
            },
            ContainerStatus::Stopped => Self {
                label: LAUNCH_BUTTON_TEXT,
                background: "green",
            },
        }
    }
}

/// Uptime / epoch / availability / version block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBanner {
    /// Raw uptime value the texts were derived from
    pub uptime: String,
    pub uptime_text: String,
    pub epoch_text: String,
    pub availability_text: String,
    pub version_text: String,
    pub color: TextColor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    pub address_text: String,
    pub name_text: String,
    pub toggle: ToggleButton,
    pub banner: StatusBanner,
}

/// A single display element that needs repainting
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayField {
    Address(String),
    Name(String),
    Toggle(ToggleButton),
    Banner(StatusBanner),
}

/// Presentation layer receiving display updates
pub trait DisplaySink {
    fn apply(&mut self, field: &DisplayField);
}

/// Availability as a percentage rounded to 2 decimals (`50.0`, `98.77`); non-positive values pass through
pub fn format_availability(value: f64) -> String {
    if value > 0.0 {
        // Debug keeps the trailing `.0` of whole percentages
        format!("{:?}", (value * 100.0 * 100.0).round() / 100.0)
    } else {
        format!("{}", value)
    }
}

pub fn project(
    identity: &AddressState,
    telemetry: &TelemetrySnapshot,
    status: ContainerStatus,
    previous: Option<&DisplaySnapshot>,
) -> DisplaySnapshot {
    let (address_text, name_text) = match identity {
        AddressState::Known(identity) => (
            format!("Addr: {}", identity.short_address()),
            if identity.name.is_empty() {
                String::new()
            } else {
                format!("Name: {}", identity.name)
            },
        ),
        AddressState::Unavailable => (ADDRESS_UNAVAILABLE.to_string(), String::new()),
        AddressState::Unknown => (String::new(), String::new()),
    };

    DisplaySnapshot {
        address_text,
        name_text,
        toggle: ToggleButton::for_status(status),
        banner: project_banner(telemetry, status, previous.map(|p| &p.banner)),
    }
}

fn project_banner(
    telemetry: &TelemetrySnapshot,
    status: ContainerStatus,
    previous: Option<&StatusBanner>,
) -> StatusBanner {
    let scalars = &telemetry.scalars;
    let (uptime, epoch, availability, version) = match status {
        ContainerStatus::Stopped => (
            STOPPED_UPTIME.to_string(),
            NOT_AVAILABLE.to_string(),
            0.0,
            NOT_AVAILABLE.to_string(),
        ),
        ContainerStatus::Running => (
            scalars.uptime.clone(),
            scalars.epoch.to_string(),
            scalars.epoch_avail,
            scalars.version.clone(),
        ),
    };

    // green only when a fresh uptime replaces one already on screen
    let color = match (status, previous) {
        (ContainerStatus::Stopped, _) => TextColor::Warning,
        (ContainerStatus::Running, Some(prev)) if prev.uptime == uptime => prev.color,
        (ContainerStatus::Running, Some(_)) if availability > 0.0 => TextColor::Positive,
        (ContainerStatus::Running, _) => TextColor::Neutral,
    };

    StatusBanner {
        uptime_text: format!("Up Time: {}", uptime),
        epoch_text: format!("Epoch: {}", epoch),
        availability_text: format!("Epoch avail: {}%", format_availability(availability)),
        version_text: format!("Running ver: {}", version),
        uptime,
        color,
    }
}

/// Fields of `next` that differ from `previous`; everything when nothing was shown yet
pub fn changes(previous: Option<&DisplaySnapshot>, next: &DisplaySnapshot) -> Vec<DisplayField> {
    let mut fields = Vec::new();
    if previous.map(|p| &p.toggle) != Some(&next.toggle) {
        fields.push(DisplayField::Toggle(next.toggle.clone()));
    }
    if previous.map(|p| &p.address_text) != Some(&next.address_text) {
        fields.push(DisplayField::Address(next.address_text.clone()));
    }
    if previous.map(|p| &p.name_text) != Some(&next.name_text) {
        fields.push(DisplayField::Name(next.name_text.clone()));
    }
    if previous.map(|p| &p.banner) != Some(&next.banner) {
        fields.push(DisplayField::Banner(next.banner.clone()));
    }
    fields
}
