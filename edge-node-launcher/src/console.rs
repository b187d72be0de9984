//! Terminal presentation layer
//!
//! Display updates and chart frames are written to the log; stdin lines act
//! as the control panel buttons.

use tracing::info;

use crate::charts::{ChartFrame, ChartRenderer, ChartSeries};
use crate::display::{DisplayField, DisplaySink, DisplaySnapshot, StatusBanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Toggle,
    Status,
    Address,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "toggle" | "t" => Some(ConsoleCommand::Toggle),
            "status" | "s" => Some(ConsoleCommand::Status),
            "address" | "addr" | "a" => Some(ConsoleCommand::Address),
            "quit" | "exit" | "q" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }

    pub fn help() -> &'static str {
        "commands: toggle, status, address, quit"
    }
}

#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    pub fn new() -> Self {
        Self
    }

    /// Lines describing everything the panel currently shows
    pub fn describe(snapshot: &DisplaySnapshot) -> Vec<String> {
        let mut lines = vec![format!("[{}] {}", snapshot.toggle.background, snapshot.toggle.label)];
        if !snapshot.address_text.is_empty() {
            lines.push(format!("{} {}", snapshot.address_text, snapshot.name_text).trim_end().to_string());
        }
        lines.push(banner_line(&snapshot.banner));
        lines
    }

    pub fn show(&self, snapshot: &DisplaySnapshot) {
        for line in Self::describe(snapshot) {
            info!("{}", line);
        }
    }
}

fn banner_line(banner: &StatusBanner) -> String {
    format!(
        "[{}] {} | {} | {} | {}",
        banner.color.token(),
        banner.uptime_text,
        banner.epoch_text,
        banner.availability_text,
        banner.version_text
    )
}

impl DisplaySink for ConsolePresenter {
    fn apply(&mut self, field: &DisplayField) {
        match field {
            DisplayField::Toggle(button) => info!("Button: {} [{}]", button.label, button.background),
            DisplayField::Address(text) => info!("{}", text),
            DisplayField::Name(text) if text.is_empty() => {}
            DisplayField::Name(text) => info!("{}", text),
            DisplayField::Banner(banner) => info!("{}", banner_line(banner)),
        }
    }
}

impl ChartRenderer for ConsolePresenter {
    fn draw(&mut self, frame: &ChartFrame) {
        match &frame.series {
            ChartSeries::Line { y, .. } => {
                let min = y.iter().copied().fold(f64::INFINITY, f64::min);
                let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let last = y.last().copied().unwrap_or_default();
                info!(
                    "{}: {} points, last {:.2} (min {:.2}, max {:.2}) | {}",
                    frame.title,
                    frame.series.points(),
                    last,
                    min,
                    max,
                    frame.axis_label
                );
            }
            ChartSeries::NoData => info!("{}: {} | {}", frame.title, frame.legend(), frame.axis_label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{project_charts, Theme};
    use crate::display::{project, DisplayField};
    use crate::address::{AddressState, NodeIdentity};
    use crate::display::{ADDRESS_UNAVAILABLE, LAUNCH_BUTTON_TEXT, STOP_BUTTON_TEXT};
    use crate::runtime::ContainerStatus;
    use crate::telemetry::TelemetrySnapshot;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("toggle\n"), Some(ConsoleCommand::Toggle));
        assert_eq!(ConsoleCommand::parse("  STATUS "), Some(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("addr"), Some(ConsoleCommand::Address));
        assert_eq!(ConsoleCommand::parse("q"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("reboot"), None);
    }

    #[test]
    fn test_presenter_accepts_every_field() {
        let mut presenter = ConsolePresenter::new();
        let display = project(
            &AddressState::Unavailable,
            &TelemetrySnapshot::default(),
            ContainerStatus::Stopped,
            None,
        );
        for field in crate::display::changes(None, &display) {
            presenter.apply(&field);
        }
        presenter.apply(&DisplayField::Name(String::new()));
        presenter.show(&display);

        for frame in project_charts(&TelemetrySnapshot::default(), 100, Theme::Dark) {
            presenter.draw(&frame);
        }
    }

    #[test]
    fn test_describe_stopped_panel() {
        let snapshot = project(
            &AddressState::Unavailable,
            &TelemetrySnapshot::default(),
            ContainerStatus::Stopped,
            None,
        );
        let lines = ConsolePresenter::describe(&snapshot);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("[green] {}", LAUNCH_BUTTON_TEXT));
        assert_eq!(lines[1], ADDRESS_UNAVAILABLE);
        assert_eq!(
            lines[2],
            "[red] Up Time: STOPPED | Epoch: N/A | Epoch avail: 0% | Running ver: N/A"
        );
        ConsolePresenter::new().show(&snapshot);
    }

    #[test]
    fn test_describe_running_panel() {
        let identity = AddressState::Known(NodeIdentity {
            address: "0xai_Amfnbk1234567890".to_string(),
            name: "falcon".to_string(),
        });
        let snapshot = project(&identity, &TelemetrySnapshot::default(), ContainerStatus::Running, None);
        let lines = ConsolePresenter::describe(&snapshot);

        assert_eq!(lines[0], format!("[red] {}", STOP_BUTTON_TEXT));
        assert_eq!(lines[1], "Addr: 0xai_Amf...34567890 Name: falcon");
        assert!(lines[2].starts_with("[white] Up Time: -1 | Epoch: -1"));
    }
}
