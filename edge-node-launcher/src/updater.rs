//! Auto-update checks
//!
//! Features:
//! - Throttled checks, at most once per configured interval
//! - Verbose first check, quiet afterwards
//! - Pluggable check through a configured shell command

use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;

/// Performs the actual update check
#[allow(async_fn_in_trait)]
pub trait UpdateCheck {
    /// Check for (and possibly apply) an update; failures are handled internally
    async fn check_for_updates(&mut self, verbose: bool);
}

/// Rate limiter for update checks
#[derive(Debug, Clone)]
pub struct UpdateThrottle {
    interval: chrono::Duration,
    last_run: Option<DateTime<Utc>>,
}

impl UpdateThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::days(36_500)),
            last_run: None,
        }
    }

    #[cfg(test)]
    pub fn with_last_run(mut self, last_run: DateTime<Utc>) -> Self {
        self.last_run = Some(last_run);
        self
    }

    #[cfg(test)]
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Never checked, or more than one interval elapsed since the last check
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.signed_duration_since(last) > self.interval,
        }
    }

    /// Run the check if due. Returns whether it ran.
    ///
    /// The run time is recorded before the check so a slow or failing check is
    /// not retried on the next tick.
    pub async fn maybe_run<U: UpdateCheck>(&mut self, now: DateTime<Utc>, checker: &mut U, force_verbose: bool) -> bool {
        if !self.is_due(now) {
            return false;
        }
        let verbose = self.last_run.is_none() || force_verbose;
        self.last_run = Some(now);
        checker.check_for_updates(verbose).await;
        true
    }
}

/// Update check delegating to an external command.
///
/// The last non-empty line of the command output, if it parses as a version,
/// is compared with the running version.
#[derive(Debug, Clone)]
pub struct CommandUpdateChecker {
    command: Option<String>,
    timeout: Duration,
}

impl CommandUpdateChecker {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn shell(command: &str) -> AsyncCommand {
        #[cfg(windows)]
        {
            let mut cmd = AsyncCommand::new("cmd");
            cmd.args(["/C", command]);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = AsyncCommand::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }

    async fn run(&self, command: &str) -> anyhow::Result<String> {
        let output = tokio::time::timeout(
            self.timeout,
            Self::shell(command)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("update command timed out after {}s", self.timeout.as_secs()))??;

        if !output.status.success() {
            anyhow::bail!(
                "update command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl UpdateCheck for CommandUpdateChecker {
    async fn check_for_updates(&mut self, verbose: bool) {
        let current = env!("CARGO_PKG_VERSION");
        let Some(command) = self.command.clone() else {
            if verbose {
                info!("No update command configured, running version {}", current);
            }
            return;
        };

        if verbose {
            info!("Checking for updates...");
        }
        match self.run(&command).await {
            Ok(stdout) => {
                let latest = stdout
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .last()
                    .map(|line| line.trim_start_matches('v'));
                match latest {
                    Some(latest) if is_newer_version(current, latest) => {
                        info!("Update available: {} (running {})", latest, current)
                    }
                    Some(latest) if verbose => info!("Launcher is up to date ({}, latest {})", current, latest),
                    _ => debug!("Update check finished"),
                }
            }
            Err(e) => warn!("Update check failed: {}", e),
        }
    }
}

/// Dotted numeric comparison; non-numeric parts count as 0
pub fn is_newer_version(current: &str, latest: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> { v.split('.').map(|s| s.parse().unwrap_or(0)).collect() };
    let current_parts = parse(current);
    let latest_parts = parse(latest);

    for (c, l) in current_parts.iter().zip(latest_parts.iter()) {
        if l > c {
            return true;
        } else if l < c {
            return false;
        }
    }

    latest_parts.len() > current_parts.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockUpdater;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_714_564_800 + secs, 0).unwrap()
    }

    #[test]
    fn test_version_comparison() {
        assert!(is_newer_version("1.0.0", "1.0.1"));
        assert!(is_newer_version("1.0.0", "1.1.0"));
        assert!(!is_newer_version("1.1.0", "1.0.0"));
        assert!(!is_newer_version("1.0.0", "1.0.0"));
        assert!(is_newer_version("1.0", "1.0.1"));
    }

    #[tokio::test]
    async fn test_throttle_skips_within_interval() {
        let mut throttle = UpdateThrottle::new(Duration::from_secs(60)).with_last_run(at(0));
        let mut updater = MockUpdater::default();

        assert!(!throttle.maybe_run(at(30), &mut updater, false).await);
        assert_eq!(updater.calls.count("check"), 0);
        assert_eq!(throttle.last_run(), Some(at(0)));
    }

    #[tokio::test]
    async fn test_throttle_runs_after_interval() {
        let mut throttle = UpdateThrottle::new(Duration::from_secs(60)).with_last_run(at(0));
        let mut updater = MockUpdater::default();

        assert!(throttle.maybe_run(at(61), &mut updater, false).await);
        assert_eq!(updater.calls.count("check"), 1);
        assert_eq!(updater.verbose, vec![false]);
        assert_eq!(throttle.last_run(), Some(at(61)));
    }

    #[tokio::test]
    async fn test_exact_interval_is_not_due() {
        let throttle = UpdateThrottle::new(Duration::from_secs(60)).with_last_run(at(0));
        assert!(!throttle.is_due(at(60)));
    }

    #[tokio::test]
    async fn test_first_run_is_verbose() {
        let mut throttle = UpdateThrottle::new(Duration::from_secs(3600));
        let mut updater = MockUpdater::default();

        assert!(throttle.maybe_run(at(0), &mut updater, false).await);
        assert!(!throttle.maybe_run(at(10), &mut updater, false).await);
        assert!(throttle.maybe_run(at(3601), &mut updater, true).await);
        assert_eq!(updater.verbose, vec![true, true]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_checker_runs_command() {
        let mut checker = CommandUpdateChecker::new(&UpdateConfig {
            command: Some("echo v99.0.0".to_string()),
            timeout_secs: 5,
            ..UpdateConfig::default()
        });
        assert_eq!(checker.run("echo v99.0.0").await.unwrap().trim(), "v99.0.0");
        checker.check_for_updates(true).await;

        assert!(checker.run("exit 3").await.is_err());
    }
}
