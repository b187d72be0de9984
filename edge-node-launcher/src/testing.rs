//! Mock collaborators for engine tests

use std::io;

use edge_node_devkit::CallRecorder;

use crate::charts::{ChartFrame, ChartRenderer};
use crate::display::{DisplayField, DisplaySink};
use crate::runtime::{ContainerRuntime, RuntimeError};
use crate::updater::UpdateCheck;
use crate::volume::VolumeSource;

/// In-memory container runtime; start/stop flip `running`
#[derive(Debug, Default)]
pub struct MockRuntime {
    pub running: bool,
    /// start/stop fail without changing state
    pub fail_commands: bool,
    /// is_running fails
    pub fail_status: bool,
    pub calls: CallRecorder,
}

impl MockRuntime {
    pub fn new(running: bool) -> Self {
        Self {
            running,
            ..Self::default()
        }
    }

    fn command_failed(command: &str) -> RuntimeError {
        RuntimeError::CommandFailed {
            command: command.to_string(),
            stderr: "mock failure".to_string(),
        }
    }
}

impl ContainerRuntime for MockRuntime {
    async fn check(&mut self) -> Result<(), RuntimeError> {
        self.calls.record("check");
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), RuntimeError> {
        self.calls.record("initialize");
        Ok(())
    }

    async fn is_running(&mut self) -> Result<bool, RuntimeError> {
        self.calls.record("is_running");
        if self.fail_status {
            return Err(RuntimeError::Unreachable("mock runtime down".to_string()));
        }
        Ok(self.running)
    }

    async fn start(&mut self) -> Result<(), RuntimeError> {
        self.calls.record("start");
        if self.fail_commands {
            return Err(Self::command_failed("start"));
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RuntimeError> {
        self.calls.record("stop");
        if self.fail_commands {
            return Err(Self::command_failed("stop"));
        }
        self.running = false;
        Ok(())
    }
}

/// Volume serving fixed file contents
#[derive(Debug, Default)]
pub struct MockVolume {
    pub address: Option<String>,
    pub history: Option<Vec<u8>>,
    pub fail_address: bool,
    pub fail_history: bool,
    pub calls: CallRecorder,
}

impl VolumeSource for MockVolume {
    async fn read_address(&mut self) -> io::Result<Option<String>> {
        self.calls.record("read_address");
        if self.fail_address {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock address failure"));
        }
        Ok(self.address.clone())
    }

    async fn read_history(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.calls.record("read_history");
        if self.fail_history {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "mock history failure"));
        }
        Ok(self.history.clone())
    }
}

#[derive(Debug, Default)]
pub struct MockUpdater {
    pub calls: CallRecorder,
    /// verbose flag of each call
    pub verbose: Vec<bool>,
}

impl UpdateCheck for MockUpdater {
    async fn check_for_updates(&mut self, verbose: bool) {
        self.calls.record("check");
        self.verbose.push(verbose);
    }
}

/// Presentation layer keeping everything it was sent
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub fields: Vec<DisplayField>,
    pub frames: Vec<ChartFrame>,
}

impl RecordingPresenter {
    pub fn take_fields(&mut self) -> Vec<DisplayField> {
        std::mem::take(&mut self.fields)
    }

    pub fn take_frames(&mut self) -> Vec<ChartFrame> {
        std::mem::take(&mut self.frames)
    }
}

impl DisplaySink for RecordingPresenter {
    fn apply(&mut self, field: &DisplayField) {
        self.fields.push(field.clone());
    }
}

impl ChartRenderer for RecordingPresenter {
    fn draw(&mut self, frame: &ChartFrame) {
        self.frames.push(frame.clone());
    }
}
