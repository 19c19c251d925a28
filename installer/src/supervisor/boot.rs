//! Cycling the worker application

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::options::InstallConfig;
use crate::errors::InstallerError;
use crate::supervisor::process::{supervise, ticks_for, RunReport};
use crate::supervisor::scanner::watch_output;

/// Output lines that mean the worker application finished its first-run work
pub const READINESS_PATTERNS: &[&str] = &["see the GUI", "any key to continue"];

/// Starts the worker application and stops it once it is ready
#[async_trait]
pub trait AppBooter: Send + Sync {
    /// One supervised start/observe/stop cycle
    async fn cycle(&self, timeout: Duration) -> Result<RunReport, InstallerError>;
}

/// Changes the process working directory, restoring it on drop
#[derive(Debug)]
pub struct WorkingDirGuard {
    original: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(dir: &Path) -> Result<Self, InstallerError> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { original })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.original) {
            warn!(
                "Unable to restore working directory {}: {}",
                self.original.display(),
                e
            );
        }
    }
}

/// Full command line of a worker application run, relative to its root
pub fn worker_args(config: &InstallConfig) -> Vec<String> {
    let mut args = vec![
        "-s".to_string(),
        "ComfyUI/main.py".to_string(),
        "--windows-standalone-build".to_string(),
        "--disable-auto-launch".to_string(),
        "--port".to_string(),
        config.worker_port.to_string(),
    ];
    if !config.use_gpu {
        args.push("--cpu".to_string());
    }
    args
}

/// Boots the installed worker application
pub struct AppSupervisor {
    config: Arc<InstallConfig>,
    show_progress: bool,
}

impl AppSupervisor {
    pub fn new(config: Arc<InstallConfig>, show_progress: bool) -> Self {
        Self {
            config,
            show_progress,
        }
    }

    fn countdown(&self, ticks: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(ticks);
        if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:30}] {pos}/{len}s") {
            pb.set_style(style);
        }
        pb.set_message("Waiting for ComfyUI");
        pb
    }
}

#[async_trait]
impl AppBooter for AppSupervisor {
    async fn cycle(&self, timeout: Duration) -> Result<RunReport, InstallerError> {
        let root = std::path::absolute(self.config.worker_root())?;
        if !root.exists() {
            return Err(InstallerError::NotFound(format!(
                "worker application not installed at {}",
                root.display()
            )));
        }
        let interpreter = root.join(&self.config.interpreter);
        let tick = self.config.boot.tick;
        let timeout_ticks = ticks_for(timeout, tick);

        let _cwd = WorkingDirGuard::enter(&root)?;

        info!("Starting ComfyUI ({}s budget)", timeout.as_secs());
        let mut child = Command::new(&interpreter)
            .args(worker_args(&self.config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                InstallerError::ProcessError(format!("Failed to start {}: {}", interpreter.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InstallerError::Internal("child stdout not captured".to_string()))?;
        let (tx, rx) = mpsc::channel(1);
        let patterns = READINESS_PATTERNS.iter().map(|p| p.to_string()).collect();
        let watcher = tokio::spawn(watch_output(stdout, patterns, tx));

        let pb = self.countdown(timeout_ticks);
        let result = supervise(&mut child, rx, timeout_ticks, tick, tokio::time::sleep, |t| {
            pb.set_position(t)
        })
        .await;
        pb.finish_and_clear();
        watcher.abort();

        let (report, _) = result?;
        info!("ComfyUI stopped: {:?} after {}s", report.outcome, report.ticks);
        Ok(report)
    }
}
