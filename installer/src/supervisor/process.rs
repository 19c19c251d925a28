//! Tick loop driving a supervised child

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::InstallerError;
use crate::supervisor::fsm::{RunEvent, RunFsm, RunOutcome, RunState};
use crate::supervisor::scanner::WatchEvent;

/// Control surface of a running child
#[async_trait]
pub trait SupervisedChild: Send {
    /// Non-blocking liveness check
    fn has_exited(&mut self) -> bool;

    /// Ask the child to stop
    fn request_termination(&mut self);

    /// Wait until the child has stopped
    async fn wait_stopped(&mut self) -> Result<(), InstallerError>;
}

#[async_trait]
impl SupervisedChild for tokio::process::Child {
    fn has_exited(&mut self) -> bool {
        // An error polling the child counts as a disconnect
        !matches!(self.try_wait(), Ok(None))
    }

    fn request_termination(&mut self) {
        if let Err(e) = self.start_kill() {
            debug!("Terminate request ignored: {}", e);
        }
    }

    async fn wait_stopped(&mut self) -> Result<(), InstallerError> {
        let status = self.wait().await?;
        debug!("Child stopped with {}", status);
        Ok(())
    }
}

/// Final result of a supervised run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Ticks elapsed before the run ended
    pub ticks: u64,
    /// Readiness pattern that ended the run
    pub matched: Option<String>,
}

impl RunReport {
    /// A timed-out run as an error, for callers that want one
    pub fn check(&self) -> Result<(), InstallerError> {
        match self.outcome {
            RunOutcome::TimedOut => Err(InstallerError::ProcessTimeout(format!(
                "no readiness signal after {} ticks",
                self.ticks
            ))),
            RunOutcome::Ready | RunOutcome::Exited => Ok(()),
        }
    }
}

/// Supervise `child` until a watcher event or `timeout_ticks` ticks
///
/// The child is always stopped before this returns. `on_tick` receives the
/// elapsed tick count after every tick.
pub async fn supervise<C, S, F, T>(
    child: &mut C,
    mut events: mpsc::Receiver<WatchEvent>,
    timeout_ticks: u64,
    tick: Duration,
    sleep_fn: S,
    mut on_tick: T,
) -> Result<(RunReport, RunFsm), InstallerError>
where
    C: SupervisedChild + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
    T: FnMut(u64),
{
    let mut fsm = RunFsm::new();
    transition(&mut fsm, RunEvent::Launched);

    let mut ticks = 0;
    let mut output_open = true;
    while fsm.state() == RunState::Running {
        if ticks >= timeout_ticks {
            transition(&mut fsm, RunEvent::TimeoutElapsed);
            break;
        }

        tokio::select! {
            biased;
            event = events.recv(), if output_open => match event {
                Some(WatchEvent::Ready(pattern)) => {
                    info!("Readiness signal: {}", pattern);
                    transition(&mut fsm, RunEvent::ReadinessSeen(pattern));
                }
                // Closed output is not an exit; a live child stays under the timeout
                Some(WatchEvent::Stopped) | None => {
                    output_open = false;
                    if child.has_exited() {
                        transition(&mut fsm, RunEvent::ChildStopped);
                    } else {
                        debug!("Child closed its output, still waiting on it");
                    }
                }
            },
            _ = sleep_fn(tick) => {
                ticks += 1;
                on_tick(ticks);
                if child.has_exited() {
                    transition(&mut fsm, RunEvent::ChildStopped);
                }
            }
        }
    }

    if fsm.termination_requested() || !child.has_exited() {
        child.request_termination();
    }
    child.wait_stopped().await?;
    if fsm.state() != RunState::Terminated {
        transition(&mut fsm, RunEvent::ChildStopped);
    }

    let report = RunReport {
        outcome: fsm.outcome().unwrap_or(RunOutcome::Exited),
        ticks,
        matched: fsm.matched().map(str::to_string),
    };
    Ok((report, fsm))
}

fn transition(fsm: &mut RunFsm, event: RunEvent) {
    if let Err(e) = fsm.process(event) {
        warn!("Supervisor: {}", e);
    }
}

/// Number of ticks covering `timeout`, at least one
pub fn ticks_for(timeout: Duration, tick: Duration) -> u64 {
    if tick.is_zero() {
        return 1;
    }
    let ticks = timeout.as_millis().div_ceil(tick.as_millis());
    u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
}
