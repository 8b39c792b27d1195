use super::probe::{ProcessProbe, SignalProbe};
use super::status::{JobLog, StatusFile};
use crate::config::Settings;
use crate::error::{CatalogError, Result};
use reelbase_model::{JobState, JobStatus};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{error, info, warn};

/// Supervises the aggregation job as a detached background process.
///
/// The controller is the only writer of run-boundary transitions (start,
/// stop, stale-`running` healing); the job process itself writes progress
/// transitions into the same status record while it runs. Liveness is always
/// decided by probing the recorded pid, never by trusting the recorded
/// status alone.
pub struct JobController {
    status_file: StatusFile,
    log: JobLog,
    pid_file: PathBuf,
    data_dir: PathBuf,
    batch_executable: String,
    probe: Box<dyn ProcessProbe>,
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("data_dir", &self.data_dir)
            .field("batch_executable", &self.batch_executable)
            .finish()
    }
}

impl JobController {
    pub fn new(settings: &Settings) -> Self {
        Self::with_probe(settings, Box::new(SignalProbe))
    }

    pub fn with_probe(settings: &Settings, probe: Box<dyn ProcessProbe>) -> Self {
        Self {
            status_file: StatusFile::new(settings.status_file()),
            log: JobLog::new(settings.log_file()),
            pid_file: settings.pid_file(),
            data_dir: settings.data_dir.clone(),
            batch_executable: settings.batch_executable.clone(),
            probe,
        }
    }

    /// Current status record, self-healing a recorded `running` whose
    /// backing process has died to `failed`.
    pub fn status(&self) -> JobStatus {
        let status = self.status_file.read();
        if status.status == JobState::Running && self.live_pid().is_none() {
            let healed = JobStatus::new(
                JobState::Failed,
                status.progress,
                "job process exited unexpectedly",
            );
            if let Err(e) = self.status_file.write(&healed) {
                warn!("failed to persist healed status: {e}");
            }
            return healed;
        }
        status
    }

    /// Accumulated log text for the most recent run.
    pub fn logs(&self) -> String {
        self.log.read_all()
    }

    /// Launch the aggregation job as an independent, detached process.
    ///
    /// Returns the new pid, or [`CatalogError::JobConflict`] when a recorded
    /// process is still alive. A spawn failure is written into the status
    /// record as `failed` before the error is returned, because the caller
    /// of `start` and the eventual observer of `status` may be different
    /// actors.
    pub fn start(&self) -> Result<u32> {
        std::fs::create_dir_all(&self.data_dir)?;

        // Heals a stale `running` record before deciding.
        self.status();
        if let Some(pid) = self.live_pid() {
            return Err(CatalogError::JobConflict(pid));
        }

        self.log.clear()?;
        self.status_file
            .write(&JobStatus::new(JobState::Running, 0, "starting"))?;

        match self.spawn_detached() {
            Ok(pid) => {
                std::fs::write(&self.pid_file, pid.to_string())?;
                self.log
                    .info(&format!("aggregation job launched (pid {pid})"))?;
                info!(pid, executable = %self.batch_executable, "aggregation job started");
                Ok(pid)
            }
            Err(e) => {
                let message = format!("failed to launch {}: {e}", self.batch_executable);
                error!("{message}");
                let _ = self.log.error(&message);
                let _ = self
                    .status_file
                    .write(&JobStatus::new(JobState::Failed, 0, message.clone()));
                Err(CatalogError::JobProcess(message))
            }
        }
    }

    /// Stop the running job, best-effort.
    ///
    /// With no live process this normalizes the record to `idle` and clears
    /// the pid file, making `stop` idempotent. A terminated run may leave
    /// the store or index partially updated; that is not corrected here.
    pub fn stop(&self) -> Result<JobStatus> {
        match self.live_pid() {
            None => {
                let status = JobStatus::idle();
                self.status_file.write(&status)?;
                remove_if_present(&self.pid_file)?;
                Ok(status)
            }
            Some(pid) => {
                self.probe.terminate(pid).map_err(|e| {
                    CatalogError::JobProcess(format!("failed to signal pid {pid}: {e}"))
                })?;
                remove_if_present(&self.pid_file)?;
                let status = JobStatus::new(JobState::Stopped, 0, "stopped manually");
                self.status_file.write(&status)?;
                let _ = self.log.info(&format!("sent termination signal to pid {pid}"));
                info!(pid, "aggregation job stopped");
                Ok(status)
            }
        }
    }

    fn recorded_pid(&self) -> Option<u32> {
        let raw = std::fs::read_to_string(&self.pid_file).ok()?;
        raw.trim().parse().ok()
    }

    fn live_pid(&self) -> Option<u32> {
        self.recorded_pid().filter(|&pid| self.probe.is_alive(pid))
    }

    fn spawn_detached(&self) -> std::io::Result<u32> {
        let mut command = std::process::Command::new(&self.batch_executable);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // New process group: the job survives a controller restart and is
        // not reached by signals aimed at the controller's group.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn()?;
        Ok(child.id())
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Probe with a scripted answer, so the state machine can be tested
    /// without real processes.
    struct FakeProbe {
        alive: Arc<AtomicBool>,
        terminated: Arc<AtomicBool>,
    }

    impl ProcessProbe for FakeProbe {
        fn is_alive(&self, _pid: u32) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn terminate(&self, _pid: u32) -> std::io::Result<()> {
            self.terminated.store(true, Ordering::SeqCst);
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        settings: Settings,
        alive: Arc<AtomicBool>,
        terminated: Arc<AtomicBool>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            // Anything spawnable; the controller never waits on it.
            batch_executable: "true".to_string(),
            ..Settings::default()
        };
        Fixture {
            settings,
            alive: Arc::new(AtomicBool::new(false)),
            terminated: Arc::new(AtomicBool::new(false)),
            _dir: dir,
        }
    }

    fn controller(fx: &Fixture) -> JobController {
        JobController::with_probe(
            &fx.settings,
            Box::new(FakeProbe {
                alive: fx.alive.clone(),
                terminated: fx.terminated.clone(),
            }),
        )
    }

    fn record_running(fx: &Fixture, pid: u32) {
        StatusFile::new(fx.settings.status_file())
            .write(&JobStatus::new(JobState::Running, 30, "updating store"))
            .unwrap();
        std::fs::write(fx.settings.pid_file(), pid.to_string()).unwrap();
    }

    #[test]
    fn fresh_controller_reports_idle() {
        let fx = fixture();
        let ctl = controller(&fx);
        assert_eq!(ctl.status().status, JobState::Idle);
        assert_eq!(ctl.logs(), "");
    }

    #[test]
    fn start_conflicts_with_a_live_job() {
        let fx = fixture();
        fx.alive.store(true, Ordering::SeqCst);
        record_running(&fx, 12345);

        let ctl = controller(&fx);
        match ctl.start() {
            Err(CatalogError::JobConflict(pid)) => assert_eq!(pid, 12345),
            other => panic!("expected JobConflict, got {other:?}"),
        }
        // The record is untouched by the rejected start.
        assert_eq!(ctl.status().status, JobState::Running);
    }

    #[test]
    fn stale_running_status_heals_to_failed() {
        let fx = fixture();
        record_running(&fx, 12345); // probe says dead

        let ctl = controller(&fx);
        let status = ctl.status();
        assert_eq!(status.status, JobState::Failed);
        assert!(status.message.contains("exited unexpectedly"));
        // The healed record is durable.
        let reread = StatusFile::new(fx.settings.status_file()).read();
        assert_eq!(reread.status, JobState::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn start_succeeds_after_a_dead_run_and_records_the_new_pid() {
        let fx = fixture();
        record_running(&fx, 12345); // dead per probe

        let ctl = controller(&fx);
        let pid = ctl.start().unwrap();
        assert!(pid > 0);

        let recorded: u32 = std::fs::read_to_string(fx.settings.pid_file())
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(recorded, pid);
        assert!(ctl.logs().contains("aggregation job launched"));
    }

    #[cfg(unix)]
    #[test]
    fn start_clears_the_previous_run_log() {
        let fx = fixture();
        let log = JobLog::new(fx.settings.log_file());
        log.info("line from the previous run").unwrap();

        let ctl = controller(&fx);
        ctl.start().unwrap();
        assert!(!ctl.logs().contains("previous run"));
    }

    #[test]
    fn spawn_failure_is_recorded_as_failed_status() {
        let fx = fixture();
        let settings = Settings {
            batch_executable: "/nonexistent/reelbase-batch".to_string(),
            ..fx.settings.clone()
        };
        let ctl = JobController::with_probe(
            &settings,
            Box::new(FakeProbe {
                alive: fx.alive.clone(),
                terminated: fx.terminated.clone(),
            }),
        );

        match ctl.start() {
            Err(CatalogError::JobProcess(_)) => {}
            other => panic!("expected JobProcess, got {other:?}"),
        }
        let status = ctl.status();
        assert_eq!(status.status, JobState::Failed);
        assert!(status.message.contains("failed to launch"));
        assert!(ctl.logs().contains("failed to launch"));
    }

    #[test]
    fn stop_without_a_live_process_normalizes_to_idle() {
        let fx = fixture();
        record_running(&fx, 12345); // dead

        let ctl = controller(&fx);
        let status = ctl.stop().unwrap();
        assert_eq!(status.status, JobState::Idle);
        assert!(!fx.settings.pid_file().exists());
        // Idempotent.
        assert_eq!(ctl.stop().unwrap().status, JobState::Idle);
    }

    #[test]
    fn stop_signals_a_live_process_and_marks_stopped() {
        let fx = fixture();
        fx.alive.store(true, Ordering::SeqCst);
        record_running(&fx, 12345);

        let ctl = controller(&fx);
        let status = ctl.stop().unwrap();
        assert_eq!(status.status, JobState::Stopped);
        assert!(fx.terminated.load(Ordering::SeqCst));
        assert!(!fx.settings.pid_file().exists());
    }
}
