use std::io;

/// The one genuinely OS-specific dependency of job control, isolated behind
/// a trait so the controller can be exercised with a fake in tests.
pub trait ProcessProbe: Send + Sync {
    /// Side-effect-free existence check. A missing process or a failed probe
    /// both mean "not alive".
    fn is_alive(&self, pid: u32) -> bool;

    /// Best-effort termination signal. Not guaranteed graceful.
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Unix implementation: signal 0 for the probe, SIGTERM for termination.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

#[cfg(unix)]
impl ProcessProbe for SignalProbe {
    fn is_alive(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
    }
}

#[cfg(not(unix))]
impl ProcessProbe for SignalProbe {
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }

    fn terminate(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process signalling is only supported on unix",
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        let probe = SignalProbe;
        assert!(probe.is_alive(std::process::id()));
    }

    #[test]
    fn absent_pid_is_not_alive() {
        // Pid near the default pid_max ceiling; vanishingly unlikely to exist.
        let probe = SignalProbe;
        assert!(!probe.is_alive(4_194_000));
    }
}
