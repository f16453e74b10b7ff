//! Lifecycle management for spawned engine processes
//!
//! Closing the host must not leave an engine running in the background and
//! still writing into the output directory. The policy is kill-on-exit:
//!
//! - Engines are spawned in their own process group, with a parent death
//!   signal on Linux
//! - On Windows the whole tree is ended with `taskkill /T`, since a separate
//!   process group no longer receives the console's Ctrl+C
//! - Every running engine PID is tracked in a global registry
//! - On host exit (guard drop, SIGINT/SIGTERM/SIGHUP, Ctrl+C) each tracked
//!   group gets SIGTERM, then SIGKILL after a grace period

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

/// Grace period between SIGTERM and SIGKILL when the guard drops
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of engine processes that are currently running
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once termination has started; later calls are no-ops
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered engine process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered engine process PID {}", pid);
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate all tracked processes.
    /// Sends SIGTERM first, waits up to `grace_period`, then SIGKILL.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            debug!("No engine processes to terminate");
            return;
        }

        info!("Terminating {} engine process(es)...", self.pids.len());
        let pids: Vec<u32> = self.pids.iter().copied().collect();
        platform::terminate(&pids, grace_period);
        self.pids.clear();
        info!("Engine process cleanup complete");
    }
}

#[cfg(unix)]
mod platform {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::time::{Duration, Instant};
    use tracing::{debug, error, info, warn};

    pub(super) fn terminate(pids: &[u32], grace_period: Duration) {
        // Group signal first so grandchildren (interpreters behind run.sh) go too
        for &pid in pids {
            if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
                if let Err(e2) = send_signal(pid, Signal::SIGTERM) {
                    warn!("Failed to send SIGTERM to PID {}: {}", pid, e2);
                }
            } else {
                debug!("Sent SIGTERM to process group {}", pid);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                info!("All engine processes terminated gracefully");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids {
            if is_process_alive(pid) {
                warn!("Process group {} did not terminate, sending SIGKILL", pid);
                if let Err(e) = send_signal_to_group(pid, Signal::SIGKILL) {
                    error!("Failed to send SIGKILL to process group {}: {}", pid, e);
                    let _ = send_signal(pid, Signal::SIGKILL);
                }
            }
        }
    }

    pub(super) fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
        signal::kill(Pid::from_raw(pid as i32), signal)
    }

    /// Negative PID addresses the whole process group
    pub(super) fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
        signal::kill(Pid::from_raw(-(pgid as i32)), signal)
    }

    /// Alive means not dead and not a zombie
    pub(super) fn is_process_alive(pid: u32) -> bool {
        if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
            return false;
        }

        // Field 3 of /proc/<pid>/stat is the state; Z and X are not running
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            let fields: Vec<&str> = stat.split_whitespace().collect();
            if fields.len() > 2 {
                return !matches!(fields[2], "Z" | "X");
            }
        }

        true
    }
}

#[cfg(not(unix))]
mod platform {
    use std::process::{Command, Stdio};
    use std::time::Duration;
    use tracing::{debug, warn};

    pub(super) fn terminate(pids: &[u32], grace_period: Duration) {
        // Polite request first; console engines usually ignore it
        for &pid in pids {
            run_taskkill(pid, false);
        }
        std::thread::sleep(grace_period.min(Duration::from_secs(1)));

        // /T takes the tree, so python behind run.bat goes too
        for &pid in pids {
            if !run_taskkill(pid, true) {
                warn!("Failed to kill engine process tree {}", pid);
            }
        }
    }

    fn run_taskkill(pid: u32, force: bool) -> bool {
        match Command::new("taskkill")
            .args(super::taskkill_args(pid, force))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => {
                debug!("taskkill {} (force={}): {}", pid, force, status);
                status.success()
            }
            Err(e) => {
                warn!("Failed to run taskkill for {}: {}", pid, e);
                false
            }
        }
    }
}

/// `taskkill` arguments ending the process tree rooted at `pid`
#[cfg(any(not(unix), test))]
fn taskkill_args(pid: u32, force: bool) -> Vec<String> {
    let mut args = vec!["/T".to_string()];
    if force {
        args.push("/F".to_string());
    }
    args.push("/PID".to_string());
    args.push(pid.to_string());
    args
}

/// RAII guard that terminates every tracked engine on drop.
///
/// The host binary holds exactly one for its whole lifetime; library code
/// only registers PIDs.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
    grace_period: Duration,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Number of engines currently tracked
    pub fn child_count(&self) -> usize {
        self.registry.lock().map(|r| r.count()).unwrap_or(0)
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        debug!("ProcessGuard dropped, initiating cleanup");
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(self.grace_period);
        }
    }
}

/// Install handlers that clean up engines when the host is interrupted.
/// Call once at program start.
#[cfg(unix)]
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };
            info!("Received {} signal, cleaning up...", signal_name);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Install a Ctrl+C handler that cleans up engines.
/// Call once at program start.
#[cfg(not(unix))]
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    ctrlc::set_handler(|| {
        info!("Received Ctrl+C, cleaning up...");
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.terminate_all(Duration::from_secs(3));
        }
        std::process::exit(130);
    })
    .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Extension trait for `std::process::Command` to isolate the child
pub trait CommandProcessGroup {
    /// Run the command as the leader of its own process group
    fn in_new_process_group(&mut self) -> &mut Self;
}

#[cfg(unix)]
impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: the hook only calls async-signal-safe setpgid/prctl
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(nix::unistd::Pid::from_raw(0), nix::unistd::Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                set_parent_death_signal()
            });
        }
        self
    }
}

/// Engine receives SIGTERM if the host dies without running its cleanup
#[cfg(target_os = "linux")]
fn set_parent_death_signal() -> std::io::Result<()> {
    // SAFETY: prctl with PR_SET_PDEATHSIG only touches the calling process
    if unsafe { nix::libc::prctl(nix::libc::PR_SET_PDEATHSIG, nix::libc::SIGTERM) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn set_parent_death_signal() -> std::io::Result<()> {
    Ok(())
}

#[cfg(windows)]
impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        self.creation_flags(CREATE_NEW_PROCESS_GROUP)
    }
}

#[cfg(not(any(unix, windows)))]
impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        tracing::warn!("Process groups are not supported on this platform");
        self
    }
}
