// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns a VM runner under a pseudoterminal, streams its serial console to
//! `serial.log`, and detects exit on a dedicated thread.
//!
//! The reader and waiter threads are plain OS threads, not tokio tasks: the
//! `portable-pty` and `nix` APIs underneath are blocking, and spec.md §4.F
//! calls for "a dedicated thread" per task rather than a cooperative task
//! competing with the RPC worker pool.

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default PTY geometry. The serial console is plain line-oriented text;
/// size only matters for terminal-aware guest output (it isn't in our case),
/// so a generic 80x24 is fine.
const DEFAULT_PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to allocate pseudoterminal: {0}")]
    PtyAlloc(String),
    #[error("failed to spawn VM runner {path}: {source}")]
    Spawn { path: String, source: String },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("spawned VM runner did not report a process id")]
    NoPid,
}

/// Invoked exactly once, from the waiter thread, when the child exits.
pub type ExitCallback = Box<dyn FnOnce(Option<i32>) + Send>;

/// Handle to one running VM. Dropping it does not stop the VM — use
/// [`VmSupervisor::stop`] for that.
#[derive(Debug, Clone, Copy)]
pub struct SpawnedVm {
    pub pid: u32,
}

/// Spawns, monitors, and tears down VM runner processes.
#[async_trait]
pub trait VmSupervisor: Send + Sync {
    /// Start `runner_path` with its working directory set to `task_dir`,
    /// piping its console through a PTY into `task_dir/serial.log`.
    /// `on_exit` fires once the child exits, carrying its exit code (`None`
    /// if it was killed by a signal).
    async fn spawn(
        &self,
        runner_path: &Path,
        task_dir: &Path,
        on_exit: ExitCallback,
    ) -> Result<SpawnedVm, SupervisorError>;

    /// Graceful-then-forced stop: SIGTERM to the process group, then SIGKILL
    /// if the process is still alive after `deadline`.
    async fn stop(&self, vm: SpawnedVm, deadline: Duration);
}

/// Production supervisor backed by `portable-pty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtyVmSupervisor;

impl PtyVmSupervisor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VmSupervisor for PtyVmSupervisor {
    async fn spawn(
        &self,
        runner_path: &Path,
        task_dir: &Path,
        on_exit: ExitCallback,
    ) -> Result<SpawnedVm, SupervisorError> {
        let runner_path = runner_path.to_path_buf();
        let task_dir = task_dir.to_path_buf();

        tokio::task::spawn_blocking(move || spawn_blocking(&runner_path, &task_dir, on_exit))
            .await
            .map_err(|e| SupervisorError::Spawn {
                path: runner_path_display(&runner_path),
                source: e.to_string(),
            })?
    }

    async fn stop(&self, vm: SpawnedVm, deadline: Duration) {
        let pgid = Pid::from_raw(vm.pid as i32);
        if let Err(e) = killpg(pgid, Signal::SIGTERM) {
            warn!(pid = vm.pid, error = %e, "SIGTERM to VM process group failed (already gone?)");
            return;
        }
        info!(pid = vm.pid, "sent SIGTERM, waiting for graceful exit");

        let deadline_at = std::time::Instant::now() + deadline;
        while std::time::Instant::now() < deadline_at {
            if !process_alive(vm.pid) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if process_alive(vm.pid) {
            warn!(pid = vm.pid, "still alive past deadline, sending SIGKILL");
            let _ = killpg(pgid, Signal::SIGKILL);
        }
    }
}

fn runner_path_display(path: &Path) -> String {
    path.display().to_string()
}

fn process_alive(pid: u32) -> bool {
    // Signal 0 performs no-op existence/permission checks without
    // actually delivering a signal.
    nix::sys::signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

fn spawn_blocking(
    runner_path: &Path,
    task_dir: &Path,
    on_exit: ExitCallback,
) -> Result<SpawnedVm, SupervisorError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(DEFAULT_PTY_SIZE)
        .map_err(|e| SupervisorError::PtyAlloc(e.to_string()))?;

    let mut cmd = CommandBuilder::new(runner_path);
    cmd.cwd(task_dir);

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| SupervisorError::Spawn {
            path: runner_path.display().to_string(),
            source: e.to_string(),
        })?;
    // The slave side belongs to the child now; holding it open in the
    // parent would keep the PTY alive past the child's own exit.
    drop(pair.slave);

    let pid = child.process_id().ok_or(SupervisorError::NoPid)?;

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SupervisorError::PtyAlloc(e.to_string()))?;

    let serial_log_path = task_dir.join("serial.log");
    let log_file =
        std::fs::File::create(&serial_log_path).map_err(|source| SupervisorError::Io {
            path: serial_log_path.display().to_string(),
            source,
        })?;

    // Reader thread: stream the PTY master into serial.log, line-buffered,
    // lossy UTF-8 decoding since guest output is not guaranteed valid UTF-8.
    std::thread::spawn(move || {
        let mut writer = log_file;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let mut chunk = [0u8; 4096];
            match std::io::Read::read(&mut reader, &mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if writer.write_all(&chunk[..n]).is_err() {
                        break;
                    }
                    let _ = writer.flush();
                }
                Err(_) => break,
            }
        }
    });

    // Waiter thread: block on child exit, then fire the callback exactly
    // once. Owns `pair.master` so the PTY stays allocated until the child
    // (and the reader thread reading its master-side fd) is fully done.
    std::thread::spawn(move || {
        let _master = pair.master;
        let exit_code = match child.wait() {
            Ok(status) => Some(status.exit_code() as i32),
            Err(e) => {
                warn!(error = %e, "failed to wait on VM runner child");
                None
            }
        };
        on_exit(exit_code);
    });

    Ok(SpawnedVm { pid })
}

/// Read a serial log file and return its lines, for tests and for the
/// `get_task_logs` tool's own sanity checks on restart recovery.
pub fn read_serial_log_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    BufReader::new(file).lines().collect()
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// A fake [`VmSupervisor`] for orchestrator-level tests: instead of
    /// spawning a real PTY child, it records the spawn and lets the test
    /// drive `on_exit` manually (or immediately, for the common case of a
    /// VM that "completes" synchronously).
    #[derive(Clone, Default)]
    pub struct FakeVmProcess {
        calls: Arc<Mutex<Vec<(std::path::PathBuf, std::path::PathBuf)>>>,
        next_pid: Arc<Mutex<u32>>,
        /// When `Some`, `spawn` invokes `on_exit` immediately with this code
        /// instead of waiting for `fire_exit` to be called by the test.
        immediate_exit: Option<Option<i32>>,
    }

    impl FakeVmProcess {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                next_pid: Arc::new(Mutex::new(1)),
                immediate_exit: None,
            }
        }

        /// Every spawn immediately reports this exit code, as if the VM ran
        /// and exited synchronously before `spawn()` returns control.
        pub fn with_immediate_exit(exit_code: Option<i32>) -> Self {
            Self {
                immediate_exit: Some(exit_code),
                ..Self::new()
            }
        }

        pub fn spawn_calls(&self) -> Vec<(std::path::PathBuf, std::path::PathBuf)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl VmSupervisor for FakeVmProcess {
        async fn spawn(
            &self,
            runner_path: &Path,
            task_dir: &Path,
            on_exit: ExitCallback,
        ) -> Result<SpawnedVm, SupervisorError> {
            self.calls
                .lock()
                .push((runner_path.to_path_buf(), task_dir.to_path_buf()));
            let pid = {
                let mut guard = self.next_pid.lock();
                let pid = *guard;
                *guard += 1;
                pid
            };
            if let Some(code) = self.immediate_exit {
                on_exit(code);
            }
            Ok(SpawnedVm { pid })
        }

        async fn stop(&self, _vm: SpawnedVm, _deadline: Duration) {}
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
