//! Subprocess execution with optional hard deadlines.
//!
//! Every external command (interpreter version checks, `pip inspect`, the
//! library-root query) goes through a [`CommandRunner`], so scanners can be
//! driven by a fake in tests.

use crate::error::{Result, ScanError};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// How often a running child is polled while waiting on a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout followed by stderr, the way a terminal would show them.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }
}

/// Runs an executable to completion.
///
/// Implementations return an error on spawn failure, non-zero exit, or when
/// `timeout` elapses, in which case the child is killed.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[&str], timeout: Option<Duration>)
        -> Result<CommandOutput>;
}

/// Runs real processes through [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        debug!(program = %program.display(), ?args, ?timeout, "Running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ScanError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        // Pipes are drained while waiting; a full pipe would stall the child.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match wait_for_exit(&mut child, timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Readers are left detached; grandchildren may still hold the pipes open.
                return Err(ScanError::Timeout {
                    program: program.to_path_buf(),
                    after: timeout.unwrap_or_default(),
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout_reader.join().unwrap_or_default()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_reader.join().unwrap_or_default()).into_owned(),
        };

        if !status.success() {
            return Err(ScanError::Exit {
                program: program.to_path_buf(),
                code: status.code(),
                output: captured.combined().trim().to_string(),
            });
        }

        Ok(captured)
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Waits for `child`, killing and reaping it once `timeout` passes.
///
/// Returns `Ok(None)` when the deadline was hit.
fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
    let Some(limit) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable `/bin/sh` script.
    pub fn write_script(path: &Path, body: &str) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_path_buf()
    }
}
