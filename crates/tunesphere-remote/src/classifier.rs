//! Genre lookup by running the classifier script locally.
//!
//! The whole batch goes to one process invocation:
//! `<program> <args...> <url> <url> ...`. Stdout is read to completion and
//! parsed as the annotation array. The process is killed if it outlives the
//! timeout.

use crate::{GenreLookup, RemoteError, parse_annotations};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tunesphere_core::GenreAnnotation;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external classifier once per batch
#[derive(Debug, Clone)]
pub struct ProcessGenreLookup {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessGenreLookup {
    /// `args` come before the preview URLs (typically the script path)
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    fn spawn(&self, preview_urls: &[String]) -> Result<Child, RemoteError> {
        Ok(Command::new(&self.program)
            .args(&self.args)
            .args(preview_urls)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?)
    }
}

/// Drain a pipe on its own thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut out = String::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_string(&mut out) {
                warn!("Failed to read classifier output: {e}");
            }
        }
        out
    })
}

impl GenreLookup for ProcessGenreLookup {
    fn lookup(&self, preview_urls: &[String]) -> Result<Vec<GenreAnnotation>, RemoteError> {
        if preview_urls.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "Running classifier {} on {} tracks",
            self.program,
            preview_urls.len()
        );
        let mut child = self.spawn(preview_urls)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!("Classifier exceeded {:?}, killing it", self.timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(RemoteError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !stderr.trim().is_empty() {
            debug!("Classifier stderr: {}", stderr.trim());
        }

        if !status.success() {
            return Err(RemoteError::ClassifierFailed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        parse_annotations(&stdout)
    }

    fn describe(&self) -> String {
        format!("process {} {}", self.program, self.args.join(" "))
    }
}
