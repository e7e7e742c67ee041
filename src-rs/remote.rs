//! [`RemoteWindow`] implementations for the CLI host.

use crate::capture::RemoteWindow;
use crate::node::{NodeId, ViewTree};
use crate::options::CaptureOptions;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Talks to a device through shell commands, e.g. an `adb` wrapper script.
///
/// The dump command may use `{title}`, `{version}`; the preview command may
/// also use `{name}`, `{hash}`. Substituted values are shell-quoted. Each
/// command must write its payload to stdout.
#[derive(Debug, Clone)]
pub struct CommandWindow {
    title: String,
    dump_cmd: String,
    preview_cmd: String,
}

impl CommandWindow {
    pub fn new(title: impl Into<String>, dump_cmd: impl Into<String>, preview_cmd: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            dump_cmd: dump_cmd.into(),
            preview_cmd: preview_cmd.into(),
        }
    }
}

impl RemoteWindow for CommandWindow {
    fn title(&self) -> &str {
        &self.title
    }

    fn load_window_data(&self, options: &CaptureOptions, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let version = options.version.number().to_string();
        let cmd = expand_template(
            &self.dump_cmd,
            &[("title", options.title.as_str()), ("version", version.as_str())],
        );
        run_with_timeout(&cmd, timeout)
    }

    fn load_view_image(&self, tree: &ViewTree, node: NodeId, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let node = tree.node(node);
        let cmd = expand_template(
            &self.preview_cmd,
            &[
                ("title", self.title.as_str()),
                ("name", node.name.as_str()),
                ("hash", node.hash.as_str()),
            ],
        );
        let image = run_with_timeout(&cmd, timeout)?;
        Ok(image.filter(|bytes| !bytes.is_empty()))
    }
}

/// Replays a dump and preview captured earlier.
#[derive(Debug, Clone)]
pub struct FileWindow {
    title: String,
    dump: PathBuf,
    preview: Option<PathBuf>,
}

impl FileWindow {
    pub fn new(title: impl Into<String>, dump: impl Into<PathBuf>, preview: Option<PathBuf>) -> Self {
        Self {
            title: title.into(),
            dump: dump.into(),
            preview,
        }
    }
}

impl RemoteWindow for FileWindow {
    fn title(&self) -> &str {
        &self.title
    }

    fn load_window_data(&self, _options: &CaptureOptions, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        let bytes = fs::read(&self.dump)
            .with_context(|| format!("failed to read dump: {}", self.dump.display()))?;
        Ok(Some(bytes))
    }

    fn load_view_image(&self, _tree: &ViewTree, _node: NodeId, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.preview.as_ref() else {
            return Ok(None);
        };
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read preview: {}", path.display()))?;
        Ok(Some(bytes))
    }
}

fn expand_template(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), &shell_quote(value))
    })
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Runs `cmd` under bash and returns its stdout, or `None` when it does not
/// finish within `timeout`. A timed-out child is killed and reaped. Output is
/// also bounded by the deadline, since a background process can hold the
/// pipes open after the shell exits.
fn run_with_timeout(cmd: &str, timeout: Duration) -> Result<Option<Vec<u8>>> {
    let deadline = Instant::now() + timeout;
    let mut child = Command::new("bash")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn: {cmd}"))?;

    // Drain pipes concurrently so a large dump cannot fill the pipe and stall the child.
    let stdout_rx = drain_in_background(child.stdout.take());
    let stderr_rx = drain_in_background(child.stderr.take());

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "command timed out: {cmd}");
            return Ok(None);
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow::Error::from(err).context(format!("failed to wait for: {cmd}")));
        }
    };

    let stdout = match stdout_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(bytes) => bytes,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "command output still open after deadline: {cmd}"
            );
            return Ok(None);
        }
        Err(RecvTimeoutError::Disconnected) => bail!("stdout reader stopped: {cmd}"),
    };

    if !status.success() {
        let stderr = stderr_rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .unwrap_or_default();
        let code = status.code().unwrap_or(1);
        let stderr = String::from_utf8_lossy(&stderr);
        bail!("command exited with status {code}: {cmd}\n{}", stderr.trim());
    }

    tracing::debug!(bytes = stdout.len(), "command finished: {cmd}");
    Ok(Some(stdout))
}

fn drain_in_background<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(drain(pipe));
    });
    rx
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
