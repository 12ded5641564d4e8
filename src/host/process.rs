//! Child-process execution host.
//!
//! The bootstrap document is written to a temporary file whose path is
//! passed as the last argument of the configured command. The child speaks
//! newline-delimited JSON envelopes on stdin/stdout; its first `load` frame
//! is the load notification. The granted permission tokens are exported in
//! `PREVIEW_SANDBOX` so the child can apply them to whatever context it
//! builds (a headless browser frame, a JS isolate).

use crate::error::PreviewError;
use crate::host::{ExecutionHost, HostFactory, HostLifecycle, HostSpec};
use crate::protocol::{EnvelopeKind, MessageEnvelope};
use crate::transport::{Transport, TransportReceiver, TransportSender};
use crate::types::HostId;
use std::io::Write;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Environment variable carrying the space-separated permission tokens.
pub const SANDBOX_ENV: &str = "PREVIEW_SANDBOX";

/// Environment variable carrying the host id.
pub const HOST_ID_ENV: &str = "PREVIEW_HOST_ID";

/// Launches a [`ProcessHost`] per host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHostFactory {
    command: String,
    args: Vec<String>,
}

impl ProcessHostFactory {
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl HostFactory for ProcessHostFactory {
    fn create(&self, spec: HostSpec) -> Result<Box<dyn ExecutionHost>, PreviewError> {
        let mut document_file = tempfile::Builder::new()
            .prefix("acton-preview-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| PreviewError::host_creation(format!("failed to create document file: {e}")))?;
        document_file
            .write_all(spec.document.as_bytes())
            .and_then(|()| document_file.flush())
            .map_err(|e| PreviewError::host_creation(format!("failed to write document file: {e}")))?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(document_file.path())
            .env(SANDBOX_ENV, spec.permissions.to_attribute())
            .env(HOST_ID_ENV, spec.host_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PreviewError::host_creation(format!("failed to spawn '{}': {e}", self.command))
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => return Err(PreviewError::host_creation("child stdio was not captured")),
        };

        let (host_side, guest_side) = Transport::pair();
        let (guest_sender, guest_receiver) = guest_side.split();
        let (load_tx, load_rx) = oneshot::channel();

        let mut tasks = vec![
            tokio::spawn(pump_to_child(guest_receiver, stdin)),
            tokio::spawn(pump_from_child(
                spec.host_id.clone(),
                stdout,
                guest_sender,
                load_tx,
            )),
        ];
        if let Some(stderr) = child.stderr.take() {
            let host_id = spec.host_id.clone();
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(host_id = %host_id, line = %line, "Preview host stderr");
                }
            }));
        }

        tracing::info!(
            host_id = %spec.host_id,
            command = %self.command,
            pid = ?child.id(),
            "Process host spawned"
        );

        Ok(Box::new(ProcessHost {
            id: spec.host_id,
            document: spec.document,
            lifecycle: HostLifecycle::Constructing,
            transport: Some(host_side),
            load: Some(load_rx),
            child: Some(child),
            tasks,
            _document_file: Some(document_file),
        }))
    }

    fn is_available(&self) -> bool {
        !self.command.trim().is_empty()
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

async fn pump_to_child(mut frames: TransportReceiver, mut stdin: ChildStdin) {
    while let Some(frame) = frames.recv_frame().await {
        let mut line = frame.into_bytes();
        line.push(b'\n');
        if let Err(e) = stdin.write_all(&line).await {
            tracing::warn!(error = %e, "Preview host stdin closed");
            break;
        }
        if stdin.flush().await.is_err() {
            break;
        }
    }
}

async fn pump_from_child(
    host_id: HostId,
    stdout: ChildStdout,
    frames: TransportSender,
    load: oneshot::Sender<()>,
) {
    let mut load = Some(load);
    let mut lines = BufReader::new(stdout).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(host_id = %host_id, error = %e, "Failed to read from preview host");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let is_load = matches!(
            MessageEnvelope::from_frame(&line),
            Ok(MessageEnvelope {
                kind: EnvelopeKind::Load,
                ..
            })
        );
        if is_load {
            match load.take() {
                Some(signal) => {
                    let _ = signal.send(());
                }
                None => tracing::debug!(host_id = %host_id, "Ignoring repeated load frame"),
            }
            continue;
        }

        if frames.send_frame(line).is_err() {
            break;
        }
    }

    tracing::debug!(host_id = %host_id, "Preview host stdout closed");
}

/// An execution host running as a child process.
#[derive(Debug)]
pub struct ProcessHost {
    id: HostId,
    document: String,
    lifecycle: HostLifecycle,
    transport: Option<Transport>,
    load: Option<oneshot::Receiver<()>>,
    child: Option<Child>,
    tasks: Vec<JoinHandle<()>>,
    _document_file: Option<NamedTempFile>,
}

impl ExecutionHost for ProcessHost {
    fn id(&self) -> &HostId {
        &self.id
    }

    fn lifecycle(&self) -> HostLifecycle {
        self.lifecycle
    }

    fn document(&self) -> &str {
        &self.document
    }

    fn take_transport(&mut self) -> Option<Transport> {
        self.transport.take()
    }

    fn take_load_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        self.load.take()
    }

    fn mark_ready(&mut self) {
        if self.lifecycle == HostLifecycle::Constructing {
            self.lifecycle = HostLifecycle::Ready;
        }
    }

    fn destroy(&mut self) {
        if self.lifecycle == HostLifecycle::Destroyed {
            return;
        }
        self.lifecycle = HostLifecycle::Destroyed;

        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(host_id = %self.id, error = %e, "Preview host already exited");
            }
        }
        self.transport = None;
        self.load = None;
        self._document_file = None;

        tracing::info!(host_id = %self.id, "Process host destroyed");
    }
}

impl Drop for ProcessHost {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
