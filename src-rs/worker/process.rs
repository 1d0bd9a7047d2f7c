use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::task::{Credential, TaskSpec};

use super::descriptor::JobDescriptor;
use super::result::{interpret, Outcome, WorkerReport};

/// How long to keep reading stdout/stderr after the worker itself exited.
/// Bounds the wait on grandchildren that inherited the pipes.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `interpreter path`, or the script on its own when no interpreter is set.
    pub fn script(interpreter: Option<&str>, path: &str) -> Self {
        match interpreter.map(str::trim).filter(|value| !value.is_empty()) {
            Some(interpreter) => Self::new(interpreter, vec![path.to_string()]),
            None => Self::new(path, Vec::new()),
        }
    }

    pub fn describe(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

enum Exit {
    Finished(io::Result<ExitStatus>),
    Killed,
}

/// Runs one external worker per task: the job descriptor goes in on stdin,
/// the result envelope comes back on stdout and stderr is kept as logs.
#[derive(Clone, Debug)]
pub struct WorkerProcess {
    config: WorkerConfig,
}

impl WorkerProcess {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn spawn(&self) -> io::Result<Child> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so termination also reaches the worker's children.
        #[cfg(unix)]
        command.process_group(0);
        command.spawn()
    }

    fn launch(
        &self,
        spec: &TaskSpec,
        credential: &Credential,
    ) -> Result<(Child, Vec<u8>), QueueError> {
        let payload = JobDescriptor::new(spec, credential)
            .to_bytes()
            .map_err(|err| QueueError::Process(format!("failed to encode job descriptor: {}", err)))?;
        let child = self.spawn().map_err(|err| {
            QueueError::Process(format!(
                "failed to spawn worker '{}': {}",
                self.config.program, err
            ))
        })?;
        Ok((child, payload))
    }

    /// Runs the worker to completion, or until `kill` fires. Never fails:
    /// every problem is folded into the returned report.
    pub async fn run(
        &self,
        spec: &TaskSpec,
        credential: &Credential,
        mut kill: oneshot::Receiver<()>,
    ) -> WorkerReport {
        if kill.try_recv().is_ok() {
            return WorkerReport::failed("cancelled before the worker started", String::new());
        }

        let (mut child, payload) = match self.launch(spec, credential) {
            Ok(launched) => launched,
            Err(err) => {
                warn!(worker = %self.config.describe(), %err, "worker did not start");
                return WorkerReport::failed(err.to_string(), String::new());
            }
        };
        debug!(pid = ?child.id(), "worker spawned");

        let stdin_writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&payload).await {
                    debug!(%err, "worker closed stdin before reading the job");
                }
            })
        });
        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        let exit = tokio::select! {
            status = child.wait() => Exit::Finished(status),
            Ok(()) = &mut kill => Exit::Killed,
        };

        let mut notes = Vec::new();
        let status = match exit {
            Exit::Finished(status) => status,
            Exit::Killed => {
                info!(pid = ?child.id(), "terminating worker");
                if let Err(err) = terminate(&mut child) {
                    warn!(%err, "failed to terminate worker");
                    notes.push(format!("termination failed: {}", err));
                }
                child.wait().await
            }
        };

        if let Some(writer) = stdin_writer {
            writer.abort();
        }
        let (stdout, stderr) = tokio::join!(collect(stdout), collect(stderr));
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        let outcome = match status {
            Ok(status) => interpret(status, &stdout, &stderr),
            Err(err) => Outcome::Failed {
                error: format!("failed to wait for worker: {}", err),
            },
        };

        let mut logs = stderr;
        for note in notes {
            if !logs.is_empty() && !logs.ends_with('\n') {
                logs.push('\n');
            }
            logs.push_str(&note);
        }
        WorkerReport { outcome, logs }
    }
}

/// Sends SIGKILL to the worker's process group, falling back to the worker
/// alone. A worker that has already been reaped is not an error.
fn terminate(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) takes plain integers and has no memory-safety preconditions.
        let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    match child.start_kill() {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => {
            debug!("worker already exited");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn capture<R>(stream: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            if let Err(err) = stream.read_to_end(&mut buf).await {
                debug!(%err, "worker output stream failed");
            }
        }
        buf
    })
}

async fn collect(mut reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut reader).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(err)) => {
            warn!(%err, "worker output reader failed");
            Vec::new()
        }
        Err(_) => {
            reader.abort();
            warn!("worker output still open after exit, discarding it");
            Vec::new()
        }
    }
}
