//! External job execution with live output.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::{CodesignError, Result};
use crate::stage::JobSpec;

/// Result of a job execution.
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Whether the job exited with status 0.
    pub succeeded: bool,

    /// Exit code, `None` when the job was killed by a signal.
    pub exit_code: Option<i32>,

    /// Captured stdout and stderr, interleaved in arrival order.
    pub output: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Executes stage jobs for the round controller.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run `job` to completion. A non-zero exit is reported through
    /// [`JobOutput::succeeded`], not as an error.
    async fn run(&self, job: &JobSpec) -> Result<JobOutput>;
}

/// Runs jobs as child processes, streaming their output as it arrives.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    mirror: bool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self { mirror: true }
    }

    /// Capture output without echoing it to stdout.
    pub fn quiet() -> Self {
        Self { mirror: false }
    }

    /// Run `program` with `args`, returning once the child has exited.
    ///
    /// No timeout is applied; a job that never exits blocks the caller.
    pub async fn run_command(&self, program: &str, args: &[String]) -> Result<JobOutput> {
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CodesignError::JobSpawn {
                program: program.to_string(),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(CodesignError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("{} started without output pipes", program),
            )));
        };
        let output = match self.drain(stdout, stderr).await {
            Ok(output) => output,
            Err(e) => {
                warn!(program = %program, error = %e, "reading job output failed, killing job");
                if let Err(kill) = child.kill().await {
                    debug!(program = %program, error = %kill, "kill failed");
                }
                let _ = child.wait().await;
                return Err(e.into());
            }
        };

        let status = child.wait().await?;
        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(program = %program, status = ?status.code(), duration_ms, "job exited");

        Ok(JobOutput {
            succeeded: status.success(),
            exit_code: status.code(),
            output,
            duration_ms,
        })
    }

    /// Read both pipes to EOF, recording and optionally echoing each line.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD.
    async fn drain(&self, stdout: ChildStdout, stderr: ChildStderr) -> std::io::Result<String> {
        let mut stdout = BufReader::new(stdout);
        let mut stderr = BufReader::new(stderr);
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut console = tokio::io::stdout();
        let mut output = String::new();

        while stdout_open || stderr_open {
            let (read, from_stdout) = tokio::select! {
                read = stdout.read_until(b'\n', &mut stdout_buf), if stdout_open => (read, true),
                read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => (read, false),
            };
            let (open, buf) = if from_stdout {
                (&mut stdout_open, &mut stdout_buf)
            } else {
                (&mut stderr_open, &mut stderr_buf)
            };
            if read? == 0 {
                *open = false;
                continue;
            }

            let line = decode_line(buf);
            buf.clear();
            output.push_str(&line);
            if self.mirror {
                console.write_all(line.as_bytes()).await?;
                console.flush().await?;
            }
        }

        Ok(output)
    }
}

/// One output line, newline-terminated, with a trailing CR dropped.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let mut line = String::from_utf8_lossy(raw).into_owned();
    line.push('\n');
    line
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobRunner for ProcessRunner {
    async fn run(&self, job: &JobSpec) -> Result<JobOutput> {
        if job.command.is_empty() {
            return Err(CodesignError::InvalidConfig(format!(
                "{} job for round {} has an empty command",
                job.stage, job.round
            )));
        }
        self.run_command(job.program(), job.args()).await
    }
}
