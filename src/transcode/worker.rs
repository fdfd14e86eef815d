//! Transcoder process supervision

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::SessionId;
use crate::stats::SessionStats;

use super::config::{TranscodeJob, TranscoderConfig};
use super::TRANSCODER_LOG_TARGET;

/// How long to wait for the output drain after the process is gone
const DRAIN_SETTLE: Duration = Duration::from_secs(1);

/// Error type for transcoder runs
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// The process could not be launched
    #[error("failed to spawn transcoder {program}: {source}")]
    Spawn {
        /// Executable that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The process exited before it was asked to stop
    #[error("transcoder exited unexpectedly ({0})")]
    UnexpectedExit(ExitStatus),

    /// Waiting on or killing the process failed
    #[error("transcoder process error: {0}")]
    Process(#[from] io::Error),
}

impl TranscodeError {
    /// Exit code of an unexpected exit, `None` when killed by a signal
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TranscodeError::UnexpectedExit(status) => status.code(),
            _ => None,
        }
    }
}

/// How a cancelled transcoder run ended
#[derive(Debug, Clone, Copy)]
pub struct TranscodeExit {
    /// Final process status
    pub status: ExitStatus,
    /// Whether the grace period ran out and the process was killed
    pub forced: bool,
    /// Time the process was alive
    pub runtime: Duration,
}

/// Supervises the transcoder subprocess of one session
pub struct TranscodeWorker {
    config: TranscoderConfig,
    stats: Arc<SessionStats>,
}

impl TranscodeWorker {
    /// Create a worker reporting into the given session counters
    pub fn new(config: TranscoderConfig, stats: Arc<SessionStats>) -> Self {
        Self { config, stats }
    }

    /// Run the transcoder until `cancel` fires or the process exits on its own.
    ///
    /// The child is spawned with `kill_on_drop`, so dropping this future (for
    /// example by aborting its task) force-kills the process.
    pub async fn run(
        self,
        job: TranscodeJob,
        cancel: CancellationToken,
    ) -> Result<TranscodeExit, TranscodeError> {
        let mut command = self.config.command(&job);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| TranscodeError::Spawn {
            program: self.config.program.display().to_string(),
            source,
        })?;
        let started = Instant::now();

        tracing::info!(
            session = %job.session,
            pid = ?child.id(),
            input = %job.input,
            "Transcoder started"
        );

        let drain = child.stderr.take().map(|stderr| {
            tokio::spawn(drain_output(
                job.session.clone(),
                stderr,
                Arc::clone(&self.stats),
            ))
        });

        let result = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => {
                    tracing::error!(
                        session = %job.session,
                        status = %status,
                        "Transcoder ended unexpectedly"
                    );
                    Err(TranscodeError::UnexpectedExit(status))
                }
                Err(e) => Err(TranscodeError::Process(e)),
            },
            _ = cancel.cancelled() => {
                self.terminate(&job.session, &mut child).await.map(|(status, forced)| TranscodeExit {
                    status,
                    forced,
                    runtime: started.elapsed(),
                })
            }
        };

        settle_drain(drain).await;

        tracing::info!(
            session = %job.session,
            runtime_secs = started.elapsed().as_secs(),
            "Transcoder stopped"
        );

        result
    }

    /// Ask the process to exit, then kill it once the grace period runs out.
    async fn terminate(
        &self,
        session: &SessionId,
        child: &mut Child,
    ) -> Result<(ExitStatus, bool), TranscodeError> {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }

        tracing::info!(session = %session, "Terminating transcoder");

        match request_termination(child) {
            Ok(()) => match tokio::time::timeout(self.config.grace_period, child.wait()).await {
                Ok(status) => return Ok((status?, false)),
                Err(_) => tracing::warn!(
                    session = %session,
                    grace_secs = self.config.grace_period.as_secs_f64(),
                    "Transcoder did not terminate, forcing kill"
                ),
            },
            Err(e) => tracing::warn!(
                session = %session,
                error = %e,
                "Graceful termination failed, forcing kill"
            ),
        }

        if let Err(e) = child.start_kill() {
            // Already reaped between the timeout and the kill
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(e.into());
            }
        }
        let status = child.wait().await?;
        Ok((status, true))
    }
}

/// Send the platform's polite termination request.
///
/// A process that is already gone counts as stopped.
#[cfg(unix)]
fn request_termination(child: &Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> io::Result<()> {
    match child.start_kill() {
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

/// Longest output line kept; the rest of an overlong line is dropped
const MAX_LINE: usize = 4096;

/// Splits transcoder output into lines ended by `\r` or `\n`
#[derive(Debug, Default)]
struct OutputLines {
    pending: Vec<u8>,
}

impl OutputLines {
    /// Feed a chunk of output, calling `emit` for every completed line
    fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(&str)) {
        for &byte in chunk {
            if byte == b'\r' || byte == b'\n' {
                self.flush(&mut emit);
            } else if self.pending.len() < MAX_LINE {
                self.pending.push(byte);
            }
        }
    }

    /// Emit whatever is left of an unterminated line
    fn flush(&mut self, mut emit: impl FnMut(&str)) {
        {
            let text = String::from_utf8_lossy(&self.pending);
            let line = text.trim();
            if !line.is_empty() {
                emit(line);
            }
        }
        self.pending.clear();
    }
}

/// Forward every line of transcoder output to the transcoder log target.
///
/// Reads until EOF. Carriage returns end a line as well as newlines, so
/// progress updates show up while the process runs. Invalid UTF-8 is
/// replaced rather than ending the drain.
pub(crate) async fn drain_output<R>(session: SessionId, output: R, stats: Arc<SessionStats>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut lines = OutputLines::default();
    let mut emit = |line: &str| {
        stats.record_transcoder_line();
        tracing::debug!(target: TRANSCODER_LOG_TARGET, session = %session, "{}", line);
    };

    loop {
        let chunk = match reader.fill_buf().await {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Transcoder output drain failed");
                break;
            }
        };
        let consumed = chunk.len();
        lines.push(chunk, &mut emit);
        reader.consume(consumed);
    }

    lines.flush(&mut emit);
}

async fn settle_drain(drain: Option<JoinHandle<()>>) {
    if let Some(mut handle) = drain {
        if tokio::time::timeout(DRAIN_SETTLE, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn job() -> TranscodeJob {
        TranscodeJob {
            session: SessionId::parse("t1").unwrap(),
            input: "rtmp://localhost/live/t1".into(),
            overlay: PathBuf::from("/tmp/t1.png"),
            destination: "dest://x".into(),
        }
    }

    fn shell(script: &str) -> TranscoderConfig {
        TranscoderConfig::default()
            .program("sh")
            .args(["-c", script])
            .grace_period(Duration::from_millis(300))
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unexpected() {
        let worker = TranscodeWorker::new(shell("exit 3"), Arc::new(SessionStats::new()));
        let err = worker.run(job(), CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, TranscodeError::UnexpectedExit(_)));
        assert_eq!(err.exit_code(), Some(3));
    }

    #[tokio::test]
    async fn test_zero_exit_is_still_unexpected() {
        let worker = TranscodeWorker::new(shell("exit 0"), Arc::new(SessionStats::new()));
        let err = worker.run(job(), CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = TranscoderConfig::default().program("/nonexistent/scorecast-transcoder");
        let worker = TranscodeWorker::new(config, Arc::new(SessionStats::new()));
        let err = worker.run(job(), CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, TranscodeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_cancel_terminates_gracefully() {
        let worker = TranscodeWorker::new(shell("exec sleep 30"), Arc::new(SessionStats::new()));
        let cancel = CancellationToken::new();

        let run = tokio::spawn(worker.run(job(), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let exit = tokio_test::assert_ok!(run.await.unwrap());
        assert!(!exit.forced);
        assert!(!exit.status.success());
    }

    #[tokio::test]
    async fn test_cancel_forces_kill_after_grace() {
        let worker = TranscodeWorker::new(
            shell("trap '' TERM; while :; do sleep 0.1; done"),
            Arc::new(SessionStats::new()),
        );
        let cancel = CancellationToken::new();

        let run = tokio::spawn(worker.run(job(), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let cancelled_at = Instant::now();
        cancel.cancel();

        let exit = tokio_test::assert_ok!(run.await.unwrap());
        assert!(exit.forced);
        // grace period + kill + drain settle
        assert!(cancelled_at.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_output_is_drained() {
        let stats = Arc::new(SessionStats::new());
        let worker = TranscodeWorker::new(
            shell("echo 'frame=1' >&2; printf 'a\\rb\\n' >&2; exec sleep 30"),
            Arc::clone(&stats),
        );
        let cancel = CancellationToken::new();
        let run = tokio::spawn(worker.run(job(), cancel.clone()));

        for _ in 0..50 {
            if stats.snapshot().transcoder_lines >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        run.await.unwrap().unwrap();

        assert_eq!(stats.snapshot().transcoder_lines, 3);
    }

    #[tokio::test]
    async fn test_drain_replaces_invalid_utf8() {
        let stats = Arc::new(SessionStats::new());
        let output: &[u8] = b"ok line\n\xff\xfe broken\n\n";

        drain_output(SessionId::parse("t1").unwrap(), output, Arc::clone(&stats)).await;

        assert_eq!(stats.snapshot().transcoder_lines, 2);
    }

    #[tokio::test]
    async fn test_carriage_return_lines_counted_while_running() {
        let stats = Arc::new(SessionStats::new());
        let worker = TranscodeWorker::new(
            shell("while :; do printf 'frame=1 fps=25\\r' >&2; sleep 0.05; done"),
            Arc::clone(&stats),
        );
        let cancel = CancellationToken::new();
        let run = tokio::spawn(worker.run(job(), cancel.clone()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while stats.snapshot().transcoder_lines < 5 {
            assert!(Instant::now() < deadline, "progress lines never reached the log");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!run.is_finished());

        cancel.cancel();
        tokio_test::assert_ok!(run.await.unwrap());
    }

    #[test]
    fn test_overlong_line_is_capped() {
        let mut lines = OutputLines::default();
        let mut seen = Vec::new();

        lines.push(&vec![b'x'; MAX_LINE * 4], |line| seen.push(line.len()));
        assert_eq!(lines.pending.len(), MAX_LINE);

        lines.push(b"\rtail", |line| seen.push(line.len()));
        lines.flush(|line| seen.push(line.len()));

        assert_eq!(seen, vec![MAX_LINE, 4]);
    }
}
