//! Transcoder configuration

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

use crate::registry::SessionId;

/// Placeholder replaced by the session's input location
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the canonical overlay image path
pub const OVERLAY_PLACEHOLDER: &str = "{overlay}";
/// Placeholder replaced by the destination URI
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// What one transcoder run reads and writes
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Owning session
    pub session: SessionId,
    /// Incoming feed location
    pub input: String,
    /// Canonical overlay image path, re-read continuously by the transcoder
    pub overlay: PathBuf,
    /// Outbound platform URI
    pub destination: String,
}

/// Transcoder configuration options
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Executable to launch
    pub program: PathBuf,

    /// Argument template; see the `*_PLACEHOLDER` constants
    pub args: Vec<String>,

    /// How long to wait after a graceful termination request before killing
    pub grace_period: Duration,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        let args = [
            "-re",
            "-i",
            INPUT_PLACEHOLDER,
            "-analyzeduration",
            "10M",
            "-probesize",
            "10M",
            "-loop",
            "1",
            "-i",
            OVERLAY_PLACEHOLDER,
            "-filter_complex",
            "[0:v]transpose=2[v];[v][1:v]overlay=15:620:format=auto:eof_action=pass",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-b:v",
            "1000k",
            "-c:a",
            "aac",
            "-ar",
            "44100",
            "-shortest",
            "-fflags",
            "+shortest",
            "-avoid_negative_ts",
            "make_zero",
            "-f",
            "flv",
            OUTPUT_PLACEHOLDER,
        ];

        Self {
            program: PathBuf::from("ffmpeg"),
            args: args.iter().map(|a| a.to_string()).collect(),
            grace_period: Duration::from_secs(5),
        }
    }
}

impl TranscoderConfig {
    /// Set the executable
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the argument template
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the graceful termination window
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Expand the argument template for one job
    pub fn args_for(&self, job: &TranscodeJob) -> Vec<String> {
        let overlay = job.overlay.to_string_lossy();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &job.input)
                    .replace(OVERLAY_PLACEHOLDER, &overlay)
                    .replace(OUTPUT_PLACEHOLDER, &job.destination)
            })
            .collect()
    }

    /// Build the command for one job. Stdio wiring is left to the caller.
    pub fn command(&self, job: &TranscodeJob) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args_for(job));
        command
    }
}
