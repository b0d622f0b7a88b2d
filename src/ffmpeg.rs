use regex::Regex;
use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use thiserror::Error;
use tokio::{io::AsyncReadExt, process::Command};
use tracing::{debug, trace, warn};

/// Filters the mastering chains rely on.
pub const REQUIRED_FILTERS: [&str; 5] =
    ["acompressor", "alimiter", "equalizer", "astats", "volume"];
pub const REQUIRED_ENCODER: &str = "libmp3lame";

#[derive(Debug, Error)]
pub enum FFmpegError {
    #[error("`{0}` command not found. Please ensure it is installed and in your PATH.")]
    CommandNotFound(String),
    #[error("Failed to start `{0}`: {1}")]
    Spawn(String, io::Error),
    #[error("`{program}` did not finish within {after:?} and was killed")]
    TimedOut { program: String, after: Duration },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Exit status plus everything the tool wrote to stderr.
#[derive(Debug)]
pub struct FFmpegOutput {
    pub status: ExitStatus,
    pub diagnostics: String,
}

impl FFmpegOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// How to reach the external binary and how long one invocation may take.
#[derive(Debug, Clone)]
pub struct FFmpeg {
    program: PathBuf,
    timeout: Option<Duration>,
    debug: bool,
}

impl FFmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        FFmpeg {
            program: program.into(),
            timeout: None,
            debug: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Echo the tool's stderr as it arrives.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the binary with `args`, handing each stderr chunk to `on_stderr` as
    /// it arrives. A nonzero exit is not an error here; callers inspect
    /// [`FFmpegOutput::status`]. When the deadline passes the child is killed.
    pub async fn run<I, S, F>(
        &self,
        args: I,
        mut on_stderr: F,
    ) -> Result<FFmpegOutput, FFmpegError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        F: FnMut(&str),
    {
        let program = self.program.display().to_string();
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Running {:?}", command.as_std());

        let mut child = command.spawn().map_err(|e| spawn_error(&program, e))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;

        let mut diagnostics = String::new();
        let debug_echo = self.debug;
        let work = async {
            let mut buf = [0u8; 4096];
            loop {
                let n = stderr.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                let chunk = String::from_utf8_lossy(&buf[..n]);
                trace!("{}", chunk);
                if debug_echo {
                    eprint!("{}", chunk);
                }
                on_stderr(&chunk);
                diagnostics.push_str(&chunk);
            }
            let status = child.wait().await?;
            Ok::<ExitStatus, io::Error>(status)
        };

        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.ok(),
            None => Some(work.await),
        };
        let Some(status) = finished else {
            let after = self.timeout.unwrap_or_default();
            warn!("{} exceeded {:?}, killing it", program, after);
            child.kill().await?;
            return Err(FFmpegError::TimedOut { program, after });
        };

        Ok(FFmpegOutput {
            status: status?,
            diagnostics,
        })
    }
}

fn spawn_error(program: &str, e: io::Error) -> FFmpegError {
    if e.kind() == io::ErrorKind::NotFound {
        FFmpegError::CommandNotFound(program.to_string())
    } else {
        FFmpegError::Spawn(program.to_string(), e)
    }
}

#[derive(Debug)]
pub struct FFmpegVersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug)]
pub struct FFmpegCheckResult {
    pub ffmpeg_available: bool,
    pub ffmpeg_version: Option<FFmpegVersionInfo>,
    pub missing_filters: Vec<&'static str>,
    pub encoder_available: bool,
    pub error: Option<String>,
}

pub async fn check_ffmpeg_installation(ffmpeg: &FFmpeg) -> FFmpegCheckResult {
    let mut result = FFmpegCheckResult {
        ffmpeg_available: false,
        ffmpeg_version: None,
        missing_filters: REQUIRED_FILTERS.to_vec(),
        encoder_available: false,
        error: None,
    };

    match Command::new(ffmpeg.program()).arg("-version").output().await {
        Ok(output) => {
            if output.status.success() {
                result.ffmpeg_available = true;
                result.ffmpeg_version = parse_version(&String::from_utf8_lossy(&output.stdout));
            }
        }
        Err(e) => {
            if e.kind() == io::ErrorKind::NotFound {
                result.error = Some("FFmpeg not found in PATH".to_string());
            } else {
                result.error = Some(format!("Failed to check FFmpeg: {}", e));
            }
            return result;
        }
    }

    if let Ok(output) = Command::new(ffmpeg.program())
        .args(["-hide_banner", "-filters"])
        .output()
        .await
    {
        let filters = String::from_utf8_lossy(&output.stdout);
        result.missing_filters = missing_filters(&filters);
    }

    if let Ok(output) = Command::new(ffmpeg.program())
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
    {
        let encoders = String::from_utf8_lossy(&output.stdout);
        result.encoder_available = encoders.contains(REQUIRED_ENCODER);
    }

    result
}

fn parse_version(version_info: &str) -> Option<FFmpegVersionInfo> {
    let re = Regex::new(r"ffmpeg version n?(\d+)\.(\d+)(?:\.(\d+))?").ok()?;
    let caps = re.captures(version_info)?;
    Some(FFmpegVersionInfo {
        major: caps[1].parse().ok()?,
        minor: caps[2].parse().ok()?,
        patch: caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0)),
    })
}

/// Required filters absent from `ffmpeg -filters` output. Each listing line is
/// `<flags> <name> <io> <description>`.
fn missing_filters(listing: &str) -> Vec<&'static str> {
    let available: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .collect();
    REQUIRED_FILTERS
        .into_iter()
        .filter(|name| !available.contains(name))
        .collect()
}
