use crate::ffmpeg::FFmpegError;
use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

/// Why a single job stopped. None of these abort a batch.
#[derive(Debug, Error)]
pub enum MasterError {
    #[error("Input file not found: {0}")]
    MissingInputFile(PathBuf),

    #[error("Analysis failed for '{path}': {diagnostics}")]
    AnalysisFailed { path: PathBuf, diagnostics: String },

    #[error("Mastering failed ({}): {diagnostics}", describe_exit(.code))]
    MasteringFailed {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("Simplified mastering failed ({}): {diagnostics}", describe_exit(.code))]
    SimplifiedMasteringFailed {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("Output {} is already claimed by {}", .output.display(), .other.display())]
    OutputCollision { output: PathBuf, other: PathBuf },

    #[error("{stage} timed out after {after:?}")]
    TimedOut { stage: &'static str, after: Duration },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl MasterError {
    /// Map a runner error for the stage it happened in. Spawn failures count as
    /// a failure of that stage; the deadline keeps its own kind.
    pub fn from_ffmpeg(
        stage: &'static str,
        err: FFmpegError,
        failed: impl FnOnce(String) -> Self,
    ) -> Self {
        match err {
            FFmpegError::TimedOut { after, .. } => MasterError::TimedOut { stage, after },
            FFmpegError::Io(e) => MasterError::Io(e),
            other => failed(other.to_string()),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}
