use crate::mastering::DEFAULT_BITRATE;
use clap::Parser;
use std::path::PathBuf;

/// Batch audio mastering through FFmpeg filter chains
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Directory holding the audio files to master (WAV, MP3, FLAC, AAC, M4A, OGG, WMA)
    #[arg(default_value = "input")]
    pub input_dir: PathBuf,

    /// Directory the mastered MP3 files are written to (created if missing)
    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    /// Preset to start from: pop, rock, classical or loudness. Unknown names fall back to the defaults.
    pub preset: Option<String>,

    /// Load a settings file (JSON). Values in the file replace the preset. A missing file is ignored.
    #[arg(short = 's', long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Write the resolved settings to this file before processing.
    #[arg(short = 'w', long = "save-settings", value_name = "FILE")]
    pub save_settings: Option<PathBuf>,

    /// FFmpeg binary to run.
    #[arg(long, default_value = "ffmpeg", value_name = "PATH")]
    pub ffmpeg: PathBuf,

    /// Output bitrate (e.g. 256k).
    #[arg(short = 'b', long, default_value = DEFAULT_BITRATE)]
    pub bitrate: String,

    /// Seconds a single FFmpeg invocation may run before it is killed. 0 disables the limit.
    #[arg(short = 't', long, default_value_t = 1800)]
    pub timeout: u64,

    /// Number of files to master at once (capped at the CPU count).
    #[arg(short = 'j', long, default_value_t = 1)]
    pub jobs: usize,

    /// Show ffmpeg logs.
    #[arg(short = 'g', long)]
    pub debug: bool,

    /// Check FFmpeg installation and the filters the mastering chain needs.
    #[arg(short = 'c', long)]
    pub check_ffmpeg: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_defaults() {
        let args = Args::parse_from(["batch-master"]);
        assert_eq!(args.input_dir, PathBuf::from("input"));
        assert_eq!(args.output_dir, PathBuf::from("output"));
        assert_eq!(args.preset, None);
        assert_eq!(args.bitrate, "320k");
        assert_eq!(args.jobs, 1);
    }

    #[test]
    fn positional_preset() {
        let args = Args::parse_from(["batch-master", "songs", "done", "rock", "-j", "4", "-vv"]);
        assert_eq!(args.input_dir, PathBuf::from("songs"));
        assert_eq!(args.output_dir, PathBuf::from("done"));
        assert_eq!(args.preset.as_deref(), Some("rock"));
        assert_eq!(args.jobs, 4);
        assert_eq!(args.verbose, 2);
    }
}
