use crate::analysis::{AnalysisResult, parse_progress};
use crate::error::MasterError;
use crate::ffmpeg::{FFmpeg, FFmpegOutput};
use crate::filter_chain::{FALLBACK_CHAIN, build_filter_chain};
use crate::settings::Settings;
use std::{
    ffi::{OsStr, OsString},
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const ANALYSIS_FILTER: &str =
    "astats=metadata=1:reset=1,ametadata=print:key=lavfi.astats.Overall.RMS_level";
const OUTPUT_CODEC: &str = "libmp3lame";
const OUTPUT_SAMPLE_RATE: &str = "44100";
const OUTPUT_CHANNELS: &str = "2";
pub const DEFAULT_BITRATE: &str = "320k";

/// One input file and where its mastered version goes.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub settings: Settings,
}

impl Job {
    /// Fails with `MissingInputFile` if `input` does not exist. Without an
    /// explicit output the file lands next to the input as
    /// `<stem>_mastered.<ext>`.
    pub fn new(
        input: impl Into<PathBuf>,
        output: Option<PathBuf>,
        settings: Settings,
    ) -> Result<Self, MasterError> {
        let input = input.into();
        if !input.exists() {
            return Err(MasterError::MissingInputFile(input));
        }
        let output = output.unwrap_or_else(|| mastered_path_beside(&input));
        Ok(Job {
            input,
            output,
            settings,
        })
    }
}

fn mastered_path_beside(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = match input.extension() {
        Some(ext) => format!("{}_mastered.{}", stem, ext.to_string_lossy()),
        None => format!("{}_mastered", stem),
    };
    input.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Analysis could not read any signal level
    LevelsUndetected,
    /// The normal pass exited with an error
    MasteringFailed,
}

/// Which mastering attempt a job is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Normal,
    Simplified(FallbackReason),
}

impl Pass {
    /// First pass for a job, chosen from its analysis.
    pub fn for_analysis(analysis: &AnalysisResult) -> Pass {
        if analysis.levels_inconclusive() {
            Pass::Simplified(FallbackReason::LevelsUndetected)
        } else {
            Pass::Normal
        }
    }

    /// The pass to try after this one failed, if any.
    pub fn fallback(self) -> Option<Pass> {
        match self {
            Pass::Normal => Some(Pass::Simplified(FallbackReason::MasteringFailed)),
            Pass::Simplified(_) => None,
        }
    }

    pub fn filter_chain(self, settings: &Settings) -> String {
        match self {
            Pass::Normal => build_filter_chain(settings),
            Pass::Simplified(_) => FALLBACK_CHAIN.to_string(),
        }
    }

    fn stage(self) -> &'static str {
        match self {
            Pass::Normal => "Mastering",
            Pass::Simplified(_) => "Simplified mastering",
        }
    }

    fn failure(self, code: Option<i32>, diagnostics: String) -> MasterError {
        match self {
            Pass::Normal => MasterError::MasteringFailed { code, diagnostics },
            Pass::Simplified(_) => MasterError::SimplifiedMasteringFailed { code, diagnostics },
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Normal => f.write_str("normal"),
            Pass::Simplified(FallbackReason::LevelsUndetected) => {
                f.write_str("simplified (no levels)")
            }
            Pass::Simplified(FallbackReason::MasteringFailed) => f.write_str("simplified (retry)"),
        }
    }
}

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub analysis: AnalysisResult,
    /// The pass that wrote the output
    pub pass: Pass,
}

/// Runs jobs against the external binary: analyze, pick a pass, master, and
/// fall back to the simplified chain once if the normal pass fails.
pub struct Mastering<'a> {
    ffmpeg: &'a FFmpeg,
    bitrate: &'a str,
    show_progress: bool,
}

impl<'a> Mastering<'a> {
    pub fn new(ffmpeg: &'a FFmpeg, bitrate: &'a str) -> Self {
        Mastering {
            ffmpeg,
            bitrate,
            show_progress: false,
        }
    }

    /// Redraw the encoder position on stdout while mastering.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Analyze, pick a pass, master. Once a mastering pass has been spawned and
    /// the job fails for good, whatever it left at the output path is removed;
    /// a failed analysis never touches the output.
    pub async fn run(&self, job: &Job) -> Result<JobReport, MasterError> {
        println!("🔍 Analyzing {}...", job.input.display());
        let analysis = self.analyze(&job.input).await?;
        println!(
            "   ⏱️  {:.2} s | peak {} | RMS {} | dynamic range {:.2} dB",
            analysis.duration,
            format_level(analysis.peak_level),
            format_level(analysis.rms_level),
            analysis.dynamic_range()
        );

        let mut pass = Pass::for_analysis(&analysis);
        if pass != Pass::Normal {
            warn!(
                "No signal level detected in {}, using simplified mastering",
                job.input.display()
            );
        }

        loop {
            match self.master(job, pass, analysis.duration).await {
                Ok(()) => {
                    return Ok(JobReport {
                        input: job.input.clone(),
                        output: job.output.clone(),
                        analysis,
                        pass,
                    });
                }
                Err(err) => {
                    let retryable = matches!(err, MasterError::MasteringFailed { .. });
                    match pass.fallback() {
                        Some(next) if retryable => {
                            warn!(
                                "{}; retrying {} with simplified mastering",
                                err,
                                job.input.display()
                            );
                            pass = next;
                        }
                        _ => {
                            discard_partial_output(&job.output);
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Read-only diagnostic pass over the input.
    pub async fn analyze(&self, input: &Path) -> Result<AnalysisResult, MasterError> {
        let args: [&OsStr; 7] = [
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-af"),
            OsStr::new(ANALYSIS_FILTER),
            OsStr::new("-f"),
            OsStr::new("null"),
            OsStr::new("-"),
        ];
        let failed = |diagnostics: String| MasterError::AnalysisFailed {
            path: input.to_path_buf(),
            diagnostics,
        };
        let output = self
            .ffmpeg
            .run(args, |_| {})
            .await
            .map_err(|e| MasterError::from_ffmpeg("Analysis", e, failed))?;
        if !output.success() {
            return Err(failed(output.diagnostics));
        }
        Ok(AnalysisResult::parse(&output.diagnostics))
    }

    async fn master(&self, job: &Job, pass: Pass, duration: f64) -> Result<(), MasterError> {
        let chain = pass.filter_chain(&job.settings);
        let args = mastering_args(&job.input, &chain, self.bitrate, &job.output);
        info!("{} pass for {}: {}", pass, job.input.display(), chain);
        println!("🎛️  Mastering ({})...", pass);

        let show_progress = self.show_progress;
        let output = self
            .ffmpeg
            .run(&args, |chunk| {
                if show_progress {
                    report_progress(chunk, duration);
                }
            })
            .await;
        if show_progress {
            println!();
        }

        let output: FFmpegOutput = output
            .map_err(|e| MasterError::from_ffmpeg(pass.stage(), e, |msg| pass.failure(None, msg)))?;
        if !output.success() {
            debug!("ffmpeg diagnostics:\n{}", output.diagnostics);
            return Err(pass.failure(output.status.code(), output.diagnostics));
        }
        Ok(())
    }
}

/// Arguments for one mastering invocation.
pub fn mastering_args(input: &Path, chain: &str, bitrate: &str, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(14);
    args.push("-i".into());
    args.push(input.into());
    for arg in [
        "-af",
        chain,
        "-c:a",
        OUTPUT_CODEC,
        "-b:a",
        bitrate,
        "-ar",
        OUTPUT_SAMPLE_RATE,
        "-ac",
        OUTPUT_CHANNELS,
        "-y",
    ] {
        args.push(arg.into());
    }
    args.push(output.into());
    args
}

fn report_progress(chunk: &str, duration: f64) {
    let Some(position) = parse_progress(chunk) else {
        return;
    };
    if duration > 0.0 {
        let percent = (position / duration * 100.0).min(100.0);
        print!("\r⏳ Processing... {:.2} s / {:.2} s ({:.0}%)", position, duration, percent);
    } else {
        print!("\r⏳ Processing... {:.2} s", position);
    }
    let _ = io::stdout().flush();
}

fn format_level(level: Option<f64>) -> String {
    level
        .map(|db| format!("{:.2} dBFS", db))
        .unwrap_or_else(|| "n/a".to_string())
}

fn discard_partial_output(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => debug!("Removed partial output {}", output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", output.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_levels_skip_normal_mastering() {
        let analysis = AnalysisResult {
            duration: 10.0,
            peak_level: Some(0.0),
            rms_level: Some(0.0),
        };
        assert_eq!(
            Pass::for_analysis(&analysis),
            Pass::Simplified(FallbackReason::LevelsUndetected)
        );

        let analysis = AnalysisResult {
            duration: 10.0,
            peak_level: Some(-3.2),
            rms_level: Some(-12.1),
        };
        assert_eq!(Pass::for_analysis(&analysis), Pass::Normal);
    }

    #[test]
    fn only_the_normal_pass_has_a_fallback() {
        assert_eq!(
            Pass::Normal.fallback(),
            Some(Pass::Simplified(FallbackReason::MasteringFailed))
        );
        assert_eq!(Pass::Simplified(FallbackReason::MasteringFailed).fallback(), None);
        assert_eq!(Pass::Simplified(FallbackReason::LevelsUndetected).fallback(), None);
    }

    #[test]
    fn simplified_pass_ignores_settings() {
        let settings = Settings::default().with_equalizer(true, 6.0, 6.0, 6.0);
        assert_eq!(
            Pass::Simplified(FallbackReason::MasteringFailed).filter_chain(&settings),
            FALLBACK_CHAIN
        );
        assert_eq!(Pass::Normal.filter_chain(&settings), build_filter_chain(&settings));
    }

    #[test]
    fn derives_output_beside_input() {
        assert_eq!(
            mastered_path_beside(Path::new("/music/take 3.wav")),
            PathBuf::from("/music/take 3_mastered.wav")
        );
        assert_eq!(
            mastered_path_beside(Path::new("/music/demo")),
            PathBuf::from("/music/demo_mastered")
        );
    }

    #[test]
    fn mastering_args_fix_encoding() {
        let args = mastering_args(Path::new("in.wav"), "volume=4dB", "320k", Path::new("out.mp3"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-i", "in.wav", "-af", "volume=4dB", "-c:a", "libmp3lame", "-b:a", "320k", "-ar",
                "44100", "-ac", "2", "-y", "out.mp3"
            ]
        );
    }

    #[test]
    fn missing_input_is_rejected() {
        let err = Job::new("/definitely/not/here.wav", None, Settings::default()).unwrap_err();
        assert!(matches!(err, MasterError::MissingInputFile(_)));
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use crate::test_support::{FakeFfmpeg, touch};
        use std::time::Duration;
        use tempfile::TempDir;

        fn job(dir: &TempDir, name: &str) -> Job {
            let input = touch(dir.path(), name);
            Job::new(input, None, Settings::default()).unwrap()
        }

        #[tokio::test]
        async fn normal_pass_masters_file() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path());
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "song.wav");

            let report = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap();

            assert_eq!(report.pass, Pass::Normal);
            assert_eq!(report.analysis.peak_level, Some(-3.20));
            assert!(job.output.exists());
            let calls = fake.invocations();
            assert_eq!(calls.len(), 2);
            assert!(calls[1].contains("equalizer=f=1000"));
        }

        #[tokio::test]
        async fn undetected_levels_go_straight_to_simplified() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path());
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__silent__.wav");

            let report = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap();

            assert_eq!(report.pass, Pass::Simplified(FallbackReason::LevelsUndetected));
            let calls = fake.invocations();
            assert_eq!(calls.len(), 2);
            assert!(calls[1].contains(FALLBACK_CHAIN));
        }

        #[tokio::test]
        async fn failed_normal_pass_retries_simplified() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path());
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__fragile__.wav");

            let report = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap();

            assert_eq!(report.pass, Pass::Simplified(FallbackReason::MasteringFailed));
            assert_eq!(fake.invocations().len(), 3);
            assert!(job.output.exists());
        }

        #[tokio::test]
        async fn failing_both_passes_fails_the_job() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path());
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__fail__.wav");

            let err = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap_err();

            match err {
                MasterError::SimplifiedMasteringFailed { code, diagnostics } => {
                    assert_eq!(code, Some(1));
                    assert!(diagnostics.contains("Error while filtering"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(!job.output.exists());
        }

        #[tokio::test]
        async fn analysis_failure_surfaces_diagnostics() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path());
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__unreadable__.wav");

            let err = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap_err();

            assert!(matches!(
                &err,
                MasterError::AnalysisFailed { diagnostics, .. } if diagnostics.contains("Invalid data")
            ));
            assert_eq!(fake.invocations().len(), 1);
        }

        #[tokio::test]
        async fn timeout_is_not_retried() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path()).with_timeout(Some(Duration::from_millis(200)));
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__slow__.wav");

            let err = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap_err();

            assert!(matches!(err, MasterError::TimedOut { stage: "Analysis", .. }), "{err}");
            assert_eq!(fake.invocations().len(), 1);
        }

        #[tokio::test]
        async fn failed_analysis_leaves_existing_output_alone() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path());
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__unreadable__.wav");
            std::fs::write(&job.output, b"earlier run").unwrap();

            let err = Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap_err();

            assert!(matches!(err, MasterError::AnalysisFailed { .. }), "{err}");
            assert_eq!(std::fs::read(&job.output).unwrap(), b"earlier run");
        }

        #[tokio::test]
        async fn analysis_timeout_leaves_existing_output_alone() {
            let fake = FakeFfmpeg::install();
            let ffmpeg = FFmpeg::new(fake.path()).with_timeout(Some(Duration::from_millis(200)));
            let dir = TempDir::new().unwrap();
            let job = job(&dir, "__slow__.wav");
            std::fs::write(&job.output, b"earlier run").unwrap();

            Mastering::new(&ffmpeg, DEFAULT_BITRATE).run(&job).await.unwrap_err();

            assert_eq!(std::fs::read(&job.output).unwrap(), b"earlier run");
        }
    }
}
