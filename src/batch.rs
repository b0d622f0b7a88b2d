use crate::error::MasterError;
use crate::ffmpeg::FFmpeg;
use crate::mastering::{Job, JobReport, Mastering};
use crate::settings::Settings;
use futures_util::stream::{self, StreamExt};
use std::{
    collections::HashMap,
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

pub const AUDIO_EXTENSIONS: [&str; 7] = ["wav", "mp3", "flac", "aac", "m4a", "ogg", "wma"];

/// Everything a batch run needs besides the binary itself.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub settings: Settings,
    pub bitrate: String,
    /// Upper bound on jobs in flight
    pub jobs: NonZeroUsize,
}

/// How one file fared.
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<JobReport, MasterError>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// In input order
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Audio files directly inside `dir`, sorted. A missing directory has none.
pub fn discover_audio_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_audio_extension(&path) {
            debug!("Discovered: {}", path.display());
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// `<output_dir>/<stem>_mastered.mp3`
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    output_dir.join(format!("{}_mastered.mp3", stem))
}

/// Output path for each of `files`, in order.
///
/// Inputs whose stems match ignoring case keep their extension in the name
/// (`song.flac` -> `song_flac_mastered.mp3`). An input whose name is still
/// taken by an earlier one gets an `OutputCollision` instead.
pub fn plan_outputs(files: &[PathBuf], output_dir: &Path) -> Vec<Result<PathBuf, MasterError>> {
    let stem_key = |input: &PathBuf| {
        input
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase()
    };
    let mut stems: HashMap<String, usize> = HashMap::new();
    for input in files {
        *stems.entry(stem_key(input)).or_default() += 1;
    }

    let mut claimed: HashMap<String, &PathBuf> = HashMap::new();
    files
        .iter()
        .map(|input| {
            let output = if stems[&stem_key(input)] > 1 {
                let stem = input.file_stem().unwrap_or_default().to_string_lossy();
                let ext = input.extension().unwrap_or_default().to_string_lossy();
                output_dir.join(format!("{}_{}_mastered.mp3", stem, ext))
            } else {
                output_path_for(input, output_dir)
            };
            let key = output.to_string_lossy().to_lowercase();
            match claimed.get(&key) {
                Some(earlier) => Err(MasterError::OutputCollision {
                    output,
                    other: (*earlier).clone(),
                }),
                None => {
                    claimed.insert(key, input);
                    Ok(output)
                }
            }
        })
        .collect()
}

/// Create `dir` if it does not exist yet.
pub fn ensure_directory(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        println!("📁 Created directory: {}", dir.display());
    }
    Ok(())
}

/// Master every file in `files`. A failing file is logged and counted; the
/// rest of the batch carries on.
pub async fn run_batch(
    request: &BatchRequest,
    files: &[PathBuf],
    ffmpeg: &FFmpeg,
) -> io::Result<BatchSummary> {
    ensure_directory(&request.output_dir)?;

    let total = files.len();
    let mastering = Mastering::new(ffmpeg, &request.bitrate).with_progress(request.jobs.get() == 1);
    let mastering = &mastering;

    let outputs = plan_outputs(files, &request.output_dir);

    let planned = files.iter().zip(outputs).enumerate();
    let mut outcomes: Vec<(usize, FileOutcome)> = stream::iter(planned)
        .map(|(index, (input, output))| async move {
            println!(
                "\n🎯 Processing ({}/{}): {}",
                index + 1,
                total,
                display_name(input)
            );
            let job =
                output.and_then(|output| Job::new(input.clone(), Some(output), request.settings));
            let result = match job {
                Ok(job) => mastering.run(&job).await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(report) => println!("✅ Done: {}", display_name(&report.output)),
                Err(e) => error!("{} - {}", display_name(input), e),
            }
            (
                index,
                FileOutcome {
                    input: input.clone(),
                    result,
                },
            )
        })
        .buffer_unordered(request.jobs.get())
        .collect()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);

    let summary = BatchSummary {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    };
    info!(
        "Batch finished: {} succeeded, {} failed",
        summary.success_count(),
        summary.error_count()
    );
    Ok(summary)
}

/// Cap a requested job count at the number of available cores.
pub fn bounded_jobs(requested: usize) -> NonZeroUsize {
    let cores = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
    NonZeroUsize::new(requested.min(cores.get())).unwrap_or(NonZeroUsize::MIN)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
