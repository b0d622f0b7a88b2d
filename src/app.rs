use crate::{
    batch::{
        BatchRequest, BatchSummary, bounded_jobs, discover_audio_files, ensure_directory, run_batch,
    },
    cli::Args,
    ffmpeg::{FFmpeg, REQUIRED_ENCODER, check_ffmpeg_installation},
    preset::{self, Preset},
    settings::Settings,
};
use anyhow::{Result, bail};
use comfy_table::{Table, presets::UTF8_FULL};
use std::time::Duration;
use tracing::warn;

pub async fn run(args: Args) -> Result<()> {
    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let ffmpeg = FFmpeg::new(&args.ffmpeg)
        .with_timeout(timeout)
        .with_debug(args.debug);

    // Handle --check-ffmpeg command
    if args.check_ffmpeg {
        return handle_ffmpeg_check(&ffmpeg).await;
    }

    println!("🎵 Audio Mastering - Batch Processor\n");

    if !args.input_dir.exists() {
        println!("⚠️ Input directory does not exist: {}", args.input_dir.display());
        ensure_directory(&args.input_dir)?;
        println!(
            "ℹ️ Place audio files in {} and run again.",
            args.input_dir.display()
        );
        return Ok(());
    }

    let settings = resolve_settings(&args)?;
    if let Some(path) = &args.save_settings {
        settings.save(path)?;
    }

    let files = discover_audio_files(&args.input_dir)?;
    if files.is_empty() {
        println!("⚠️ No audio files found in {}", args.input_dir.display());
        return Ok(());
    }

    let request = BatchRequest {
        input_dir: args.input_dir.clone(),
        output_dir: args.output_dir.clone(),
        settings,
        bitrate: args.bitrate.clone(),
        jobs: bounded_jobs(args.jobs),
    };
    print_plan(&args, &request, &files);

    let summary = run_batch(&request, &files, &ffmpeg).await?;
    print_summary(&summary);
    Ok(())
}

/// Preset (or defaults), then the settings file on top if one was given.
fn resolve_settings(args: &Args) -> Result<Settings> {
    if let Some(name) = args.preset.as_deref() {
        if Preset::from_name(name).is_none() {
            let known: Vec<_> = Preset::ALL.iter().map(|p| p.name()).collect();
            warn!(
                "Unknown preset '{}'. Available: {}. Continuing with default settings.",
                name,
                known.join(", ")
            );
        }
    }
    let settings = preset::settings_for(args.preset.as_deref());
    match &args.settings {
        Some(path) => settings.load_or_keep(path),
        None => Ok(settings),
    }
}

fn print_plan(args: &Args, request: &BatchRequest, files: &[std::path::PathBuf]) {
    let preset_name = args
        .preset
        .as_deref()
        .and_then(Preset::from_name)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "default".to_string());

    let mut info_table = Table::new();
    info_table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Parameter", "Value"]);
    info_table
        .add_row(vec!["Input Directory", &request.input_dir.display().to_string()])
        .add_row(vec!["Output Directory", &request.output_dir.display().to_string()])
        .add_row(vec!["Preset", &preset_name])
        .add_row(vec!["Files", &files.len().to_string()])
        .add_row(vec!["Bitrate", &request.bitrate])
        .add_row(vec!["Parallel Jobs", &request.jobs.to_string()]);

    println!("▶️ Batch Details:");
    println!("{info_table}");
}

fn print_summary(summary: &BatchSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["File", "Result", "Pass", "Dynamic Range (dB)"]);

    for outcome in &summary.outcomes {
        let name = outcome
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &outcome.result {
            Ok(report) => table.add_row(vec![
                name,
                "✅ mastered".to_string(),
                report.pass.to_string(),
                format!("{:.2}", report.analysis.dynamic_range()),
            ]),
            Err(e) => table.add_row(vec![
                name,
                "❌ failed".to_string(),
                "-".to_string(),
                short_error(e),
            ]),
        };
    }

    println!("\n🎉 Batch complete!");
    println!("{table}");
    println!("✅ Succeeded: {} file(s)", summary.success_count());
    if summary.error_count() > 0 {
        println!("❌ Failed: {} file(s)", summary.error_count());
    }
}

/// First line of an error plus the last line of any attached diagnostics.
fn short_error(error: &impl std::fmt::Display) -> String {
    let text = error.to_string();
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next().unwrap_or_default();
    match lines.last() {
        Some(last) => format!("{} … {}", first, last),
        None => first.to_string(),
    }
}

async fn handle_ffmpeg_check(ffmpeg: &FFmpeg) -> Result<()> {
    println!("🔍 Checking FFmpeg installation...\n");

    let check_result = check_ffmpeg_installation(ffmpeg).await;

    if check_result.ffmpeg_available {
        if let Some(version_info) = &check_result.ffmpeg_version {
            println!("✅ FFmpeg found:");
            println!(
                "   Version: {}.{}.{}",
                version_info.major, version_info.minor, version_info.patch
            );
        } else {
            println!("⚠️  Could not parse FFmpeg version from output");
        }
    } else if let Some(error) = &check_result.error {
        println!("❌ FFmpeg not found at {}", ffmpeg.program().display());
        println!("   Please install FFmpeg and ensure it's accessible from the command line");
        bail!("FFmpeg is required but not installed: {}", error);
    } else {
        bail!("`{} -version` failed", ffmpeg.program().display());
    }

    println!();

    if check_result.missing_filters.is_empty() {
        println!("✅ Required filters are available");
    } else {
        for filter in &check_result.missing_filters {
            println!("❌ Required filter '{}' not found", filter);
        }
    }

    if check_result.encoder_available {
        println!("✅ Encoder '{}' is available", REQUIRED_ENCODER);
    } else {
        println!("❌ Encoder '{}' not found", REQUIRED_ENCODER);
        println!("   This encoder is needed to write the mastered MP3 files");
    }

    println!("\n🎉 FFmpeg check complete!");
    Ok(())
}
