use regex::Regex;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"Duration: (\d{2}):(\d{2}):(\d{2}\.\d{2})"));
static PEAK_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"Max level: (-?\d+\.\d+) dBFS"));
static RMS_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"RMS level: (-?\d+\.\d+) dBFS"));
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"time=(\d{2}):(\d{2}):(\d{2}\.\d{2})"));

/// Compile one of the fixed patterns above. They are literals covered by the
/// tests below, so a failure here is a programming error.
fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid pattern {re:?}: {e}"))
}

/// Levels and length read from the analysis pass of the external tool.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalysisResult {
    /// Seconds, 0 when the tool reported no duration
    pub duration: f64,
    /// Peak level in dBFS, `None` when not reported
    pub peak_level: Option<f64>,
    /// RMS level in dBFS, `None` when not reported
    pub rms_level: Option<f64>,
}

impl AnalysisResult {
    /// Extract duration, peak and RMS from the tool's diagnostic text.
    /// Lines that do not match are ignored.
    pub fn parse(diagnostics: &str) -> Self {
        let duration = DURATION_RE
            .captures(diagnostics)
            .and_then(|caps| clock_to_seconds(&caps[1], &caps[2], &caps[3]))
            .unwrap_or(0.0);

        AnalysisResult {
            duration,
            peak_level: first_float(&PEAK_RE, diagnostics),
            rms_level: first_float(&RMS_RE, diagnostics),
        }
    }

    /// `|peak - rms|`, with an undetected level counted as 0 dBFS.
    pub fn dynamic_range(&self) -> f64 {
        (self.peak_level.unwrap_or(0.0) - self.rms_level.unwrap_or(0.0)).abs()
    }

    /// True when the levels give nothing to master against: peak and RMS are
    /// each either unreported or exactly 0 dBFS.
    pub fn levels_inconclusive(&self) -> bool {
        self.peak_level.unwrap_or(0.0) == 0.0 && self.rms_level.unwrap_or(0.0) == 0.0
    }
}

/// Read the `time=HH:MM:SS.ss` position from a chunk of progress output.
pub fn parse_progress(chunk: &str) -> Option<f64> {
    let caps = PROGRESS_RE.captures_iter(chunk).last()?;
    clock_to_seconds(&caps[1], &caps[2], &caps[3])
}

fn clock_to_seconds(hours: &str, minutes: &str, seconds: &str) -> Option<f64> {
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

fn first_float(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}
