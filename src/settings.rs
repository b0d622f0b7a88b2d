use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Normalize {
    pub enabled: bool,
    /// Target level in dB
    pub level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Compressor {
    pub enabled: bool,
    /// Threshold in dB
    pub threshold: f64,
    pub ratio: f64,
    /// Attack in milliseconds
    pub attack: f64,
    /// Release in milliseconds
    pub release: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Equalizer {
    pub enabled: bool,
    /// Gain around 100 Hz
    pub low_gain: f64,
    /// Gain around 1 kHz
    pub mid_gain: f64,
    /// Gain around 10 kHz
    pub high_gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Limiter {
    pub enabled: bool,
    pub ceiling: f64,
    pub release: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StereoEnhancer {
    pub enabled: bool,
    pub width: f64,
}

/// Full set of mastering parameters applied to one job.
///
/// A bundle is a plain value: the `with_*` setters consume it and hand back a
/// new one, so a bundle handed to a job never changes underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub normalize: Normalize,
    pub compressor: Compressor,
    pub equalizer: Equalizer,
    pub limiter: Limiter,
    pub stereo_enhancer: StereoEnhancer,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            normalize: Normalize {
                enabled: true,
                level: -1.0,
            },
            compressor: Compressor {
                enabled: true,
                threshold: -12.0,
                ratio: 4.0,
                attack: 5.0,
                release: 50.0,
            },
            equalizer: Equalizer {
                enabled: true,
                low_gain: 0.0,
                mid_gain: 1.0,
                high_gain: 2.0,
            },
            limiter: Limiter {
                enabled: true,
                ceiling: -0.1,
                release: 5.0,
            },
            stereo_enhancer: StereoEnhancer {
                enabled: true,
                width: 1.2,
            },
        }
    }
}

impl Settings {
    pub fn with_normalization(mut self, enabled: bool, level: f64) -> Self {
        self.normalize = Normalize { enabled, level };
        self
    }

    pub fn with_compressor(
        mut self,
        enabled: bool,
        threshold: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    ) -> Self {
        self.compressor = Compressor {
            enabled,
            threshold,
            ratio,
            attack,
            release,
        };
        self
    }

    pub fn with_equalizer(
        mut self,
        enabled: bool,
        low_gain: f64,
        mid_gain: f64,
        high_gain: f64,
    ) -> Self {
        self.equalizer = Equalizer {
            enabled,
            low_gain,
            mid_gain,
            high_gain,
        };
        self
    }

    pub fn with_limiter(mut self, enabled: bool, ceiling: f64, release: f64) -> Self {
        self.limiter = Limiter {
            enabled,
            ceiling,
            release,
        };
        self
    }

    pub fn with_stereo_enhancer(mut self, enabled: bool, width: f64) -> Self {
        self.stereo_enhancer = StereoEnhancer { enabled, width };
        self
    }

    /// Replace this bundle with the one stored at `path`. A missing file keeps
    /// the current bundle.
    pub fn load_or_keep(self, path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("Settings file {} not found, keeping current settings", path.display());
            return Ok(self);
        }
        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        println!("📂 Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write the bundle as pretty JSON. JSON has no NaN or infinity, so a
    /// bundle holding one is refused rather than written as `null`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(field) = self.non_finite_field() {
            bail!("Cannot save settings: {} is not a finite number", field);
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        println!("💾 Saved settings to {}", path.display());
        Ok(())
    }

    fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("normalize.level", self.normalize.level),
            ("compressor.threshold", self.compressor.threshold),
            ("compressor.ratio", self.compressor.ratio),
            ("compressor.attack", self.compressor.attack),
            ("compressor.release", self.compressor.release),
            ("equalizer.lowGain", self.equalizer.low_gain),
            ("equalizer.midGain", self.equalizer.mid_gain),
            ("equalizer.highGain", self.equalizer.high_gain),
            ("limiter.ceiling", self.limiter.ceiling),
            ("limiter.release", self.limiter.release),
            ("stereoEnhancer.width", self.stereo_enhancer.width),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(field, _)| field)
    }
}
