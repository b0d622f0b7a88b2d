use crate::settings::{Compressor, Equalizer, Limiter, Normalize, Settings, StereoEnhancer};
use std::fmt;

/// Named shortcuts to a full settings bundle. Every preset leans on the
/// compressor and equalizer for loudness and leaves normalization off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Pop,
    Rock,
    Classical,
    Loudness,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Pop, Preset::Rock, Preset::Classical, Preset::Loudness];

    /// Case-insensitive lookup. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Preset> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Pop => "pop",
            Preset::Rock => "rock",
            Preset::Classical => "classical",
            Preset::Loudness => "loudness",
        }
    }

    pub fn settings(self) -> Settings {
        match self {
            Preset::Pop => Settings {
                normalize: Normalize {
                    enabled: false,
                    level: -16.0,
                },
                compressor: Compressor {
                    enabled: true,
                    threshold: -10.0,
                    ratio: 4.0,
                    attack: 2.0,
                    release: 100.0,
                },
                equalizer: Equalizer {
                    enabled: true,
                    low_gain: 1.0,
                    mid_gain: 1.0,
                    high_gain: 2.0,
                },
                limiter: Limiter {
                    enabled: true,
                    ceiling: -0.1,
                    release: 5.0,
                },
                stereo_enhancer: StereoEnhancer {
                    enabled: false,
                    width: 1.1,
                },
            },
            Preset::Rock => Settings {
                normalize: Normalize {
                    enabled: false,
                    level: -14.0,
                },
                compressor: Compressor {
                    enabled: true,
                    threshold: -8.0,
                    ratio: 6.0,
                    attack: 1.0,
                    release: 80.0,
                },
                equalizer: Equalizer {
                    enabled: true,
                    low_gain: 3.0,
                    mid_gain: 2.0,
                    high_gain: 4.0,
                },
                limiter: Limiter {
                    enabled: true,
                    ceiling: -0.1,
                    release: 3.0,
                },
                stereo_enhancer: StereoEnhancer {
                    enabled: false,
                    width: 1.3,
                },
            },
            Preset::Classical => Settings {
                normalize: Normalize {
                    enabled: false,
                    level: -23.0,
                },
                compressor: Compressor {
                    enabled: true,
                    threshold: -15.0,
                    ratio: 3.0,
                    attack: 5.0,
                    release: 150.0,
                },
                equalizer: Equalizer {
                    enabled: true,
                    low_gain: 0.0,
                    mid_gain: 0.0,
                    high_gain: 1.0,
                },
                limiter: Limiter {
                    enabled: true,
                    ceiling: -0.5,
                    release: 10.0,
                },
                stereo_enhancer: StereoEnhancer {
                    enabled: false,
                    width: 1.0,
                },
            },
            Preset::Loudness => Settings {
                normalize: Normalize {
                    enabled: false,
                    level: -12.0,
                },
                compressor: Compressor {
                    enabled: true,
                    threshold: -6.0,
                    ratio: 8.0,
                    attack: 0.5,
                    release: 30.0,
                },
                equalizer: Equalizer {
                    enabled: true,
                    low_gain: 2.0,
                    mid_gain: 3.0,
                    high_gain: 3.0,
                },
                limiter: Limiter {
                    enabled: true,
                    ceiling: -0.05,
                    release: 2.0,
                },
                stereo_enhancer: StereoEnhancer {
                    enabled: false,
                    width: 1.0,
                },
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings for an optional preset name. Unrecognized names fall back to the
/// defaults; the caller decides whether to warn.
pub fn settings_for(name: Option<&str>) -> Settings {
    name.and_then(Preset::from_name)
        .map(Preset::settings)
        .unwrap_or_default()
}
