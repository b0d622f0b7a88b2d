use crate::settings::Settings;

const GAIN_BOOST: &str = "volume=4dB";
const LIMITER: &str = "alimiter=level_in=1:level_out=0.95:limit=-0.1dB:attack=1:release=5";

/// Chain used when the configured stages add nothing beyond gain and limiter,
/// and for simplified mastering.
pub const FALLBACK_CHAIN: &str = "acompressor=threshold=-12dB:ratio=6:attack=1:release=50,\
                                  volume=6dB,\
                                  alimiter=level_in=1:level_out=0.95:limit=-0.1dB:attack=1:release=5";

/// Build the comma-joined `-af` filter chain for a settings bundle.
///
/// Equalizer bands with zero gain are skipped. If neither the equalizer nor the
/// compressor contributes a stage, the louder [`FALLBACK_CHAIN`] is returned so
/// every output gets at least that much level.
pub fn build_filter_chain(settings: &Settings) -> String {
    let mut filters: Vec<String> = Vec::new();

    let eq = &settings.equalizer;
    if eq.enabled {
        let bands = [
            (100, 50, eq.low_gain),
            (1000, 100, eq.mid_gain),
            (10000, 200, eq.high_gain),
        ];
        for (frequency, width, gain) in bands {
            if gain != 0.0 {
                filters.push(format!(
                    "equalizer=f={}:width_type=h:width={}:g={}",
                    frequency,
                    width,
                    gain.clamp(-20.0, 20.0)
                ));
            }
        }
    }

    let comp = &settings.compressor;
    if comp.enabled {
        filters.push(format!(
            "acompressor=threshold={}dB:ratio={}:attack={}:release={}",
            comp.threshold.clamp(-60.0, -1.0),
            comp.ratio.clamp(1.0, 20.0),
            comp.attack.clamp(0.01, 1000.0),
            comp.release.clamp(0.01, 9000.0)
        ));
    }

    filters.push(GAIN_BOOST.to_string());
    filters.push(LIMITER.to_string());

    if filters.len() <= 2 {
        return FALLBACK_CHAIN.to_string();
    }
    filters.join(",")
}
