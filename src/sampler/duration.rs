use crate::media::{MediaSource, SeekOutcome};
use crate::sampler::SamplerConfig;

/// Seek target far beyond any plausible file length. The container clamps
/// the cursor to its real end, which usually surfaces a finite duration
/// on sources with unreliable metadata.
const FORCED_SEEK_TARGET_SECS: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationMethod {
    /// Read directly from container metadata.
    Metadata,
    /// Recovered by the forced-seek probe.
    SeekProbe,
    /// Estimated from file size at an assumed bitrate.
    ByteEstimate,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedDuration {
    pub seconds: f64,
    pub method: DurationMethod,
}

/// Determine a trustworthy total duration for a source. Never fails: each
/// step is attempted only if the previous one did not yield a finite
/// positive value, and the byte-size estimate always produces one.
///
/// The forced-seek probe moves the source's cursor; callers must reset
/// the position to 0 before sampling.
pub fn resolve_duration(source: &mut dyn MediaSource, config: &SamplerConfig) -> ResolvedDuration {
    if let Some(seconds) = usable(source.metadata_duration()) {
        return ResolvedDuration {
            seconds,
            method: DurationMethod::Metadata,
        };
    }

    tracing::warn!("Container metadata has no usable duration, probing with a forced seek");
    match source.seek(FORCED_SEEK_TARGET_SECS, config.probe_timeout) {
        Ok(SeekOutcome::TimedOut) => {
            tracing::warn!("Forced-seek probe timed out, continuing with best available state")
        }
        Ok(SeekOutcome::Completed) => {}
        Err(e) => tracing::warn!("Forced-seek probe failed: {e:#}"),
    }

    // Some sources only report a duration after being driven to the end;
    // otherwise the clamped cursor position itself is the answer.
    if let Some(seconds) = usable(source.metadata_duration()).or(usable(Some(source.position()))) {
        return ResolvedDuration {
            seconds,
            method: DurationMethod::SeekProbe,
        };
    }

    let estimate = (source.byte_size() as f64 / config.assumed_bytes_per_sec)
        .max(config.duration_floor_secs);
    tracing::warn!(
        "Could not determine video duration, estimated from file size: {estimate:.1}s"
    );
    ResolvedDuration {
        seconds: estimate,
        method: DurationMethod::ByteEstimate,
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::mock::MockSource;

    #[test]
    fn metadata_duration_wins_when_finite() {
        let mut source = MockSource::new(Some(42.5), 42.5);
        let resolved = resolve_duration(&mut source, &SamplerConfig::default());
        assert_eq!(resolved.seconds, 42.5);
        assert_eq!(resolved.method, DurationMethod::Metadata);
        assert!(source.seeks.is_empty(), "no probe expected");
    }

    #[test]
    fn non_finite_metadata_falls_back_to_probe() {
        let mut source = MockSource::new(Some(f64::INFINITY), 30.0);
        let resolved = resolve_duration(&mut source, &SamplerConfig::default());
        assert_eq!(resolved.seconds, 30.0);
        assert_eq!(resolved.method, DurationMethod::SeekProbe);
        assert_eq!(source.seeks.len(), 1);
        assert!(source.seeks[0] > 30.0, "probe target must overshoot the end");
    }

    #[test]
    fn probe_can_surface_late_metadata() {
        let mut source = MockSource::new(None, 0.0);
        source.metadata_after_probe = Some(61.0);
        let resolved = resolve_duration(&mut source, &SamplerConfig::default());
        assert_eq!(resolved.seconds, 61.0);
        assert_eq!(resolved.method, DurationMethod::SeekProbe);
    }

    #[test]
    fn byte_estimate_applies_when_probe_yields_nothing() {
        let mut source = MockSource::new(None, 0.0);
        source.bytes = 30 * 1024 * 1024;
        let resolved = resolve_duration(&mut source, &SamplerConfig::default());
        assert_eq!(resolved.method, DurationMethod::ByteEstimate);
        assert_eq!(resolved.seconds, 30.0);
    }

    #[test]
    fn byte_estimate_is_floored_for_tiny_files() {
        let mut source = MockSource::new(None, 0.0);
        source.bytes = 1024;
        let config = SamplerConfig::default();
        let resolved = resolve_duration(&mut source, &config);
        assert_eq!(resolved.method, DurationMethod::ByteEstimate);
        assert_eq!(resolved.seconds, config.duration_floor_secs);
    }

    #[test]
    fn resolver_always_returns_positive_duration() {
        let mut source = MockSource::new(Some(-3.0), 0.0);
        source.bytes = 0;
        let resolved = resolve_duration(&mut source, &SamplerConfig::default());
        assert!(resolved.seconds > 0.0);
    }
}
