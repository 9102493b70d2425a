//! Peak window classification
//!
//! When the detector closes a peak window it reduces the window to two
//! amplitudes and runs them through a small ordered decision table. The
//! classification is pure: same window, same answer, no state.

use crate::detector::DetectorConfig;
use crate::error::ClassifyError;
use crate::history::{Channel, HistoryBuffer};
use crate::types::StepKind;

/// Amplitude summary of one peak window.
///
/// Each peak is the magnitude of the largest excursion in either direction:
/// `max(|max|, |min|)` over the window. Lateral acceleration is retained in
/// history but not consulted by the current rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakProfile {
    /// Vertical-accel amplitude (m/s^2)
    pub ay_peak: f64,
    /// Yaw-rate amplitude (deg/s)
    pub gz_peak: f64,
}

impl PeakProfile {
    /// Profiles the `window` most recent records in `history`.
    ///
    /// Callers clamp `window` to the retained count; asking for more than is
    /// retained is an error, not a partial answer.
    pub fn over_recent(history: &HistoryBuffer, window: usize) -> Result<Self, ClassifyError> {
        if window == 0 {
            return Ok(Self {
                ay_peak: 0.0,
                gz_peak: 0.0,
            });
        }
        let mut ay_max = f64::NEG_INFINITY;
        let mut ay_min = f64::INFINITY;
        let mut gz_max = f64::NEG_INFINITY;
        let mut gz_min = f64::INFINITY;
        for displacement in 0..window {
            let ay = history.at(Channel::VerticalAccel, displacement)?;
            let gz = history.at(Channel::YawRate, displacement)?;
            ay_max = ay_max.max(ay);
            ay_min = ay_min.min(ay);
            gz_max = gz_max.max(gz);
            gz_min = gz_min.min(gz);
        }
        Ok(Self {
            ay_peak: ay_max.abs().max(ay_min.abs()),
            gz_peak: gz_max.abs().max(gz_min.abs()),
        })
    }
}

/// Ordered decision table over the window amplitudes; the first matching rule
/// wins.
///
/// 1. Vertical amplitude below the walk floor: not a step.
/// 2. Below the run floor: a walk.
/// 3. Run-strength impact with yaw amplitude strictly above the hop floor:
///    a hop (rotation mid-flight is what separates a hop from a run).
/// 4. Otherwise: a run. A yaw amplitude exactly at the floor is a run.
pub fn classify(profile: &PeakProfile, config: &DetectorConfig) -> StepKind {
    if profile.ay_peak < config.walk_ay_floor {
        return StepKind::None;
    }
    if profile.ay_peak < config.run_ay_floor {
        return StepKind::Walk;
    }
    if profile.gz_peak > config.hop_gz_floor {
        return StepKind::Hop;
    }
    StepKind::Run
}
