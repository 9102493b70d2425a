//! Step detection state machine
//!
//! The detector watches the vertical-accel channel for a sharp jump between
//! consecutive records, accumulates the peak that follows, and classifies the
//! window once the signal has swung back down through zero (or a safety cap
//! closes it). One call per record, in arrival order; a step is reported on
//! the record that closes its window, never earlier.

use serde::{Deserialize, Serialize};

use crate::classifier::{classify, PeakProfile};
use crate::error::ClassifyError;
use crate::history::{Channel, HistoryBuffer};
use crate::types::{SensorRecord, StepKind};

/// Tuning knobs for the detector.
///
/// `Default` carries the values the heuristic was tuned with on-device.
/// Override individual fields to experiment without recompiling; construction
/// validates the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Records of history retained per channel.
    pub history_len: usize,
    /// Vertical-accel jump (m/s^2) between consecutive records that opens a
    /// peak window.
    pub onset_delta: f64,
    /// Records a peak window may accumulate before it is force-closed.
    pub max_peak_records: usize,
    /// Below this vertical-accel amplitude a window is not a step.
    pub walk_ay_floor: f64,
    /// At or above this vertical-accel amplitude a window is a run or a hop.
    pub run_ay_floor: f64,
    /// Above this yaw-rate amplitude a run-strength window becomes a hop.
    pub hop_gz_floor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            history_len: 300,
            onset_delta: 3.0,
            max_peak_records: 30,
            walk_ay_floor: 5.0,
            run_ay_floor: 14.0,
            hop_gz_floor: 20.0 / 4.5,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ClassifyError> {
        if self.history_len < 2 {
            return Err(ClassifyError::InvalidConfig(
                "history_len must be at least 2 (onset compares consecutive records)".to_string(),
            ));
        }
        if self.max_peak_records == 0 {
            return Err(ClassifyError::InvalidConfig(
                "max_peak_records must be at least 1".to_string(),
            ));
        }
        if !self.onset_delta.is_finite() || self.onset_delta <= 0.0 {
            return Err(ClassifyError::InvalidConfig(
                "onset_delta must be finite and positive".to_string(),
            ));
        }
        for (name, value) in [
            ("walk_ay_floor", self.walk_ay_floor),
            ("run_ay_floor", self.run_ay_floor),
            ("hop_gz_floor", self.hop_gz_floor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ClassifyError::InvalidConfig(format!(
                    "{} must be finite and non-negative",
                    name
                )));
            }
        }
        if self.walk_ay_floor > self.run_ay_floor {
            return Err(ClassifyError::InvalidConfig(
                "walk_ay_floor must not exceed run_ay_floor".to_string(),
            ));
        }
        Ok(())
    }
}

/// Detector phase. These two variants are the only states that exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Normal,
    PeakActive,
}

/// Read-only view of detector internals, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorSnapshot {
    pub state: DetectorState,
    /// Total records fed since construction.
    pub records_seen: u64,
    /// Records currently retained in history.
    pub history_len: usize,
    /// Physical index of the newest history record.
    pub cursor: Option<usize>,
    /// Records accumulated by the open peak window, 0 outside a window.
    pub peak_records: usize,
}

/// Streaming step classifier over 6-axis inertial records.
///
/// Owns its history and configuration; dropping the detector releases
/// everything. A window still open when the caller stops feeding records is
/// discarded unless [`StepDetector::finalize`] is called first.
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: DetectorConfig,
    history: HistoryBuffer,
    state: DetectorState,
    peak_records: usize,
    records_seen: u64,
}

impl StepDetector {
    /// Detector with the reference tuning.
    pub fn new() -> Result<Self, ClassifyError> {
        Self::with_config(DetectorConfig::default())
    }

    /// Detector with explicit tuning; validates and pre-allocates history.
    pub fn with_config(config: DetectorConfig) -> Result<Self, ClassifyError> {
        config.validate()?;
        let history = HistoryBuffer::with_capacity(config.history_len)?;
        Ok(Self {
            config,
            history,
            state: DetectorState::Normal,
            peak_records: 0,
            records_seen: 0,
        })
    }

    /// Feeds one record and returns the classification it completes, if any.
    ///
    /// Returns `StepKind::None` for every record that does not close a peak
    /// window. Errors are structurally impossible under the one-call-per-
    /// record contract and indicate an internal invariant violation.
    pub fn next(&mut self, record: &SensorRecord) -> Result<StepKind, ClassifyError> {
        self.history.append(record.ax, record.ay, record.gz);
        self.records_seen += 1;

        match self.state {
            DetectorState::Normal => {
                if self.history.len() < 2 {
                    return Ok(StepKind::None);
                }
                let ay_now = self.history.at(Channel::VerticalAccel, 0)?;
                let ay_prev = self.history.at(Channel::VerticalAccel, 1)?;
                if (ay_now - ay_prev).abs() > self.config.onset_delta {
                    self.state = DetectorState::PeakActive;
                    self.peak_records = 1;
                }
                // The record that opens a window is never itself a step.
                Ok(StepKind::None)
            }
            DetectorState::PeakActive => {
                self.peak_records += 1;
                let ay_now = self.history.at(Channel::VerticalAccel, 0)?;
                let ay_prev = self.history.at(Channel::VerticalAccel, 1)?;
                let swung_negative = ay_now < ay_prev && ay_now < 0.0;
                if self.peak_records > self.config.max_peak_records || swung_negative {
                    return self.close_window();
                }
                Ok(StepKind::None)
            }
        }
    }

    /// Classifies an in-flight peak window at end of stream.
    ///
    /// Opt-in: the streaming contract never flushes implicitly. Returns the
    /// classification of the truncated window, or `None` when the detector is
    /// idle. The detector is back in its initial phase afterwards.
    pub fn finalize(&mut self) -> Result<Option<StepKind>, ClassifyError> {
        match self.state {
            DetectorState::Normal => Ok(None),
            DetectorState::PeakActive => self.close_window().map(Some),
        }
    }

    fn close_window(&mut self) -> Result<StepKind, ClassifyError> {
        let window = self.peak_records.min(self.history.len());
        self.state = DetectorState::Normal;
        self.peak_records = 0;
        let profile = PeakProfile::over_recent(&self.history, window)?;
        Ok(classify(&profile, &self.config))
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            state: self.state,
            records_seen: self.records_seen,
            history_len: self.history.len(),
            cursor: self.history.cursor(),
            peak_records: self.peak_records,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}
