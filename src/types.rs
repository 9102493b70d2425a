//! Core types for the Stepsense pipeline
//!
//! This module defines the data that flows through the classifier: raw 6-axis
//! inertial records on the way in, step classifications on the way out.

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

/// One 6-axis inertial sample.
///
/// Axis order is fixed: accelerometer x/y/z (m/s^2) followed by gyroscope
/// x/y/z (deg/s). The classifier consumes `ax`, `ay` and `gz`; the remaining
/// axes ride along so adapters can hand over whole samples without slicing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Lateral acceleration (m/s^2)
    pub ax: f64,
    /// Vertical acceleration (m/s^2)
    pub ay: f64,
    /// Forward acceleration (m/s^2)
    pub az: f64,
    /// Roll rate (deg/s)
    pub gx: f64,
    /// Pitch rate (deg/s)
    pub gy: f64,
    /// Yaw rate (deg/s)
    pub gz: f64,
}

impl SensorRecord {
    /// Builds a record from the canonical `[ax, ay, az, gx, gy, gz]` layout.
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            ax: values[0],
            ay: values[1],
            az: values[2],
            gx: values[3],
            gy: values[4],
            gz: values[5],
        }
    }

    /// Returns the record in the canonical `[ax, ay, az, gx, gy, gz]` layout.
    pub fn to_array(&self) -> [f64; 6] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
    }

    /// Rejects NaN and infinite axes.
    ///
    /// The error carries the index of the first offending field in the
    /// canonical layout.
    pub fn ensure_finite(&self) -> Result<(), ClassifyError> {
        for (index, value) in self.to_array().iter().enumerate() {
            if !value.is_finite() {
                return Err(ClassifyError::NonFiniteField { index });
            }
        }
        Ok(())
    }
}

/// Classification of one completed peak window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    None,
    Walk,
    Run,
    Hop,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::None => "NONE",
            StepKind::Walk => "WALK",
            StepKind::Run => "RUN",
            StepKind::Hop => "HOP",
        }
    }

    /// Wire code used by the annotated CSV column and the C ABI.
    ///
    /// The numbering is inherited from the original device firmware and is a
    /// compatibility contract: NONE=0, HOP=1, RUN=2, WALK=3.
    pub fn code(&self) -> i32 {
        match self {
            StepKind::None => 0,
            StepKind::Hop => 1,
            StepKind::Run => 2,
            StepKind::Walk => 3,
        }
    }

    /// Inverse of [`StepKind::code`]; unknown codes map to `None`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => StepKind::Hop,
            2 => StepKind::Run,
            3 => StepKind::Walk,
            _ => StepKind::None,
        }
    }

    /// True for every kind except `None`.
    pub fn is_step(&self) -> bool {
        !matches!(self, StepKind::None)
    }
}
