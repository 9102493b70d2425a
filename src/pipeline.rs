//! Stream annotation pipeline
//!
//! Wires the record codec to the detector over a line stream: header rows
//! pass through (the column row gains the annotation columns), each record
//! line is decoded, classified, and re-emitted with the running step count
//! and step code appended. Lines that fail to decode are the caller's call:
//! re-emit with the invalid marker via [`TelemetryAnnotator::mark_invalid`],
//! or abort.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::detector::{DetectorConfig, DetectorSnapshot, StepDetector};
use crate::error::ClassifyError;
use crate::telemetry::{annotate_invalid, annotate_record, RecordFormat};
use crate::types::StepKind;
use crate::{PRODUCER_NAME, STEPSENSE_VERSION};

/// What one input line produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Header row, echoed (annotated when it is the column row).
    Header(String),
    /// Record line with the annotation columns appended.
    Record { line: String, step: StepKind },
}

impl LineOutcome {
    /// The output line to write, whatever the outcome was.
    pub fn text(&self) -> &str {
        match self {
            LineOutcome::Header(line) => line,
            LineOutcome::Record { line, .. } => line,
        }
    }
}

/// Identity of the engine that produced a summary.
#[derive(Debug, Clone, Serialize)]
pub struct ProducerInfo {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// End-of-run report for one annotated stream.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotateSummary {
    pub producer: ProducerInfo,
    pub computed_at: DateTime<Utc>,
    /// Record lines that decoded and were classified.
    pub records: u64,
    /// Record lines re-emitted with the invalid marker.
    pub invalid_records: u64,
    /// Non-NONE classifications (the final NUM_STEP value).
    pub steps: u64,
    pub walks: u64,
    pub runs: u64,
    pub hops: u64,
    /// Classification of a trailing window flushed by `finalize`, if any.
    pub trailing: Option<StepKind>,
}

/// Stateful annotator for one telemetry stream.
pub struct TelemetryAnnotator {
    detector: StepDetector,
    format: RecordFormat,
    instance_id: String,
    headers_seen: usize,
    records: u64,
    invalid_records: u64,
    num_steps: u64,
    walks: u64,
    runs: u64,
    hops: u64,
    trailing: Option<StepKind>,
}

impl TelemetryAnnotator {
    /// Annotator over the reference format with the reference tuning.
    pub fn new() -> Result<Self, ClassifyError> {
        Self::with_options(RecordFormat::default(), DetectorConfig::default())
    }

    pub fn with_options(
        format: RecordFormat,
        config: DetectorConfig,
    ) -> Result<Self, ClassifyError> {
        let detector = StepDetector::with_config(config)?;
        Ok(Self {
            detector,
            format,
            instance_id: Uuid::new_v4().to_string(),
            headers_seen: 0,
            records: 0,
            invalid_records: 0,
            num_steps: 0,
            walks: 0,
            runs: 0,
            hops: 0,
            trailing: None,
        })
    }

    /// Processes one input line.
    ///
    /// Header rows and records come back as outcomes to write out; blank
    /// lines come back as `None`. A record that fails to decode returns the
    /// decode error and does not touch the detector.
    pub fn process_line(&mut self, raw: &str) -> Result<Option<LineOutcome>, ClassifyError> {
        if self.headers_seen < self.format.header_rows {
            let line = self.format.annotated_header(self.headers_seen, raw);
            self.headers_seen += 1;
            return Ok(Some(LineOutcome::Header(line)));
        }
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let record = self.format.parse_record(raw)?;
        let step = self.detector.next(&record)?;
        self.records += 1;
        if step.is_step() {
            self.num_steps += 1;
            self.tally(step);
        }
        Ok(Some(LineOutcome::Record {
            line: annotate_record(raw, self.num_steps, step),
            step,
        }))
    }

    /// Re-emits a line that failed to decode, marked and counted.
    pub fn mark_invalid(&mut self, raw: &str) -> String {
        self.invalid_records += 1;
        annotate_invalid(raw, self.num_steps)
    }

    /// Flushes a trailing peak window through the detector.
    ///
    /// A non-NONE result counts toward the step tallies exactly like a
    /// window closed by the stream itself.
    pub fn finalize(&mut self) -> Result<Option<StepKind>, ClassifyError> {
        let flushed = self.detector.finalize()?;
        if let Some(step) = flushed {
            if step.is_step() {
                self.num_steps += 1;
                self.tally(step);
            }
            self.trailing = Some(step);
        }
        Ok(flushed)
    }

    pub fn summary(&self) -> AnnotateSummary {
        AnnotateSummary {
            producer: ProducerInfo {
                name: PRODUCER_NAME.to_string(),
                version: STEPSENSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at: Utc::now(),
            records: self.records,
            invalid_records: self.invalid_records,
            steps: self.num_steps,
            walks: self.walks,
            runs: self.runs,
            hops: self.hops,
            trailing: self.trailing,
        }
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        self.detector.snapshot()
    }

    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    fn tally(&mut self, step: StepKind) {
        match step {
            StepKind::Walk => self.walks += 1,
            StepKind::Run => self.runs += 1,
            StepKind::Hop => self.hops += 1,
            StepKind::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record_line(seq: usize, ay: f64, gz: f64) -> String {
        format!("00:{:02},rig-4,{},ok,0.0,{},0.0,0.0,0.0,{}", seq, seq, ay, gz)
    }

    fn walk_stream() -> Vec<String> {
        let mut lines = vec![
            "device=rig-4 fw=1.0.2".to_string(),
            "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ".to_string(),
        ];
        for (seq, ay) in [0.0, 0.1, 8.0, 6.0, 3.0, 1.0, -0.5].iter().enumerate() {
            lines.push(record_line(seq, *ay, 0.5));
        }
        lines
    }

    #[test]
    fn annotates_headers_and_records() {
        let mut annotator = TelemetryAnnotator::new().unwrap();
        let mut output = Vec::new();
        for line in walk_stream() {
            if let Some(outcome) = annotator.process_line(&line).unwrap() {
                output.push(outcome.text().to_string());
            }
        }

        assert_eq!(output[0], "device=rig-4 fw=1.0.2");
        assert_eq!(
            output[1],
            "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ,NUM_STEP,STEP_TYPE"
        );
        // Six records before the window closes, all NONE with count 0.
        assert_eq!(output[2], "00:00,rig-4,0,ok,0.0,0,0.0,0.0,0.0,0.5,0,0");
        assert_eq!(output[7], "00:05,rig-4,5,ok,0.0,1,0.0,0.0,0.0,0.5,0,0");
        // The downswing record closes the window: count 1, walk code 3.
        assert_eq!(output[8], "00:06,rig-4,6,ok,0.0,-0.5,0.0,0.0,0.0,0.5,1,3");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut annotator = TelemetryAnnotator::new().unwrap();
        for line in walk_stream() {
            annotator.process_line(&line).unwrap();
        }
        assert_eq!(annotator.process_line("").unwrap(), None);
        assert_eq!(annotator.process_line("   \r").unwrap(), None);
        assert_eq!(annotator.summary().records, 7);
    }

    #[test]
    fn invalid_record_is_marked_and_kept_from_detector() {
        let mut annotator = TelemetryAnnotator::new().unwrap();
        for line in walk_stream() {
            annotator.process_line(&line).unwrap();
        }
        let before = annotator.snapshot().records_seen;

        let bad = "00:07,rig-4,7,ok,0.0,oops,0.0,0.0,0.0,0.5";
        let err = annotator.process_line(bad).unwrap_err();
        assert!(matches!(err, ClassifyError::NonNumericField { .. }));
        assert_eq!(annotator.snapshot().records_seen, before);

        let marked = annotator.mark_invalid(bad);
        assert_eq!(marked, "00:07,rig-4,7,ok,0.0,oops,0.0,0.0,0.0,0.5,1,NA");

        let summary = annotator.summary();
        assert_eq!(summary.records, 7);
        assert_eq!(summary.invalid_records, 1);
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.walks, 1);
    }

    #[test]
    fn finalize_counts_trailing_window() {
        let mut annotator = TelemetryAnnotator::new().unwrap();
        let mut lines = vec![
            "preamble".to_string(),
            "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ".to_string(),
        ];
        // Window opens on the jump and is still accumulating at end of input.
        for (seq, ay) in [0.0, 0.1, 8.0, 6.0].iter().enumerate() {
            lines.push(record_line(seq, *ay, 0.5));
        }
        for line in &lines {
            annotator.process_line(line).unwrap();
        }

        assert_eq!(annotator.summary().steps, 0);
        assert_eq!(annotator.finalize().unwrap(), Some(StepKind::Walk));
        let summary = annotator.summary();
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.walks, 1);
        assert_eq!(summary.trailing, Some(StepKind::Walk));
    }

    #[test]
    fn finalize_without_open_window_reports_nothing() {
        let mut annotator = TelemetryAnnotator::new().unwrap();
        for line in walk_stream() {
            annotator.process_line(&line).unwrap();
        }
        assert_eq!(annotator.finalize().unwrap(), None);
        assert_eq!(annotator.summary().trailing, None);
        assert_eq!(annotator.summary().steps, 1);
    }

    #[test]
    fn summary_carries_producer_identity() {
        let annotator = TelemetryAnnotator::new().unwrap();
        let summary = annotator.summary();
        assert_eq!(summary.producer.name, "stepsense");
        assert_eq!(summary.producer.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(summary.producer.instance_id.len(), 36);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"steps\":0"));
        assert!(json.contains("\"trailing\":null"));
    }

    #[test]
    fn custom_format_shifts_sensor_columns() {
        let format = RecordFormat {
            header_rows: 0,
            leading_fields: 1,
        };
        let mut annotator =
            TelemetryAnnotator::with_options(format, DetectorConfig::default()).unwrap();
        let outcome = annotator
            .process_line("tag,0.0,9.0,0.0,0.0,0.0,1.0")
            .unwrap()
            .unwrap();
        assert_eq!(outcome.text(), "tag,0.0,9.0,0.0,0.0,0.0,1.0,0,0");
        assert!(matches!(
            outcome,
            LineOutcome::Record {
                step: StepKind::None,
                ..
            }
        ));
    }
}
