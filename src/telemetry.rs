//! Telemetry record codec
//!
//! The capture rigs emit CSV: a fixed number of header rows, then one record
//! per line with a handful of metadata fields (timestamps, device tags) ahead
//! of the six sensor fields `ax,ay,az,gx,gy,gz`. Commas inside metadata are
//! backslash-escaped. This module decodes record lines into [`SensorRecord`]s
//! and builds the annotated output lines.
//!
//! Malformed fields are typed errors, never a silent zero: a record that does
//! not decode is marked in the output and kept away from the detector.

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::types::{SensorRecord, StepKind};

/// Number of sensor fields per record, in `ax,ay,az,gx,gy,gz` order.
pub const SENSOR_FIELDS: usize = 6;

/// Columns appended to the column-name header row.
pub const HEADER_SUFFIX: &str = "NUM_STEP,STEP_TYPE";

/// Marker written in place of a step code for a record that failed to decode.
pub const INVALID_MARKER: &str = "NA";

/// Shape of the telemetry CSV.
///
/// `Default` matches the reference capture format: two header rows (a device
/// preamble and the column names) and four metadata fields ahead of the
/// sensor fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFormat {
    /// Header rows before the first record.
    pub header_rows: usize,
    /// Metadata fields ahead of the six sensor fields on each record line.
    pub leading_fields: usize,
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self {
            header_rows: 2,
            leading_fields: 4,
        }
    }
}

impl RecordFormat {
    /// Decodes one record line into a sensor record.
    ///
    /// Requires exactly `leading_fields + 6` fields. Field errors carry the
    /// zero-based column index within the line.
    pub fn parse_record(&self, line: &str) -> Result<SensorRecord, ClassifyError> {
        let line = trim_line_ending(line);
        let fields = split_fields(line);
        let expected = self.leading_fields + SENSOR_FIELDS;
        if fields.len() != expected {
            return Err(ClassifyError::FieldCount {
                expected,
                found: fields.len(),
            });
        }

        let mut values = [0.0f64; SENSOR_FIELDS];
        for (offset, field) in fields[self.leading_fields..].iter().enumerate() {
            let index = self.leading_fields + offset;
            let text = field.trim();
            let value: f64 = text.parse().map_err(|_| ClassifyError::NonNumericField {
                index,
                text: text.to_string(),
            })?;
            if !value.is_finite() {
                return Err(ClassifyError::NonFiniteField { index });
            }
            values[offset] = value;
        }
        Ok(SensorRecord::from_array(values))
    }

    /// Echoes a header row, appending the annotation columns to the last one
    /// (the column-name row).
    pub fn annotated_header(&self, row: usize, line: &str) -> String {
        let line = trim_line_ending(line);
        if row + 1 == self.header_rows {
            format!("{},{}", line, HEADER_SUFFIX)
        } else {
            line.to_string()
        }
    }
}

/// Annotated output line for a classified record.
pub fn annotate_record(line: &str, num_steps: u64, kind: StepKind) -> String {
    format!("{},{},{}", trim_line_ending(line), num_steps, kind.code())
}

/// Annotated output line for a record that failed to decode.
pub fn annotate_invalid(line: &str, num_steps: u64) -> String {
    format!("{},{},{}", trim_line_ending(line), num_steps, INVALID_MARKER)
}

/// Splits on commas, honoring backslash escapes (`\,` does not delimit).
pub fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => {
                fields.push(&line[start..i]);
                start = i + 1;
            }
            _ => escaped = false,
        }
    }
    fields.push(&line[start..]);
    fields
}

fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(|c| c == '\r' || c == '\n')
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn line(sensor: &str) -> String {
        format!("10:42:07.193,wrist\\, left,3,ok,{}", sensor)
    }

    #[test]
    fn escaped_commas_do_not_delimit() {
        let fields = split_fields("a\\,b,c,d\\\\,e");
        assert_eq!(fields, vec!["a\\,b", "c", "d\\\\", "e"]);
    }

    #[test]
    fn parses_record_with_escaped_metadata() {
        let format = RecordFormat::default();
        let record = format
            .parse_record(&line("0.1,9.8,-0.3,1.0,2.0,-44.5"))
            .unwrap();
        assert_eq!(record.ay, 9.8);
        assert_eq!(record.gz, -44.5);
    }

    #[test]
    fn trims_carriage_return_and_field_whitespace() {
        let format = RecordFormat::default();
        let record = format
            .parse_record("a,b,c,d, 0.1 ,9.8,-0.3,1.0,2.0,-44.5\r\n")
            .unwrap();
        assert_eq!(record.ax, 0.1);
        assert_eq!(record.gz, -44.5);
    }

    #[test]
    fn wrong_field_count_is_an_error() {
        let format = RecordFormat::default();
        match format.parse_record("a,b,c,0.1,9.8,-0.3,1.0,2.0,-44.5") {
            Err(ClassifyError::FieldCount { expected, found }) => {
                assert_eq!(expected, 10);
                assert_eq!(found, 9);
            }
            other => panic!("expected FieldCount, got {:?}", other),
        }
    }

    #[test]
    fn garbage_field_is_an_error_not_zero() {
        let format = RecordFormat::default();
        match format.parse_record(&line("0.1,bogus,-0.3,1.0,2.0,-44.5")) {
            Err(ClassifyError::NonNumericField { index, text }) => {
                assert_eq!(index, 5);
                assert_eq!(text, "bogus");
            }
            other => panic!("expected NonNumericField, got {:?}", other),
        }
    }

    #[test]
    fn non_finite_field_is_rejected() {
        let format = RecordFormat::default();
        assert!(matches!(
            format.parse_record(&line("0.1,nan,-0.3,1.0,2.0,-44.5")),
            Err(ClassifyError::NonFiniteField { index: 5 })
        ));
        assert!(matches!(
            format.parse_record(&line("0.1,9.8,-0.3,inf,2.0,-44.5")),
            Err(ClassifyError::NonFiniteField { index: 7 })
        ));
    }

    #[test]
    fn header_suffix_lands_on_column_row() {
        let format = RecordFormat::default();
        assert_eq!(
            format.annotated_header(0, "device=rig-4 fw=1.0.2\r"),
            "device=rig-4 fw=1.0.2"
        );
        assert_eq!(
            format.annotated_header(1, "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ"),
            "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ,NUM_STEP,STEP_TYPE"
        );
    }

    #[test]
    fn annotation_appends_count_and_code() {
        assert_eq!(
            annotate_record("a,b,c,d,0,8,0,0,0,0\r", 2, StepKind::Walk),
            "a,b,c,d,0,8,0,0,0,0,2,3"
        );
        assert_eq!(
            annotate_record("a,b,c,d,0,8,0,0,0,0", 2, StepKind::None),
            "a,b,c,d,0,8,0,0,0,0,2,0"
        );
        assert_eq!(annotate_invalid("a,b,junk", 2), "a,b,junk,2,NA");
    }
}
