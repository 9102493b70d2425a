//! FFI bindings for Stepsense
//!
//! This module provides C-compatible functions for calling Stepsense from other
//! languages. Strings are null-terminated C strings; functions that return
//! allocated memory document it, and that memory must be freed with
//! `stepsense_free_string`. Detector handles carry no synchronization: callers
//! sharing one across threads must lock around it.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::detector::{DetectorConfig, StepDetector};
use crate::pipeline::TelemetryAnnotator;
use crate::telemetry::RecordFormat;
use crate::types::SensorRecord;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Annotate a whole telemetry CSV document in one call.
///
/// Every record line gains the running step count and step code; the
/// column-name header row gains the annotation column names. Record lines
/// that fail to decode are re-emitted with the `NA` marker. Negative
/// `header_rows` or `leading_fields` select the reference format (2 and 4).
///
/// # Safety
/// - `input` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with
///   `stepsense_free_string`.
/// - Returns NULL on error; call `stepsense_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn stepsense_annotate_csv(
    input: *const c_char,
    header_rows: i32,
    leading_fields: i32,
) -> *mut c_char {
    clear_last_error();

    let text = match cstr_to_string(input) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    let defaults = RecordFormat::default();
    let format = RecordFormat {
        header_rows: if header_rows < 0 {
            defaults.header_rows
        } else {
            header_rows as usize
        },
        leading_fields: if leading_fields < 0 {
            defaults.leading_fields
        } else {
            leading_fields as usize
        },
    };

    let mut annotator = match TelemetryAnnotator::with_options(format, DetectorConfig::default()) {
        Ok(a) => a,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let mut output = Vec::new();
    for line in text.split('\n') {
        match annotator.process_line(line) {
            Ok(Some(outcome)) => output.push(outcome.text().to_string()),
            Ok(None) => {}
            Err(_) => output.push(annotator.mark_invalid(line)),
        }
    }

    let mut joined = output.join("\n");
    if !joined.is_empty() {
        joined.push('\n');
    }
    string_to_cstr(&joined)
}

// ============================================================================
// Stateful Detector API
// ============================================================================

/// Opaque handle to a StepDetector
pub struct StepDetectorHandle {
    detector: StepDetector,
}

/// Create a new StepDetector with the specified history length.
///
/// # Safety
/// - Returns a pointer to a newly allocated StepDetector.
/// - Must be freed with `stepsense_detector_free`.
/// - `history_len <= 0` selects the default (300).
/// - Returns NULL on error; call `stepsense_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn stepsense_detector_new(history_len: i32) -> *mut StepDetectorHandle {
    clear_last_error();

    let mut config = DetectorConfig::default();
    if history_len > 0 {
        config.history_len = history_len as usize;
    }

    match StepDetector::with_config(config) {
        Ok(detector) => Box::into_raw(Box::new(StepDetectorHandle { detector })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a StepDetector.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `stepsense_detector_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stepsense_detector_free(detector: *mut StepDetectorHandle) {
    if !detector.is_null() {
        drop(Box::from_raw(detector));
    }
}

/// Feed one 6-axis record and get the step code it completes.
///
/// Returns the step code (0 = NONE, 1 = HOP, 2 = RUN, 3 = WALK) or -1 on
/// error. A record that does not close a peak window returns 0.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `stepsense_detector_new`.
/// - On error, call `stepsense_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stepsense_detector_next(
    detector: *mut StepDetectorHandle,
    ax: f64,
    ay: f64,
    az: f64,
    gx: f64,
    gy: f64,
    gz: f64,
) -> i32 {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return -1;
    }

    let handle = &mut *detector;
    let record = SensorRecord {
        ax,
        ay,
        az,
        gx,
        gy,
        gz,
    };
    if let Err(e) = record.ensure_finite() {
        set_last_error(&e.to_string());
        return -1;
    }

    match handle.detector.next(&record) {
        Ok(kind) => kind.code(),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Flush a trailing peak window at end of stream.
///
/// Returns the step code of the flushed window, 0 when the detector was idle
/// (or the window was not a step), -1 on error.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `stepsense_detector_new`.
/// - On error, call `stepsense_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stepsense_detector_finalize(detector: *mut StepDetectorHandle) -> i32 {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return -1;
    }

    let handle = &mut *detector;
    match handle.detector.finalize() {
        Ok(Some(kind)) => kind.code(),
        Ok(None) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Get a JSON snapshot of detector internals, for diagnostics.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `stepsense_detector_new`.
/// - Returns a newly allocated string that must be freed with
///   `stepsense_free_string`.
/// - Returns NULL on error; call `stepsense_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn stepsense_detector_describe(
    detector: *mut StepDetectorHandle,
) -> *mut c_char {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return ptr::null_mut();
    }

    let handle = &*detector;
    match serde_json::to_string(&handle.detector.snapshot()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stepsense functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stepsense function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stepsense_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stepsense call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stepsense_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the static label for a step code.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stepsense_step_name(code: i32) -> *const c_char {
    let name: &'static [u8] = match code {
        0 => b"NONE\0",
        1 => b"HOP\0",
        2 => b"RUN\0",
        3 => b"WALK\0",
        _ => b"UNKNOWN\0",
    };
    name.as_ptr() as *const c_char
}

/// Get the Stepsense library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stepsense_version() -> *const c_char {
    // Use a static CString to avoid allocation
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(detector: *mut StepDetectorHandle, ay: f64, gz: f64) -> i32 {
        unsafe { stepsense_detector_next(detector, 0.0, ay, 0.0, 0.0, 0.0, gz) }
    }

    #[test]
    fn test_ffi_detector_lifecycle() {
        unsafe {
            let detector = stepsense_detector_new(0);
            assert!(!detector.is_null());

            // Walk waveform: every record is NONE until the downswing record
            // closes the window.
            for ay in [0.0, 0.1, 8.0, 6.0, 3.0, 1.0] {
                assert_eq!(feed(detector, ay, 0.5), 0);
            }
            assert_eq!(feed(detector, -0.5, 0.5), 3);

            let describe = stepsense_detector_describe(detector);
            assert!(!describe.is_null());
            let json = CStr::from_ptr(describe).to_str().unwrap();
            assert!(json.contains("\"state\":\"normal\""));
            assert!(json.contains("\"records_seen\":7"));
            stepsense_free_string(describe);

            stepsense_detector_free(detector);
        }
    }

    #[test]
    fn test_ffi_finalize_flushes_window() {
        unsafe {
            let detector = stepsense_detector_new(64);
            for ay in [0.0, 0.1, 8.0, 6.0] {
                assert_eq!(feed(detector, ay, 0.0), 0);
            }
            assert_eq!(stepsense_detector_finalize(detector), 3);
            assert_eq!(stepsense_detector_finalize(detector), 0);
            stepsense_detector_free(detector);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            assert_eq!(
                stepsense_detector_next(ptr::null_mut(), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
                -1
            );
            let error = stepsense_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            // History of one record cannot support the onset comparison.
            let detector = stepsense_detector_new(1);
            assert!(detector.is_null());
            assert!(!stepsense_last_error().is_null());

            let detector = stepsense_detector_new(16);
            assert_eq!(feed(detector, f64::NAN, 0.0), -1);
            let error = CStr::from_ptr(stepsense_last_error()).to_str().unwrap();
            assert!(error.contains("not finite"));
            stepsense_detector_free(detector);
        }
    }

    #[test]
    fn test_ffi_annotate_csv() {
        unsafe {
            let input = CString::new(concat!(
                "device=rig-4\n",
                "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ\n",
                "t0,a,0,ok,0.0,0.0,0.0,0.0,0.0,0.5\n",
                "t1,a,1,ok,0.0,0.1,0.0,0.0,0.0,0.5\n",
                "t2,a,2,ok,0.0,8.0,0.0,0.0,0.0,0.5\n",
                "t3,a,3,ok,0.0,6.0,0.0,0.0,0.0,0.5\n",
                "t4,a,4,ok,0.0,bogus,0.0,0.0,0.0,0.5\n",
                "t5,a,5,ok,0.0,-0.5,0.0,0.0,0.0,0.5\n",
            ))
            .unwrap();

            let output = stepsense_annotate_csv(input.as_ptr(), -1, -1);
            assert!(!output.is_null());
            let text = CStr::from_ptr(output).to_str().unwrap();
            let lines: Vec<&str> = text.lines().collect();

            assert_eq!(lines[0], "device=rig-4");
            assert_eq!(lines[1], "TIME,TAG,SEQ,FLAG,AX,AY,AZ,GX,GY,GZ,NUM_STEP,STEP_TYPE");
            assert_eq!(lines[2], "t0,a,0,ok,0.0,0.0,0.0,0.0,0.0,0.5,0,0");
            assert_eq!(lines[6], "t4,a,4,ok,0.0,bogus,0.0,0.0,0.0,0.5,0,NA");
            assert_eq!(lines[7], "t5,a,5,ok,0.0,-0.5,0.0,0.0,0.0,0.5,1,3");

            stepsense_free_string(output);
        }
    }

    #[test]
    fn test_ffi_step_names_and_version() {
        unsafe {
            assert_eq!(CStr::from_ptr(stepsense_step_name(0)).to_str(), Ok("NONE"));
            assert_eq!(CStr::from_ptr(stepsense_step_name(1)).to_str(), Ok("HOP"));
            assert_eq!(CStr::from_ptr(stepsense_step_name(2)).to_str(), Ok("RUN"));
            assert_eq!(CStr::from_ptr(stepsense_step_name(3)).to_str(), Ok("WALK"));
            assert_eq!(
                CStr::from_ptr(stepsense_step_name(99)).to_str(),
                Ok("UNKNOWN")
            );

            let version = stepsense_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
