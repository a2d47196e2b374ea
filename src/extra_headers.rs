use serde::{Deserialize, Serialize};
use serde_json::map::Map;
use serde_json::Value;
use std::fmt;

use crate::mseed_error::{MSResult, MSeedError};
use crate::nstime::NsTime;

pub const FDSN_EXTRA_HEADERS: &str = "FDSN";

/// Default array path for event detections.
pub const DETECTION_PATH: &str = "/FDSN/Event/Detection";
/// Default array path for calibrations.
pub const CALIBRATION_PATH: &str = "/FDSN/Calibration/Sequence";
/// Default array path for timing exceptions.
pub const TIMING_EXCEPTION_PATH: &str = "/FDSN/Time/Exception";
/// Default array path for mass recenters.
pub const RECENTER_PATH: &str = "/FDSN/Recenter/Sequence";

/// The JSON extra-header payload of a record. The raw text is kept until
/// something needs the parsed container; serialization re-encodes the
/// container compactly.
#[derive(Debug, Clone)]
pub struct ExtraHeaders {
    raw: Option<String>,
    root: Map<String, Value>,
}

impl ExtraHeaders {
    pub fn new() -> ExtraHeaders {
        ExtraHeaders {
            raw: None,
            root: Map::new(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.raw.is_none()
    }

    /// Parses the retained raw text, if any. The payload must be a single
    /// anonymous JSON object.
    pub fn parse(&mut self) -> MSResult<()> {
        let raw_opt = self.raw.take();
        match raw_opt {
            Some(s) if !s.trim().is_empty() => {
                let v: Value = serde_json::from_str(&s)?;
                match v {
                    Value::Object(map) => {
                        self.root = map;
                        Ok(())
                    }
                    _ => Err(MSeedError::ExtraHeaderNotObject(v)),
                }
            }
            _ => Ok(()),
        }
    }

    /// The compact JSON text. An empty object renders as the empty string
    /// so that an untouched record carries no extra-header bytes.
    pub fn to_json_string(&self) -> String {
        match &self.raw {
            Some(s) => s.clone(),
            None => {
                if self.root.is_empty() {
                    String::new()
                } else {
                    Value::Object(self.root.clone()).to_string()
                }
            }
        }
    }

    /// Number at the pointer path; integers coerce to float.
    pub fn get_number(&mut self, pointer: &str) -> MSResult<Option<f64>> {
        self.parse()?;
        match lookup(&self.root, pointer) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| wrong_type(pointer, "number", v)),
        }
    }

    /// Integer at the pointer path.
    pub fn get_int(&mut self, pointer: &str) -> MSResult<Option<i64>> {
        self.parse()?;
        match lookup(&self.root, pointer) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| wrong_type(pointer, "integer", v)),
        }
    }

    /// String at the pointer path.
    pub fn get_string(&mut self, pointer: &str) -> MSResult<Option<String>> {
        self.parse()?;
        match lookup(&self.root, pointer) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| wrong_type(pointer, "string", v)),
        }
    }

    /// Boolean at the pointer path.
    pub fn get_bool(&mut self, pointer: &str) -> MSResult<Option<bool>> {
        self.parse()?;
        match lookup(&self.root, pointer) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| wrong_type(pointer, "boolean", v)),
        }
    }

    /// Sets the value at a pointer path, creating intermediate objects and
    /// replacing any existing leaf regardless of its type.
    pub fn set<V: Into<Value>>(&mut self, pointer: &str, value: V) -> MSResult<()> {
        self.parse()?;
        let slot = self.slot_mut(pointer)?;
        *slot = value.into();
        Ok(())
    }

    /// Appends a value to the array at a pointer path, creating the array
    /// (and intermediate objects) as needed.
    pub fn append<V: Into<Value>>(&mut self, pointer: &str, value: V) -> MSResult<()> {
        self.parse()?;
        let slot = self.slot_mut(pointer)?;
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        slot.as_array_mut().unwrap().push(value.into());
        Ok(())
    }

    /// Appends an event detection to the array at `path`, or the standard
    /// detection path when `None`.
    pub fn add_event_detection(
        &mut self,
        detection: &EventDetection,
        path: Option<&str>,
    ) -> MSResult<()> {
        self.append(path.unwrap_or(DETECTION_PATH), serde_json::to_value(detection)?)
    }

    /// Appends a calibration to the array at `path`, or the standard
    /// calibration path when `None`.
    pub fn add_calibration(&mut self, calibration: &Calibration, path: Option<&str>) -> MSResult<()> {
        self.append(
            path.unwrap_or(CALIBRATION_PATH),
            serde_json::to_value(calibration)?,
        )
    }

    /// Appends a timing exception to the array at `path`, or the standard
    /// exception path when `None`.
    pub fn add_timing_exception(
        &mut self,
        exception: &TimingException,
        path: Option<&str>,
    ) -> MSResult<()> {
        self.append(
            path.unwrap_or(TIMING_EXCEPTION_PATH),
            serde_json::to_value(exception)?,
        )
    }

    /// Appends a mass recenter to the array at `path`, or the standard
    /// recenter path when `None`.
    pub fn add_recenter(&mut self, recenter: &Recenter, path: Option<&str>) -> MSResult<()> {
        self.append(path.unwrap_or(RECENTER_PATH), serde_json::to_value(recenter)?)
    }

    /// Make sure that if FDSN is present, its value is an object.
    pub fn validate(&mut self) -> MSResult<()> {
        self.parse()?;
        match self.root.get(FDSN_EXTRA_HEADERS) {
            Some(fdsn) if !fdsn.is_object() => Err(MSeedError::ExtraHeader(String::from(
                "value for key=FDSN is not an object",
            ))),
            _ => Ok(()),
        }
    }

    fn slot_mut(&mut self, pointer: &str) -> MSResult<&mut Value> {
        let tokens: Vec<String> = pointer_tokens(pointer)?;
        if tokens.is_empty() {
            return Err(MSeedError::ExtraHeader(String::from(
                "empty pointer has no slot",
            )));
        }
        let mut map = &mut self.root;
        for token in &tokens[..tokens.len() - 1] {
            let entry = map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            map = entry.as_object_mut().unwrap();
        }
        Ok(map
            .entry(tokens[tokens.len() - 1].clone())
            .or_insert(Value::Null))
    }
}

impl Default for ExtraHeaders {
    fn default() -> Self {
        ExtraHeaders::new()
    }
}

impl From<String> for ExtraHeaders {
    fn from(s: String) -> Self {
        ExtraHeaders {
            raw: Some(s),
            root: Map::new(),
        }
    }
}

impl From<&str> for ExtraHeaders {
    fn from(s: &str) -> Self {
        ExtraHeaders::from(s.to_string())
    }
}

impl fmt::Display for ExtraHeaders {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json_string())
    }
}

fn lookup<'a>(root: &'a Map<String, Value>, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() {
        return None;
    }
    let mut current: Option<&Value> = None;
    for token in pointer_tokens(pointer).ok()? {
        current = match current {
            None => root.get(&token),
            Some(Value::Object(map)) => map.get(&token),
            Some(Value::Array(arr)) => token.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        };
        current?;
    }
    current
}

/// Splits a JSON Pointer into unescaped reference tokens.
fn pointer_tokens(pointer: &str) -> MSResult<Vec<String>> {
    if !pointer.starts_with('/') {
        return Err(MSeedError::ExtraHeader(format!(
            "pointer `{}` must begin with /",
            pointer
        )));
    }
    Ok(pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn wrong_type(pointer: &str, wanted: &str, got: &Value) -> MSeedError {
    MSeedError::ExtraHeader(format!(
        "value at `{}` is not a {}: {}",
        pointer, wanted, got
    ))
}

/// An event detection, serialized with only the populated fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDetection {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub detection_type: Option<String>,
    #[serde(rename = "SignalAmplitude", skip_serializing_if = "Option::is_none")]
    pub signal_amplitude: Option<f64>,
    #[serde(rename = "SignalPeriod", skip_serializing_if = "Option::is_none")]
    pub signal_period: Option<f64>,
    #[serde(rename = "BackgroundEstimate", skip_serializing_if = "Option::is_none")]
    pub background_estimate: Option<f64>,
    #[serde(rename = "Wave", skip_serializing_if = "Option::is_none")]
    pub wave: Option<String>,
    #[serde(rename = "Units", skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(rename = "OnsetTime", skip_serializing_if = "Option::is_none")]
    pub onset_time: Option<NsTime>,
    #[serde(rename = "MEDSNR", skip_serializing_if = "Option::is_none")]
    pub med_snr: Option<[f64; 6]>,
    #[serde(rename = "MEDLookback", skip_serializing_if = "Option::is_none")]
    pub med_lookback: Option<i32>,
    #[serde(rename = "MEDPickAlgorithm", skip_serializing_if = "Option::is_none")]
    pub med_pick_algorithm: Option<i32>,
    #[serde(rename = "Detector", skip_serializing_if = "Option::is_none")]
    pub detector: Option<String>,
}

/// A calibration, serialized with only the populated fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub calibration_type: Option<String>,
    #[serde(rename = "BeginTime", skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<NsTime>,
    #[serde(rename = "EndTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NsTime>,
    #[serde(rename = "Steps", skip_serializing_if = "Option::is_none")]
    pub steps: Option<i32>,
    #[serde(rename = "StepFirstPulsePositive", skip_serializing_if = "Option::is_none")]
    pub first_pulse_positive: Option<bool>,
    #[serde(rename = "StepAlternateSign", skip_serializing_if = "Option::is_none")]
    pub alternate_sign: Option<bool>,
    #[serde(rename = "Trigger", skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(rename = "Continued", skip_serializing_if = "Option::is_none")]
    pub continued: Option<bool>,
    #[serde(rename = "Amplitude", skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<f64>,
    #[serde(rename = "InputUnits", skip_serializing_if = "Option::is_none")]
    pub input_units: Option<String>,
    #[serde(rename = "AmplitudeRange", skip_serializing_if = "Option::is_none")]
    pub amplitude_range: Option<String>,
    #[serde(rename = "Duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(rename = "SinePeriod", skip_serializing_if = "Option::is_none")]
    pub sine_period: Option<f64>,
    #[serde(rename = "StepBetween", skip_serializing_if = "Option::is_none")]
    pub step_between: Option<f64>,
    #[serde(rename = "InputFrequency", skip_serializing_if = "Option::is_none")]
    pub input_frequency: Option<f64>,
    #[serde(rename = "InputVoltage", skip_serializing_if = "Option::is_none")]
    pub input_voltage: Option<f64>,
    #[serde(rename = "Coupling", skip_serializing_if = "Option::is_none")]
    pub coupling: Option<String>,
    #[serde(rename = "Rolloff", skip_serializing_if = "Option::is_none")]
    pub rolloff: Option<String>,
    #[serde(rename = "Noise", skip_serializing_if = "Option::is_none")]
    pub noise: Option<String>,
}

/// A timing exception, serialized with only the populated fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingException {
    #[serde(rename = "Time", skip_serializing_if = "Option::is_none")]
    pub time: Option<NsTime>,
    #[serde(rename = "VCOCorrection", skip_serializing_if = "Option::is_none")]
    pub vco_correction: Option<f64>,
    #[serde(rename = "ReceptionQuality", skip_serializing_if = "Option::is_none")]
    pub reception_quality: Option<i32>,
    #[serde(rename = "Count", skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    #[serde(rename = "ClockStatus", skip_serializing_if = "Option::is_none")]
    pub clock_status: Option<String>,
}

/// A mass recenter, serialized with only the populated fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recenter {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub recenter_type: Option<String>,
    #[serde(rename = "BeginTime", skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<NsTime>,
    #[serde(rename = "EndTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NsTime>,
    #[serde(rename = "Trigger", skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}
