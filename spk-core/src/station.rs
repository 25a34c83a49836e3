use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use spk_utils::dates;
use std::collections::HashSet;
use std::fmt;

/// Component of a three-component recording, in stream order.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Component {
    Z,
    N,
    E,
}

impl Component {
    /// Position of the component in a station's trace list.
    pub fn index(self) -> usize {
        match self {
            Component::Z => 0,
            Component::N => 1,
            Component::E => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Component> {
        match index {
            0 => Some(Component::Z),
            1 => Some(Component::N),
            2 => Some(Component::E),
            _ => None,
        }
    }

    /// Component named by the last letter of a channel code (`EHN` -> N).
    pub fn from_channel(channel: &str) -> Option<Component> {
        match channel.trim().chars().last()? {
            'Z' => Some(Component::Z),
            'N' => Some(Component::N),
            'E' => Some(Component::E),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Component::Z => "Z",
            Component::N => "N",
            Component::E => "E",
        };
        write!(f, "{}", s)
    }
}

/// Poles-and-zeros instrument response. Poles and zeros are in rad/s.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PazResponse {
    pub gain: f64,
    pub sensitivity: f64,
    pub poles: Vec<Complex64>,
    pub zeros: Vec<Complex64>,
}

/// Header information of one recorded channel, as provided by the waveform
/// layer.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TraceStats {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub channel: String,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    /// Samples per second
    pub sampling_rate: f64,
}

impl TraceStats {
    /// Absolute time of a sample index.
    pub fn time_of_sample(&self, sample: i64) -> DateTime<Utc> {
        dates::offset_seconds(&self.starttime, sample as f64 / self.sampling_rate)
    }

    /// Nearest sample index of an absolute time (may lie outside the trace).
    pub fn sample_at(&self, time: &DateTime<Utc>) -> i64 {
        self.seconds_to_samples(dates::seconds_between(time, &self.starttime))
    }

    /// Convert a span in seconds to the nearest whole number of samples.
    pub fn seconds_to_samples(&self, seconds: f64) -> i64 {
        (seconds * self.sampling_rate).round() as i64
    }

    /// Convert a span in samples to seconds.
    pub fn samples_to_seconds(&self, samples: i64) -> f64 {
        samples as f64 / self.sampling_rate
    }

    /// Whether `time` lies inside the recording window (inclusive).
    pub fn covers(&self, time: &DateTime<Utc>) -> bool {
        *time >= self.starttime && *time <= self.endtime
    }
}

/// Static metadata of one station for the duration of a review session.
///
/// `traces` and `responses` are in component order: either just Z, or
/// Z, N and E.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    pub code: String,
    pub network: String,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Elevation in km
    pub elevation: f64,
    pub responses: Vec<PazResponse>,
    pub traces: Vec<TraceStats>,
}

impl StationRecord {
    pub fn trace(&self, component: Component) -> Option<&TraceStats> {
        self.traces.get(component.index())
    }

    pub fn response(&self, component: Component) -> Option<&PazResponse> {
        self.responses.get(component.index())
    }

    /// The vertical trace every station carries.
    pub fn reference_trace(&self) -> &TraceStats {
        &self.traces[0]
    }

    pub fn has_horizontals(&self) -> bool {
        self.traces.len() == 3
    }

    fn validate(&self) -> Result<()> {
        let expected: &[char] = match self.traces.len() {
            1 => &['Z'],
            3 => &['Z', 'N', 'E'],
            n => {
                return Err(CoreError::InvalidCatalog(format!(
                    "station {} has {} traces, expected one Z trace or a ZNE set",
                    self.code, n
                )))
            }
        };
        for (trace, component) in self.traces.iter().zip(expected) {
            if !trace.channel.trim().ends_with(*component) {
                return Err(CoreError::InvalidCatalog(format!(
                    "station {}: channel {} out of Z/N/E order",
                    self.code, trace.channel
                )));
            }
            if trace.station.trim() != self.code {
                return Err(CoreError::InvalidCatalog(format!(
                    "station {}: trace belongs to station {}",
                    self.code, trace.station
                )));
            }
            if trace.sampling_rate <= 0.0 {
                return Err(CoreError::InvalidCatalog(format!(
                    "station {}: non-positive sampling rate on {}",
                    self.code, trace.channel
                )));
            }
        }
        if self.responses.len() != self.traces.len() {
            return Err(CoreError::InvalidCatalog(format!(
                "station {} has {} responses for {} traces",
                self.code,
                self.responses.len(),
                self.traces.len()
            )));
        }
        Ok(())
    }
}

/// The station metadata of a session, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationCatalog {
    stations: Vec<StationRecord>,
}

impl StationCatalog {
    /// Build a catalog, rejecting duplicate codes and malformed stations.
    pub fn new(stations: Vec<StationRecord>) -> Result<StationCatalog> {
        let mut seen = HashSet::new();
        for station in &stations {
            station.validate()?;
            if !seen.insert(station.code.clone()) {
                return Err(CoreError::InvalidCatalog(format!(
                    "found two streams for station {}",
                    station.code
                )));
            }
        }
        Ok(StationCatalog { stations })
    }

    /// Parse a JSON manifest of the form `{"stations": [...]}`.
    pub fn from_json(json: &str) -> Result<StationCatalog> {
        let raw: StationCatalog = serde_json::from_str(json)?;
        StationCatalog::new(raw.stations)
    }

    pub fn get(&self, code: &str) -> Option<&StationRecord> {
        self.stations.iter().find(|s| s.code == code)
    }

    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationRecord> {
        self.stations.iter()
    }

    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
