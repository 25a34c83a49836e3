use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which location program produced the current origin.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum LocationType {
    #[default]
    None,
    ThreeDLoc,
    Hyp2000,
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationType::None => "none",
            LocationType::ThreeDLoc => "3dloc",
            LocationType::Hyp2000 => "hyp2000",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for LocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" | "" => Ok(LocationType::None),
            "3dloc" => Ok(LocationType::ThreeDLoc),
            "hyp2000" => Ok(LocationType::Hyp2000),
            other => Err(format!("unknown location type: {}", other)),
        }
    }
}

/// Epicentral distance statistics over the stations used by a location, in km.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct DistanceSummary {
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

/// Network magnitude; value and variance are NaN when no station contributes.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct NetworkMagnitude {
    pub value: f64,
    pub variance: f64,
    pub station_count: usize,
}

/// Event-level results of the current review session.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct EventSolution {
    pub event_id: Option<String>,
    pub location_type: LocationType,
    pub origin_time: Option<DateTime<Utc>>,
    /// Degrees
    pub longitude: Option<f64>,
    /// Degrees
    pub latitude: Option<f64>,
    /// km below sea level
    pub depth: Option<f64>,
    /// km
    pub error_x: Option<f64>,
    /// km
    pub error_y: Option<f64>,
    /// km
    pub error_z: Option<f64>,
    /// Seconds
    pub standard_error: Option<f64>,
    /// Degrees
    pub azimuthal_gap: Option<f64>,
    pub velocity_model: Option<String>,
    pub p_phase_count: Option<usize>,
    pub s_phase_count: Option<usize>,
    pub used_station_count: Option<usize>,
    pub distances: Option<DistanceSummary>,
    pub magnitude: Option<NetworkMagnitude>,
}

impl EventSolution {
    pub fn clear(&mut self) {
        *self = EventSolution::default();
    }

    /// Epicenter and depth `(lon, lat, depth)` once all three are known.
    pub fn hypocenter(&self) -> Option<(f64, f64, f64)> {
        Some((self.longitude?, self.latitude?, self.depth?))
    }

    /// The event identifier, assigning one from the current time if absent.
    pub fn event_id_or_new(&mut self) -> &str {
        self.event_id.get_or_insert_with(new_event_id)
    }

    pub fn used_phase_count(&self) -> Option<usize> {
        match (self.p_phase_count, self.s_phase_count) {
            (None, None) => None,
            (p, s) => Some(p.unwrap_or(0) + s.unwrap_or(0)),
        }
    }
}

/// Event identifier from the invocation time in whole seconds.
pub fn new_event_id() -> String {
    Utc::now().timestamp().to_string()
}
