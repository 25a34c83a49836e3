//! Event XML back into the session.
//!
//! [`parse_event`] reads the whole document into an [`EventDocument`];
//! [`apply_event`] then replaces the session state with it. A document
//! that fails to parse leaves the session untouched.

use crate::dom::Element;
use crate::error::{EventError, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use spk_core::pick::{Onset, Phase, Polarity, MAX_WEIGHT};
use spk_core::solution::{DistanceSummary, EventSolution, NetworkMagnitude};
use spk_core::station::{Component, StationCatalog};
use spk_core::store::{Distances, PickStore};
use spk_utils::dates;
use std::str::FromStr;

/// One `pick` element.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPick {
    pub network: String,
    pub station: String,
    pub channel: String,
    pub phase: Phase,
    pub time: DateTime<Utc>,
    /// Half width of the error bracket in seconds
    pub uncertainty: Option<f64>,
    pub onset: Option<Onset>,
    pub polarity: Option<Polarity>,
    pub weight: Option<u8>,
    /// Travel time residual in seconds
    pub residual: Option<f64>,
    pub solver_weight: Option<f64>,
    pub azimuth: Option<f64>,
    pub incidence: Option<f64>,
    pub epicentral: Option<f64>,
    pub hypocentral: Option<f64>,
}

/// One `stationMagnitude` element.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStationMagnitude {
    pub station: String,
    pub value: f64,
    pub weight: Option<f64>,
    pub channels: Option<String>,
}

impl DecodedStationMagnitude {
    /// A zero weight marks a station left out of the network magnitude.
    pub fn is_used(&self) -> bool {
        self.weight.map_or(true, |w| w != 0.0)
    }
}

/// Everything an event document carries, before it touches the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDocument {
    pub event_id: Option<String>,
    pub picks: Vec<DecodedPick>,
    pub solution: EventSolution,
    pub station_magnitudes: Vec<DecodedStationMagnitude>,
}

/// Parse a number at `path`, warning about (and dropping) values that do
/// not parse.
fn number<T: FromStr>(element: &Element, path: &[&str]) -> Option<T> {
    let text = element.text_at(path)?;
    match text.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring unparseable {}: {:?}", path.join("/"), text);
            None
        }
    }
}

fn keyword<T: FromStr>(element: &Element, name: &str) -> Option<T> {
    let text = element.text_at(&[name])?;
    let value = text.parse::<T>().ok();
    if value.is_none() {
        warn!("ignoring unknown {}: {:?}", name, text);
    }
    value
}

/// Weights are written as integers but older documents carry floats.
fn weight(element: &Element) -> Option<u8> {
    let text = element.text_at(&["weight"])?;
    let value = text.parse::<u8>().ok().or_else(|| {
        let w = text.parse::<f64>().ok()?.round() as i64;
        u8::try_from(w).ok()
    });
    match value {
        Some(w) if w <= MAX_WEIGHT => Some(w),
        _ => {
            warn!("ignoring pick weight {:?}", text);
            None
        }
    }
}

fn parse_pick(element: &Element) -> Option<DecodedPick> {
    let waveform = element.child("waveform");
    let attr = |key: &str| {
        waveform
            .and_then(|w| w.attr(key))
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let station = attr("stationCode");
    let Some(phase) = element.text_at(&["phaseHint"]) else {
        warn!("{}: pick without phaseHint, skipped", station);
        return None;
    };
    let Ok(phase) = phase.parse::<Phase>() else {
        warn!("{}: unsupported phase {:?}, skipped", station, phase);
        return None;
    };
    let Some(time) = element.text_at(&["time", "value"]) else {
        warn!("{}: {} pick without time, skipped", station, phase);
        return None;
    };
    let time = match dates::parse_iso(time) {
        Ok(t) => t,
        Err(e) => {
            warn!("{}: {} pick with bad time ({}), skipped", station, phase, e);
            return None;
        }
    };

    Some(DecodedPick {
        network: attr("networkCode"),
        channel: attr("channelCode"),
        station,
        phase,
        time,
        uncertainty: number(element, &["time", "uncertainty"]),
        onset: keyword(element, "onset"),
        polarity: keyword(element, "polarity"),
        weight: weight(element),
        residual: number(element, &["phase_res", "value"]),
        solver_weight: number(element, &["phase_weight", "value"]),
        azimuth: number(element, &["azimuth", "value"]),
        incidence: number(element, &["incident", "value"]),
        epicentral: number(element, &["epi_dist", "value"]),
        hypocentral: number(element, &["hyp_dist", "value"]),
    })
}

fn parse_origin(origin: &Element, solution: &mut EventSolution) {
    solution.origin_time = origin
        .text_at(&["time", "value"])
        .and_then(|t| match dates::parse_iso(t) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("ignoring origin time: {}", e);
                None
            }
        });
    solution.latitude = number(origin, &["latitude", "value"]);
    solution.error_y = number(origin, &["latitude", "uncertainty"]);
    solution.longitude = number(origin, &["longitude", "value"]);
    solution.error_x = number(origin, &["longitude", "uncertainty"]);
    solution.depth = number(origin, &["depth", "value"]);
    solution.error_z = number(origin, &["depth", "uncertainty"]);
    solution.velocity_model = origin.text_at(&["earth_mod"]).map(str::to_string);

    let Some(quality) = origin.child("originQuality") else {
        return;
    };
    solution.p_phase_count = number(quality, &["P_usedPhaseCount"]);
    solution.s_phase_count = number(quality, &["S_usedPhaseCount"]);
    solution.used_station_count = number(quality, &["usedStationCount"]);
    solution.standard_error = number(quality, &["standardError"]);
    solution.azimuthal_gap = number(quality, &["secondaryAzimuthalGap"]);
    let min = number(quality, &["minimumDistance"]);
    let median = number(quality, &["medianDistance"]);
    let max = number(quality, &["maximumDistance"]);
    solution.distances = match (min, median, max) {
        (Some(min), Some(median), Some(max)) => Some(DistanceSummary { min, median, max }),
        _ => None,
    };
}

fn parse_magnitude(magnitude: &Element) -> Option<NetworkMagnitude> {
    let value: Option<f64> = number(magnitude, &["mag", "value"]);
    let station_count: Option<usize> = number(magnitude, &["stationCount"]);
    if value.is_none() && station_count.is_none() {
        return None;
    }
    Some(NetworkMagnitude {
        value: value.unwrap_or(f64::NAN),
        variance: number(magnitude, &["mag", "uncertainty"]).unwrap_or(f64::NAN),
        station_count: station_count.unwrap_or(0),
    })
}

fn parse_station_magnitude(element: &Element) -> Option<DecodedStationMagnitude> {
    let station = element.text_at(&["station"])?.to_string();
    let Some(value) = number(element, &["mag", "value"]) else {
        warn!("{}: station magnitude without value, skipped", station);
        return None;
    };
    Some(DecodedStationMagnitude {
        value,
        weight: number(element, &["weight"]),
        channels: element.text_at(&["channels"]).map(str::to_string),
        station,
    })
}

/// Parse an event document. Only malformed XML or a root other than
/// `event` is an error; everything else is optional.
pub fn parse_event(xml: &str) -> Result<EventDocument> {
    let root = Element::parse(xml)?;
    if root.name != "event" {
        return Err(EventError::UnexpectedRoot(root.name));
    }

    let mut solution = EventSolution::default();
    let event_id = root.text_at(&["event_id", "value"]).map(str::to_string);
    solution.event_id = event_id.clone();
    if let Some(origin) = root.child("origin") {
        parse_origin(origin, &mut solution);
    }
    solution.magnitude = root.child("magnitude").and_then(parse_magnitude);

    let picks: Vec<DecodedPick> = root.children("pick").filter_map(parse_pick).collect();
    let station_magnitudes = root
        .children("stationMagnitude")
        .filter_map(parse_station_magnitude)
        .collect();
    debug!("parsed event {:?} with {} picks", event_id, picks.len());

    Ok(EventDocument {
        event_id,
        picks,
        solution,
        station_magnitudes,
    })
}

/// Replace the session state with a parsed document. Picks and station
/// magnitudes of stations not in the catalog are skipped with a warning.
pub fn apply_event(
    document: &EventDocument,
    catalog: &StationCatalog,
    store: &mut PickStore,
    solution: &mut EventSolution,
) {
    store.clear_all();
    *solution = document.solution.clone();

    for decoded in &document.picks {
        let (Some(station), Some(record)) =
            (catalog.get(&decoded.station), store.get_mut(&decoded.station))
        else {
            warn!("{}: not in station catalog, {} pick skipped", decoded.station, decoded.phase);
            continue;
        };
        let component = match decoded.phase {
            Phase::P => Component::Z,
            Phase::S => match Component::from_channel(&decoded.channel) {
                Some(c) => c,
                None => {
                    warn!("{}: S pick on unknown channel {:?}, skipped", decoded.station, decoded.channel);
                    continue;
                }
            },
        };
        let Some(trace) = station.trace(component) else {
            warn!("{}: no {} trace, {} pick skipped", decoded.station, component, decoded.phase);
            continue;
        };

        let sample = trace.sample_at(&decoded.time);
        match decoded.phase {
            Phase::P => record.set_p(sample),
            Phase::S => record.set_s(sample, component),
        }
        let pick = record.phase_mut(decoded.phase);
        if let Some(unc) = decoded.uncertainty {
            pick.set_bracket(trace.seconds_to_samples(unc));
        }
        if let Some(onset) = decoded.onset {
            pick.set_onset(onset);
        }
        if let Some(polarity) = decoded.polarity {
            pick.set_polarity(polarity);
        }
        if let Some(weight) = decoded.weight {
            pick.set_weight(weight);
        }
        if let Some(residual) = decoded.residual {
            pick.set_synthetic(sample + trace.seconds_to_samples(residual), residual);
        }
        if let Some(weight) = decoded.solver_weight {
            pick.set_solver_weight(weight);
        }
        if let Some(azimuth) = decoded.azimuth {
            pick.set_azimuth(azimuth);
        }
        if let Some(incidence) = decoded.incidence {
            pick.set_incidence(incidence);
        }
        if let (Some(epicentral), Some(hypocentral)) = (decoded.epicentral, decoded.hypocentral) {
            record.set_distances(Distances {
                epicentral,
                hypocentral,
                offset: None,
            });
        }
    }

    for magnitude in &document.station_magnitudes {
        let Some(record) = store.get_mut(&magnitude.station) else {
            warn!("{}: not in station catalog, station magnitude skipped", magnitude.station);
            continue;
        };
        record.set_magnitude(magnitude.value, magnitude.channels.as_deref().unwrap_or_default());
        record.set_magnitude_use(magnitude.is_used());
    }
}
