//! Local magnitude from picked amplitudes.
//!
//! Station magnitudes are computed per horizontal component and averaged;
//! the network magnitude is the plain mean over the stations flagged for
//! use.

use crate::response::{amplitude_response, wood_anderson};
use log::{debug, info, warn};
use spk_core::pick::AmplitudeBracket;
use spk_core::solution::{EventSolution, NetworkMagnitude};
use spk_core::station::{Component, PazResponse, StationCatalog, StationRecord};
use spk_core::store::{PickRecord, PickStore};

/// Amplitude-to-magnitude conversion for one component.
pub trait MagnitudeEstimator {
    /// `amplitude` is peak-to-peak in counts, `timespan` the time between
    /// the extrema in seconds, `distance` the hypocentral distance in km.
    fn estimate(
        &self,
        response: &PazResponse,
        amplitude: f64,
        timespan: f64,
        distance: f64,
    ) -> Option<f64>;
}

/// Ml from the amplitude a Wood-Anderson instrument would have recorded.
#[derive(Debug, Clone)]
pub struct WoodAnderson {
    paz: PazResponse,
}

impl Default for WoodAnderson {
    fn default() -> Self {
        WoodAnderson { paz: wood_anderson() }
    }
}

impl MagnitudeEstimator for WoodAnderson {
    fn estimate(
        &self,
        response: &PazResponse,
        amplitude: f64,
        timespan: f64,
        distance: f64,
    ) -> Option<f64> {
        if timespan <= 0.0 || amplitude <= 0.0 || distance <= 0.0 {
            debug!(
                "cannot estimate magnitude from amplitude {} over {} s at {} km",
                amplitude, timespan, distance
            );
            return None;
        }
        // half period between the extrema
        let frequency = 1.0 / (2.0 * timespan);
        let instrument = amplitude_response(response, frequency) * response.sensitivity;
        if instrument <= 0.0 {
            return None;
        }
        let mut a = amplitude / 2.0;
        a /= instrument;
        a *= amplitude_response(&self.paz, frequency) * self.paz.sensitivity;
        // m to mm
        a *= 1000.0;
        let ml = a.log10() + (distance / 100.0).log10() + 0.00301 * (distance - 100.0) + 3.0;
        ml.is_finite().then_some(ml)
    }
}

fn component_magnitude<E: MagnitudeEstimator>(
    estimator: &E,
    station: &StationRecord,
    bracket: &AmplitudeBracket,
    component: Component,
    distance: f64,
) -> Option<(f64, String)> {
    let (amplitude, samples) = bracket.peak_to_peak()?;
    let trace = station.trace(component)?;
    let response = station.response(component)?;
    let timespan = trace.samples_to_seconds(samples);
    let ml = estimator.estimate(response, amplitude, timespan, distance)?;
    Some((ml, trace.channel.clone()))
}

/// Magnitude of one station from its N and E amplitude brackets.
///
/// Returns the magnitude and the channels it was computed from, or `None`
/// when no component has a complete bracket or the station has no
/// hypocentral distance yet.
pub fn estimate_station_magnitude<E: MagnitudeEstimator>(
    estimator: &E,
    station: &StationRecord,
    record: &PickRecord,
) -> Option<(f64, String)> {
    let has_bracket = [Component::N, Component::E]
        .iter()
        .any(|c| record.amplitude(*c).is_some_and(|b| b.is_complete()));
    if !has_bracket {
        return None;
    }
    let Some(distance) = record.distances().map(|d| d.hypocentral) else {
        warn!("{}: no hypocentral distance, magnitude skipped", station.code);
        return None;
    };
    let parts: Vec<(f64, String)> = [Component::N, Component::E]
        .iter()
        .filter_map(|c| {
            let bracket = record.amplitude(*c)?;
            component_magnitude(estimator, station, bracket, *c, distance)
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    let ml = parts.iter().map(|(m, _)| m).sum::<f64>() / parts.len() as f64;
    let channels = parts
        .iter()
        .map(|(_, c)| c.as_str())
        .collect::<Vec<_>>()
        .join(",");
    Some((ml, channels))
}

/// Recompute every station magnitude. Stations without a usable bracket
/// lose any previous magnitude.
pub fn calculate_station_magnitudes<E: MagnitudeEstimator>(
    estimator: &E,
    catalog: &StationCatalog,
    store: &mut PickStore,
) {
    for record in store.iter_mut() {
        let Some(station) = catalog.get(record.station()) else {
            continue;
        };
        match estimate_station_magnitude(estimator, station, record) {
            Some((ml, channels)) => {
                info!(
                    "calculated new magnitude for {}: {:.2} (channels: {})",
                    station.code, ml, channels
                );
                record.set_magnitude(ml, &channels);
            }
            None => record.clear_magnitude(),
        }
    }
}

/// Mean and population variance over the used station magnitudes.
pub fn aggregate_network_magnitude(store: &PickStore) -> NetworkMagnitude {
    let values: Vec<f64> = store
        .iter()
        .filter(|r| r.magnitude_use())
        .filter_map(|r| r.magnitude())
        .collect();
    if values.is_empty() {
        return NetworkMagnitude {
            value: f64::NAN,
            variance: f64::NAN,
            station_count: 0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    NetworkMagnitude {
        value: mean,
        variance,
        station_count: values.len(),
    }
}

/// Station magnitudes followed by the network magnitude.
pub fn update_magnitudes<E: MagnitudeEstimator>(
    estimator: &E,
    catalog: &StationCatalog,
    store: &mut PickStore,
    solution: &mut EventSolution,
) -> NetworkMagnitude {
    calculate_station_magnitudes(estimator, catalog, store);
    let network = aggregate_network_magnitude(store);
    info!(
        "new network magnitude: {:.2} (Variance: {:.2}) from {} stations",
        network.value, network.variance, network.station_count
    );
    solution.magnitude = Some(network);
    network
}
