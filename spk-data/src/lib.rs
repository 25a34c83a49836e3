//! Derived quantities of a located event.
//!
//! This crate turns picks and an origin into station distances, amplitude
//! picks and local magnitudes.

pub mod magnitude;
pub mod response;

/// Station distances relative to the current hypocenter.
pub mod distance {
    use log::{info, warn};
    use spk_core::solution::{DistanceSummary, EventSolution};
    use spk_core::station::{StationCatalog, StationRecord};
    use spk_core::store::{Distances, Offset, PickStore};
    use std::f64::consts::PI;

    /// Mean earth radius in km
    pub const EARTH_RADIUS_KM: f64 = 6371.0;

    pub fn km_per_degree() -> f64 {
        2.0 * PI * EARTH_RADIUS_KM / 360.0
    }

    /// Equirectangular offsets of a station from the epicenter.
    pub fn station_distances(
        station: &StationRecord,
        event_lon: f64,
        event_lat: f64,
        event_depth: f64,
    ) -> Distances {
        let k = km_per_degree();
        let x = (station.longitude - event_lon) * k * event_lat.to_radians().cos();
        let y = (station.latitude - event_lat) * k;
        let z = (station.elevation - event_depth).abs();
        Distances {
            epicentral: (x * x + y * y).sqrt(),
            hypocentral: (x * x + y * y + z * z).sqrt(),
            offset: Some(Offset { x, y, z }),
        }
    }

    /// Min, median and max of a set of distances.
    pub fn summarize(mut values: Vec<f64>) -> Option<DistanceSummary> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        };
        Some(DistanceSummary {
            min: values[0],
            median,
            max: values[n - 1],
        })
    }

    /// Recompute the distances of every station and the summary over the
    /// stations the location used. Returns false when there is no hypocenter.
    pub fn compute_distances(
        catalog: &StationCatalog,
        store: &mut PickStore,
        solution: &mut EventSolution,
    ) -> bool {
        let Some((lon, lat, depth)) = solution.hypocenter() else {
            warn!("no hypocenter, distances not computed");
            return false;
        };
        let mut used = Vec::new();
        for record in store.iter_mut() {
            let Some(station) = catalog.get(record.station()) else {
                warn!("{}: not in station catalog, no distances", record.station());
                continue;
            };
            let distances = station_distances(station, lon, lat, depth);
            if record.is_used() {
                used.push(distances.epicentral);
            }
            record.set_distances(distances);
        }
        solution.used_station_count = Some(used.len());
        solution.distances = summarize(used);
        if let Some(summary) = &solution.distances {
            info!(
                "epicentral distances: min {:.2} km, median {:.2} km, max {:.2} km",
                summary.min, summary.median, summary.max
            );
        }
        true
    }

}

/// Amplitude picking on horizontal traces.
pub mod amplitude {
    use spk_core::pick::AmplitudeExtremum;

    /// Half width in samples of the window searched around a clicked sample.
    pub const SEARCH_HALF_WIDTH: usize = 10;

    fn window(samples: &[f64], center: i64) -> Option<(usize, &[f64])> {
        if samples.is_empty() || center < 0 || center as usize >= samples.len() {
            return None;
        }
        let center = center as usize;
        let start = center.saturating_sub(SEARCH_HALF_WIDTH);
        let end = (center + SEARCH_HALF_WIDTH + 1).min(samples.len());
        Some((start, &samples[start..end]))
    }

    /// Smallest sample within the search window around `center`.
    pub fn find_minimum(samples: &[f64], center: i64) -> Option<AmplitudeExtremum> {
        let (start, win) = window(samples, center)?;
        let (offset, value) = win
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        Some(AmplitudeExtremum {
            value: *value,
            sample: (start + offset) as i64,
        })
    }

    /// Largest sample within the search window around `center`.
    pub fn find_maximum(samples: &[f64], center: i64) -> Option<AmplitudeExtremum> {
        let (start, win) = window(samples, center)?;
        let (offset, value) = win
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        Some(AmplitudeExtremum {
            value: *value,
            sample: (start + offset) as i64,
        })
    }

}
