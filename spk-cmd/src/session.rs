//! State of one review session: the station catalog, the pick store and the
//! event solution, plus the operations the subcommands chain together.

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use spk_core::pick::AmplitudeExtremum;
use spk_core::solution::{EventSolution, NetworkMagnitude};
use spk_core::station::{Component, StationCatalog};
use spk_core::store::PickStore;
use spk_data::distance::compute_distances;
use spk_data::magnitude::{aggregate_network_magnitude, update_magnitudes, WoodAnderson};
use spk_event::{apply_event, encode_event, parse_event};
use spk_locate::LocationSolver;
use std::path::Path;

/// A min/max amplitude pair picked on one horizontal trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplitudePick {
    pub station: String,
    pub component: Component,
    pub min: AmplitudeExtremum,
    pub max: AmplitudeExtremum,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub catalog: StationCatalog,
    pub store: PickStore,
    pub solution: EventSolution,
}

impl Session {
    pub fn new(catalog: StationCatalog) -> Session {
        let store = PickStore::for_catalog(&catalog);
        Session {
            catalog,
            store,
            solution: EventSolution::default(),
        }
    }

    /// Start a session from a JSON station manifest.
    pub fn from_manifest(path: &Path) -> anyhow::Result<Session> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let catalog = StationCatalog::from_json(&json)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        info!("Loaded {} stations from {}", catalog.len(), path.display());
        Ok(Session::new(catalog))
    }

    /// Replace the session state with an event document.
    pub fn load_event(&mut self, xml: &str) -> anyhow::Result<()> {
        let document = parse_event(xml)?;
        apply_event(&document, &self.catalog, &mut self.store, &mut self.solution);
        info!(
            "Loaded event {} with {} picks",
            self.solution.event_id.as_deref().unwrap_or("(no id)"),
            document.picks.len()
        );
        Ok(())
    }

    pub fn load_event_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event {}", path.display()))?;
        self.load_event(&xml)
            .with_context(|| format!("Invalid event {}", path.display()))
    }

    pub fn to_xml(&self) -> anyhow::Result<String> {
        Ok(encode_event(&self.catalog, &self.store, &self.solution)?)
    }

    /// Write amplitude picks into the store. Returns how many were applied.
    pub fn apply_amplitudes(&mut self, picks: &[AmplitudePick]) -> usize {
        let mut applied = 0;
        for pick in picks {
            let Some(bracket) = self
                .store
                .get_mut(&pick.station)
                .and_then(|r| r.amplitude_mut(pick.component))
            else {
                warn!(
                    "{}: no {} amplitude slot, amplitude pick skipped",
                    pick.station, pick.component
                );
                continue;
            };
            bracket.set_max(pick.max);
            bracket.set_min(pick.min);
            if bracket.is_complete() {
                applied += 1;
            } else {
                warn!(
                    "{}: {} amplitude minimum above maximum, pick incomplete",
                    pick.station, pick.component
                );
            }
        }
        applied
    }

    pub fn set_magnitude_use(&mut self, station: &str, used: bool) -> anyhow::Result<()> {
        self.store.record_mut(station)?.set_magnitude_use(used);
        Ok(())
    }

    /// Run a location program, then refresh the distances.
    pub fn locate(&mut self, solver: &dyn LocationSolver) -> anyhow::Result<()> {
        solver
            .run(&self.catalog, &mut self.store, &mut self.solution)
            .with_context(|| format!("{} location failed", solver.location_type()))?;
        self.update_distances();
        Ok(())
    }

    pub fn update_distances(&mut self) -> bool {
        compute_distances(&self.catalog, &mut self.store, &mut self.solution)
    }

    /// Network magnitude from the station magnitudes. With
    /// `recompute_stations` the station magnitudes are first derived again
    /// from the amplitude picks.
    pub fn update_magnitudes(&mut self, recompute_stations: bool) -> NetworkMagnitude {
        if recompute_stations {
            return update_magnitudes(
                &WoodAnderson::default(),
                &self.catalog,
                &mut self.store,
                &mut self.solution,
            );
        }
        let network = aggregate_network_magnitude(&self.store);
        self.solution.magnitude = Some(network);
        network
    }

    /// Drop the station and network magnitudes. Returns how many stations
    /// had one.
    pub fn clear_magnitudes(&mut self) -> usize {
        let mut cleared = 0;
        for record in self.store.iter_mut() {
            if record.magnitude().is_some() {
                record.clear_magnitude();
                cleared += 1;
            }
        }
        self.solution.magnitude = None;
        cleared
    }

    /// Forget everything except the station catalog.
    pub fn clear_all(&mut self) {
        self.store.clear_all();
        self.solution.clear();
    }

    /// Forget the location and magnitudes but keep the manual picks.
    pub fn clear_event(&mut self) {
        self.store.clear_event();
        self.solution.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spk_core::pick::Phase;
    use spk_core::testing::*;

    fn session() -> Session {
        Session::new(test_catalog())
    }

    fn amplitude(station: &str, component: Component, min: f64, max: f64) -> AmplitudePick {
        AmplitudePick {
            station: station.to_string(),
            component,
            min: AmplitudeExtremum {
                value: min,
                sample: 4000,
            },
            max: AmplitudeExtremum {
                value: max,
                sample: 4010,
            },
        }
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.json");
        std::fs::write(&path, serde_json::to_string(&test_catalog()).unwrap()).unwrap();
        let session = Session::from_manifest(&path).unwrap();
        assert_eq!(session.catalog.len(), 3);
        assert_eq!(session.store.len(), 3);
        assert!(Session::from_manifest(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_amplitudes_only_on_horizontals() {
        let mut session = session();
        let picks = vec![
            amplitude("RJOB", Component::N, -50.0, 70.0),
            amplitude("RJOB", Component::Z, -50.0, 70.0),
            amplitude("FUR", Component::E, -50.0, 70.0),
        ];
        assert_eq!(session.apply_amplitudes(&picks), 1);
        let bracket = session.store.get("RJOB").unwrap().amplitude(Component::N).unwrap();
        assert_eq!(bracket.peak_to_peak(), Some((120.0, 10)));
    }

    #[test]
    fn test_network_magnitude_from_decoded_stations() {
        let mut session = session();
        session.store.get_mut("RJOB").unwrap().set_magnitude(1.0, "EHN");
        session.store.get_mut("RMOA").unwrap().set_magnitude(2.0, "EHN");
        session.store.get_mut("RNON").unwrap().set_magnitude(9.0, "EHN");
        session.set_magnitude_use("RMOA", false).unwrap();
        let network = session.update_magnitudes(false);
        assert_eq!(network.value, 5.0);
        assert_eq!(network.variance, 16.0);
        assert_eq!(session.solution.magnitude, Some(network));
        assert!(session.set_magnitude_use("FUR", false).is_err());
    }

    #[test]
    fn test_recompute_drops_stations_without_amplitudes() {
        let mut session = session();
        session.store.get_mut("RJOB").unwrap().set_magnitude(1.0, "EHN");
        let network = session.update_magnitudes(true);
        assert_eq!(network.station_count, 0);
        assert!(network.value.is_nan());
        assert_eq!(session.store.get("RJOB").unwrap().magnitude(), None);
    }

    #[test]
    fn test_clear_magnitudes_keeps_picks() {
        let mut session = session();
        let rjob = session.store.get_mut("RJOB").unwrap();
        rjob.set_p(3885);
        rjob.set_magnitude(1.0, "EHN");
        session.store.get_mut("RMOA").unwrap().set_magnitude(2.0, "EHN");
        session.update_magnitudes(false);

        assert_eq!(session.clear_magnitudes(), 2);
        assert!(session.store.iter().all(|r| r.magnitude().is_none()));
        assert_eq!(session.solution.magnitude, None);
        assert_eq!(session.store.get("RJOB").unwrap().p().pick(), Some(3885));
    }

    #[test]
    fn test_clears() {
        let mut session = session();
        let rjob = session.store.get_mut("RJOB").unwrap();
        rjob.set_p(3885);
        rjob.phase_mut(Phase::P).set_synthetic(3890, 0.025);
        rjob.set_magnitude_use(false);
        session.solution.event_id = Some("1261911160".to_string());
        session.solution.depth = Some(4.0);

        session.clear_event();
        let rjob = session.store.get("RJOB").unwrap();
        assert_eq!(rjob.p().pick(), Some(3885));
        assert!(!rjob.p().has_synthetic());
        assert!(rjob.magnitude_use());
        assert_eq!(session.solution, EventSolution::default());

        session.clear_all();
        assert!(!session.store.get("RJOB").unwrap().has_pick());
    }

    #[test]
    fn test_event_xml_through_session() {
        let mut session = session();
        session.store.get_mut("RNON").unwrap().set_p(2000);
        session.solution.event_id = Some("42".to_string());
        let xml = session.to_xml().unwrap();

        let mut other = Session::new(test_catalog());
        other.store.get_mut("RJOB").unwrap().set_p(10);
        other.load_event(&xml).unwrap();
        assert_eq!(other.solution.event_id.as_deref(), Some("42"));
        assert_eq!(other.store.get("RNON").unwrap().p().pick(), Some(2000));
        assert!(!other.store.get("RJOB").unwrap().has_pick());
        assert!(other.load_event("<quakeml/>").is_err());
    }
}
