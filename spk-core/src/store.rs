use crate::error::{CoreError, Result};
use crate::pick::{AmplitudeBracket, Phase, PhasePick};
use crate::station::{Component, StationCatalog, StationRecord};
use serde::{Deserialize, Serialize};

/// East, north and vertical offset of a station from the hypocenter, in km.
#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Station distances to the current hypocenter, in km. Distances restored
/// from an event document carry no offset.
#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Distances {
    pub epicentral: f64,
    pub hypocentral: f64,
    pub offset: Option<Offset>,
}

/// Everything picked or derived for one station during a review session.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PickRecord {
    station: String,
    p: PhasePick,
    s: PhasePick,
    s_component: Option<Component>,
    /// Brackets on the N and E components, in that order
    amplitudes: [AmplitudeBracket; 2],
    magnitude: Option<f64>,
    magnitude_channels: Option<String>,
    magnitude_use: bool,
    distances: Option<Distances>,
}

impl PickRecord {
    pub fn new(station: &str) -> PickRecord {
        PickRecord {
            station: station.to_string(),
            p: PhasePick::default(),
            s: PhasePick::default(),
            s_component: None,
            amplitudes: Default::default(),
            magnitude: None,
            magnitude_channels: None,
            magnitude_use: true,
            distances: None,
        }
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn phase(&self, phase: Phase) -> &PhasePick {
        match phase {
            Phase::P => &self.p,
            Phase::S => &self.s,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut PhasePick {
        match phase {
            Phase::P => &mut self.p,
            Phase::S => &mut self.s,
        }
    }

    pub fn p(&self) -> &PhasePick {
        &self.p
    }

    pub fn s(&self) -> &PhasePick {
        &self.s
    }

    pub fn set_p(&mut self, sample: i64) {
        self.p.set_pick(sample);
    }

    /// Set the S pick and remember the component it was taken on.
    pub fn set_s(&mut self, sample: i64, component: Component) {
        self.s.set_pick(sample);
        self.s_component = Some(component);
    }

    /// Clear a pick and everything that only exists together with it.
    pub fn clear_pick(&mut self, phase: Phase) {
        self.phase_mut(phase).clear_pick();
        if phase == Phase::S {
            self.s_component = None;
        }
    }

    /// Component the S pick was taken on, if any.
    pub fn s_component(&self) -> Option<Component> {
        self.s_component
    }

    /// Component whose trace carries the time base of `phase`.
    pub fn time_component(&self, phase: Phase) -> Component {
        match phase {
            Phase::P => Component::Z,
            Phase::S => self.s_component.unwrap_or(Component::Z),
        }
    }

    /// Amplitude bracket of a horizontal component; `None` for Z.
    pub fn amplitude(&self, component: Component) -> Option<&AmplitudeBracket> {
        match component {
            Component::N => Some(&self.amplitudes[0]),
            Component::E => Some(&self.amplitudes[1]),
            Component::Z => None,
        }
    }

    pub fn amplitude_mut(&mut self, component: Component) -> Option<&mut AmplitudeBracket> {
        match component {
            Component::N => Some(&mut self.amplitudes[0]),
            Component::E => Some(&mut self.amplitudes[1]),
            Component::Z => None,
        }
    }

    pub fn magnitude(&self) -> Option<f64> {
        self.magnitude
    }

    /// Channel codes the magnitude was computed from, e.g. `EHN,EHE`.
    pub fn magnitude_channels(&self) -> Option<&str> {
        self.magnitude_channels.as_deref()
    }

    pub fn set_magnitude(&mut self, magnitude: f64, channels: &str) {
        self.magnitude = Some(magnitude);
        self.magnitude_channels = Some(channels.to_string());
    }

    pub fn clear_magnitude(&mut self) {
        self.magnitude = None;
        self.magnitude_channels = None;
    }

    /// Whether the station magnitude enters the network magnitude.
    pub fn magnitude_use(&self) -> bool {
        self.magnitude_use
    }

    pub fn set_magnitude_use(&mut self, used: bool) {
        self.magnitude_use = used;
    }

    pub fn distances(&self) -> Option<&Distances> {
        self.distances.as_ref()
    }

    pub fn set_distances(&mut self, distances: Distances) {
        self.distances = Some(distances);
    }

    pub fn clear_distances(&mut self) {
        self.distances = None;
    }

    pub fn has_pick(&self) -> bool {
        self.p.has_pick() || self.s.has_pick()
    }

    /// A station is used by a location when it has a synthetic P or S pick.
    pub fn is_used(&self) -> bool {
        self.p.has_synthetic() || self.s.has_synthetic()
    }

    /// Reset everything except the station identity.
    pub fn clear_all(&mut self) {
        *self = PickRecord::new(&self.station);
    }

    /// Reset the fields a location or magnitude run derives, keeping the
    /// manual picks and their annotations.
    pub fn clear_event(&mut self) {
        self.p.clear_solution();
        self.s.clear_solution();
        for bracket in self.amplitudes.iter_mut() {
            bracket.clear();
        }
        self.clear_magnitude();
        self.magnitude_use = true;
        self.distances = None;
    }
}

/// Per-station pick records of one session, in catalog order.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct PickStore {
    records: Vec<PickRecord>,
}

impl PickStore {
    /// One empty record per catalog station.
    pub fn for_catalog(catalog: &StationCatalog) -> PickStore {
        PickStore {
            records: catalog.iter().map(|s| PickRecord::new(&s.code)).collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&PickRecord> {
        self.records.iter().find(|r| r.station == code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut PickRecord> {
        self.records.iter_mut().find(|r| r.station == code)
    }

    /// Like [`PickStore::get_mut`], but a missing station is an error.
    pub fn record_mut(&mut self, code: &str) -> Result<&mut PickRecord> {
        self.get_mut(code)
            .ok_or_else(|| CoreError::StationNotFound(code.to_string()))
    }

    pub fn records(&self) -> &[PickRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &PickRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PickRecord> {
        self.records.iter_mut()
    }

    /// Catalog stations paired with their records.
    pub fn with_stations<'a>(
        &'a self,
        catalog: &'a StationCatalog,
    ) -> impl Iterator<Item = (&'a StationRecord, &'a PickRecord)> + 'a {
        self.records
            .iter()
            .filter_map(move |r| catalog.get(&r.station).map(|s| (s, r)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear_all(&mut self) {
        self.records.iter_mut().for_each(PickRecord::clear_all);
    }

    pub fn clear_event(&mut self) {
        self.records.iter_mut().for_each(PickRecord::clear_event);
    }

    /// Drop the synthetic picks and angles of a previous location run.
    pub fn clear_synthetics(&mut self) {
        for record in self.records.iter_mut() {
            record.p.clear_solution();
            record.s.clear_solution();
        }
    }

    pub fn used_station_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_used()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pick::{AmplitudeExtremum, Onset, Polarity};
    use crate::testing::*;

    fn populated_store() -> PickStore {
        let catalog = test_catalog();
        let mut store = PickStore::for_catalog(&catalog);
        let record = store.get_mut("RJOB").unwrap();
        record.set_p(100);
        record.p.set_error(90);
        record.p.set_error(110);
        record.p.set_onset(Onset::Impulsive);
        record.p.set_polarity(Polarity::Up);
        record.p.set_weight(1);
        record.p.set_synthetic(102, 0.01);
        record.p.set_angles(40.0, 120.0);
        record.set_s(300, Component::N);
        record.s.set_synthetic(298, -0.01);
        record
            .amplitude_mut(Component::N)
            .unwrap()
            .set_max(AmplitudeExtremum { value: 3.0, sample: 310 });
        record.set_magnitude(1.2, "EHN");
        record.set_magnitude_use(false);
        record.set_distances(Distances::default());
        store
    }

    #[test]
    fn test_store_follows_catalog() {
        let store = PickStore::for_catalog(&test_catalog());
        assert_eq!(store.len(), 3);
        assert!(store.get("RMOA").unwrap().magnitude_use());
        assert!(store.get("XXXX").is_none());
    }

    #[test]
    fn test_record_mut_unknown_station() {
        let mut store = PickStore::for_catalog(&test_catalog());
        assert!(matches!(
            store.record_mut("XXXX"),
            Err(CoreError::StationNotFound(_))
        ));
    }

    #[test]
    fn test_min_after_max_on_record() {
        let mut record = PickRecord::new("RJOB");
        let bracket = record.amplitude_mut(Component::N).unwrap();
        bracket.set_max(AmplitudeExtremum { value: 3.0, sample: 20 });
        bracket.set_min(AmplitudeExtremum { value: 5.0, sample: 25 });
        let bracket = record.amplitude(Component::N).unwrap();
        assert!(bracket.max().is_none());
        assert_eq!(bracket.min().unwrap().value, 5.0);
        assert!(record.amplitude(Component::Z).is_none());
    }

    #[test]
    fn test_clear_s_pick_forgets_component() {
        let mut record = PickRecord::new("RJOB");
        record.set_s(500, Component::E);
        assert_eq!(record.time_component(Phase::S), Component::E);
        record.clear_pick(Phase::S);
        assert_eq!(record.s_component(), None);
        assert_eq!(record.time_component(Phase::S), Component::Z);
        record.clear_pick(Phase::S);
        assert!(!record.has_pick());
    }

    #[test]
    fn test_clear_all_restores_magnitude_use() {
        let mut store = populated_store();
        store.clear_all();
        let record = store.get("RJOB").unwrap();
        assert!(record.magnitude_use());
        assert_eq!(record, &PickRecord::new("RJOB"));
        assert_eq!(store.used_station_count(), 0);
    }

    #[test]
    fn test_clear_event_keeps_manual_picks() {
        let mut store = populated_store();
        assert_eq!(store.used_station_count(), 1);
        store.clear_event();
        let record = store.get("RJOB").unwrap();
        assert_eq!(record.p().pick(), Some(100));
        assert_eq!(record.p().bracket_width(), Some(20));
        assert_eq!(record.p().onset(), Some(Onset::Impulsive));
        assert_eq!(record.p().weight(), Some(1));
        assert_eq!(record.s().pick(), Some(300));
        assert_eq!(record.s_component(), Some(Component::N));
        assert_eq!(record.p().synthetic(), None);
        assert_eq!(record.p().azimuth(), None);
        assert_eq!(record.magnitude(), None);
        assert!(record.magnitude_use());
        assert!(record.distances().is_none());
        assert!(record.amplitude(Component::N).unwrap().max().is_none());
        assert_eq!(store.used_station_count(), 0);
    }

    #[test]
    fn test_clear_synthetics_only() {
        let mut store = populated_store();
        store.clear_synthetics();
        let record = store.get("RJOB").unwrap();
        assert_eq!(record.magnitude(), Some(1.2));
        assert!(!record.is_used());
    }

    #[test]
    fn test_with_stations_pairs_by_code() {
        let catalog = test_catalog();
        let store = PickStore::for_catalog(&catalog);
        let codes: Vec<_> = store
            .with_stations(&catalog)
            .map(|(s, r)| (s.code.as_str(), r.station()))
            .collect();
        assert_eq!(codes, vec![("RJOB", "RJOB"), ("RMOA", "RMOA"), ("RNON", "RNON")]);
    }
}
