//! Session state to event XML.
//!
//! Every element of the exchange layout is always written; values that are
//! not known are written as empty elements.

use crate::dom::Element;
use crate::error::Result;
use spk_core::pick::{Phase, PhasePick};
use spk_core::solution::EventSolution;
use spk_core::station::{StationCatalog, StationRecord, TraceStats};
use spk_core::store::{PickRecord, PickStore};
use spk_utils::dates;

fn pick_element(
    station: &StationRecord,
    record: &PickRecord,
    phase: Phase,
    trace: &TraceStats,
    sample: i64,
) -> Element {
    let pick: &PhasePick = record.phase(phase);
    let mut element = Element::new("pick");
    element.push(
        Element::new("waveform")
            .attribute("networkCode", &trace.network)
            .attribute("stationCode", &trace.station)
            .attribute("channelCode", &trace.channel)
            .attribute("locationCode", &trace.location),
    );

    let time = element.push(Element::new("time"));
    time.push(Element::with_text(
        "value",
        dates::format_iso(&trace.time_of_sample(sample)),
    ));
    // half the bracket width
    let uncertainty = pick
        .bracket_width()
        .map(|w| trace.samples_to_seconds(w) / 2.0);
    time.push(Element::optional("uncertainty", uncertainty));

    element.push(Element::with_text("phaseHint", phase.to_string()));
    element.push(Element::optional("onset", pick.onset().map(|o| o.as_str())));
    element.push(Element::optional(
        "polarity",
        pick.polarity().map(|p| p.exchange_name()),
    ));
    element.push(Element::optional("weight", pick.weight()));
    element.push(Element::value::<f64>("min_amp", None));

    if pick.has_synthetic() {
        let distances = record.distances();
        element.push(Element::new("phase_compu"));
        element.push(Element::value("phase_res", pick.residual()));
        element.push(Element::value("phase_weight", pick.solver_weight()));
        element.push(Element::value::<f64>("phase_delay", None));
        element.push(Element::value("azimuth", pick.azimuth()));
        element.push(Element::value("incident", pick.incidence()));
        element.push(Element::value("epi_dist", distances.map(|d| d.epicentral)));
        element.push(Element::value("hyp_dist", distances.map(|d| d.hypocentral)));
    }
    log::debug!("encoded {} pick of {}", phase, station.code);
    element
}

fn origin_element(catalog: &StationCatalog, solution: &EventSolution) -> Element {
    let mut origin = Element::new("origin");

    let time = origin.push(Element::new("time"));
    time.push(Element::optional(
        "value",
        solution.origin_time.as_ref().map(dates::format_iso),
    ));
    time.push(Element::new("uncertainty"));

    for (name, value, uncertainty) in [
        ("latitude", solution.latitude, solution.error_y),
        ("longitude", solution.longitude, solution.error_x),
        ("depth", solution.depth, solution.error_z),
    ] {
        let element = origin.push(Element::new(name));
        element.push(Element::optional("value", value));
        element.push(Element::optional("uncertainty", uncertainty));
    }
    origin.push(Element::with_text("depth_type", "from location program"));
    origin.push(Element::optional("earth_mod", solution.velocity_model.as_deref()));
    origin.push(Element::new("originUncertainty"));

    let used_phases = solution.used_phase_count();
    let quality = origin.push(Element::new("originQuality"));
    quality.push(Element::optional("P_usedPhaseCount", solution.p_phase_count));
    quality.push(Element::optional("S_usedPhaseCount", solution.s_phase_count));
    quality.push(Element::optional("usedPhaseCount", used_phases));
    quality.push(Element::optional("usedStationCount", solution.used_station_count));
    quality.push(Element::optional("associatedPhaseCount", used_phases));
    quality.push(Element::with_text(
        "associatedStationCount",
        catalog.len().to_string(),
    ));
    quality.push(Element::with_text("depthPhaseCount", "0"));
    quality.push(Element::optional("standardError", solution.standard_error));
    quality.push(Element::optional(
        "secondaryAzimuthalGap",
        solution.azimuthal_gap,
    ));
    quality.push(Element::new("groundTruthLevel"));
    let distances = solution.distances;
    quality.push(Element::optional("minimumDistance", distances.map(|d| d.min)));
    quality.push(Element::optional("maximumDistance", distances.map(|d| d.max)));
    quality.push(Element::optional("medianDistance", distances.map(|d| d.median)));
    origin
}

fn magnitude_element(solution: &EventSolution) -> Element {
    let network = solution.magnitude.filter(|m| !m.value.is_nan());
    let mut magnitude = Element::new("magnitude");
    let mag = magnitude.push(Element::new("mag"));
    mag.push(Element::optional("value", network.map(|m| m.value)));
    mag.push(Element::optional(
        "uncertainty",
        network.map(|m| m.variance).filter(|v| !v.is_nan()),
    ));
    magnitude.push(Element::with_text("type", "Ml"));
    magnitude.push(Element::optional(
        "stationCount",
        solution.magnitude.map(|m| m.station_count),
    ));
    magnitude
}

fn station_magnitude_element(record: &PickRecord, value: f64, station_count: usize) -> Element {
    let mut element = Element::new("stationMagnitude");
    let mag = element.push(Element::new("mag"));
    mag.push(Element::with_text("value", value.to_string()));
    mag.push(Element::new("uncertainty"));
    element.push(Element::with_text("station", record.station()));
    let weight = if record.magnitude_use() && station_count > 0 {
        (1.0 / station_count as f64).to_string()
    } else {
        "0".to_string()
    };
    element.push(Element::with_text("weight", weight));
    element.push(Element::optional("channels", record.magnitude_channels()));
    element
}

/// Build the event document of the current session.
pub fn encode_event(
    catalog: &StationCatalog,
    store: &PickStore,
    solution: &EventSolution,
) -> Result<String> {
    let mut event = Element::new("event");
    event.push(Element::value("event_id", solution.event_id.as_deref()));
    event.push(Element::value("event_type", Some("manual")));

    for (station, record) in store.with_stations(catalog) {
        for phase in [Phase::P, Phase::S] {
            let Some(sample) = record.phase(phase).pick() else {
                continue;
            };
            let trace = station
                .trace(record.time_component(phase))
                .unwrap_or_else(|| station.reference_trace());
            event.push(pick_element(station, record, phase, trace, sample));
        }
    }

    event.push(origin_element(catalog, solution));
    event.push(magnitude_element(solution));

    let station_count = solution
        .magnitude
        .map(|m| m.station_count)
        .unwrap_or_else(|| {
            store
                .iter()
                .filter(|r| r.magnitude_use() && r.magnitude().is_some())
                .count()
        });
    for record in store.iter() {
        if let Some(value) = record.magnitude() {
            event.push(station_magnitude_element(record, value, station_count));
        }
    }
    event.to_xml()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spk_core::pick::{Onset, Polarity};
    use spk_core::solution::NetworkMagnitude;
    use spk_core::station::Component;
    use spk_core::testing::*;

    #[test]
    fn test_empty_session_has_full_skeleton() {
        let catalog = test_catalog();
        let store = PickStore::for_catalog(&catalog);
        let xml = encode_event(&catalog, &store, &EventSolution::default()).unwrap();
        let root = Element::parse(&xml).unwrap();
        assert_eq!(root.text_at(&["event_type", "value"]), Some("manual"));
        assert!(root.find(&["event_id", "value"]).is_some());
        assert_eq!(root.children("pick").count(), 0);
        assert!(root.find(&["origin", "latitude", "uncertainty"]).is_some());
        assert_eq!(
            root.text_at(&["origin", "originQuality", "associatedStationCount"]),
            Some("3")
        );
        assert!(root.find(&["magnitude", "mag", "value"]).is_some());
        assert_eq!(root.text_at(&["magnitude", "mag", "value"]), None);
        assert_eq!(root.children("stationMagnitude").count(), 0);
    }

    #[test]
    fn test_s_pick_uses_its_channel() {
        let catalog = test_catalog();
        let mut store = PickStore::for_catalog(&catalog);
        let record = store.get_mut("RMOA").unwrap();
        record.set_s(4020, Component::E);
        record.phase_mut(Phase::S).set_bracket(10);
        record.phase_mut(Phase::S).set_onset(Onset::Emergent);
        record.phase_mut(Phase::S).set_polarity(Polarity::PoorDown);
        let xml = encode_event(&catalog, &store, &EventSolution::default()).unwrap();
        let root = Element::parse(&xml).unwrap();
        let pick = root.child("pick").unwrap();
        assert_eq!(pick.find(&["waveform"]).unwrap().attr("channelCode"), Some("EHE"));
        assert_eq!(pick.text_at(&["phaseHint"]), Some("S"));
        assert_eq!(
            pick.text_at(&["time", "value"]),
            Some("2009-12-27T10:53:00.100000")
        );
        assert_eq!(pick.text_at(&["time", "uncertainty"]), Some("0.05"));
        assert_eq!(pick.text_at(&["polarity"]), Some("negative"));
        assert_eq!(pick.text_at(&["weight"]), None);
        assert!(pick.child("phase_res").is_none());
    }

    #[test]
    fn test_station_magnitude_weights() {
        let catalog = test_catalog();
        let mut store = PickStore::for_catalog(&catalog);
        store.get_mut("RJOB").unwrap().set_magnitude(1.0, "EHN,EHE");
        store.get_mut("RNON").unwrap().set_magnitude(2.0, "EHN");
        store.get_mut("RMOA").unwrap().set_magnitude(9.0, "EHE");
        store.get_mut("RMOA").unwrap().set_magnitude_use(false);
        let solution = EventSolution {
            magnitude: Some(NetworkMagnitude {
                value: 1.5,
                variance: 0.25,
                station_count: 2,
            }),
            ..Default::default()
        };
        let xml = encode_event(&catalog, &store, &solution).unwrap();
        let root = Element::parse(&xml).unwrap();
        assert_eq!(root.text_at(&["magnitude", "mag", "uncertainty"]), Some("0.25"));
        assert_eq!(root.text_at(&["magnitude", "stationCount"]), Some("2"));
        let weights: Vec<_> = root
            .children("stationMagnitude")
            .map(|m| (m.text_at(&["station"]).unwrap(), m.text_at(&["weight"]).unwrap()))
            .collect();
        assert_eq!(weights, vec![("RJOB", "0.5"), ("RMOA", "0"), ("RNON", "0.5")]);
    }
}
