//! hyp2000, the regional location program.
//!
//! Stations and phases are handed over in fixed-column files; the printed
//! report is read back by locating its section headers and slicing the
//! following lines at fixed offsets.

use crate::error::{LocateError, Result};
use crate::process;
use crate::LocationSolver;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use spk_core::pick::{Onset, Phase, PhasePick, Polarity};
use spk_core::solution::{new_event_id, EventSolution, LocationType};
use spk_core::station::{StationCatalog, StationRecord};
use spk_core::store::PickStore;
use spk_utils::columns::{char_at, field, parse_field};
use spk_utils::dates;
use std::collections::BTreeMap;
use std::path::PathBuf;

const ORIGIN_HEADER: &str = " YEAR MO DA  --ORIGIN--";
const MODEL_HEADER: &str = " NSTA NPHS  DMIN MODEL";
const PHASE_HEADER: &str = " STA NET COM L CR DIST AZM";

/// Where and how hyp2000 is run. The control file is fed on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyp2000Settings {
    pub working_dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub control_file: String,
    pub phase_file: String,
    pub station_file: String,
    pub summary_file: String,
    pub env: BTreeMap<String, String>,
}

impl Default for Hyp2000Settings {
    fn default() -> Self {
        Hyp2000Settings {
            working_dir: PathBuf::from("/baysoft/obspyck/hyp_2000"),
            program: "hyp2000".to_string(),
            args: Vec::new(),
            control_file: "bay2000.inp".to_string(),
            phase_file: "hyp2000.pha".to_string(),
            station_file: "stations.dat".to_string(),
            summary_file: "hypo.prt".to_string(),
            env: BTreeMap::new(),
        }
    }
}

/// Origin section of a hyp2000 report.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyp2000Origin {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub rms: f64,
    pub error_xy: f64,
    pub error_z: f64,
}

/// One phase line of the station table.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyp2000Phase {
    pub station: String,
    pub phase: Phase,
    pub azimuth: f64,
    pub incidence: f64,
    pub onset: Option<Onset>,
    pub polarity: Option<Polarity>,
    pub residual: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hyp2000Report {
    pub origin: Hyp2000Origin,
    pub model: String,
    pub azimuthal_gap: f64,
    pub phases: Vec<Hyp2000Phase>,
}

fn degrees_minutes(value: f64) -> (i64, f64) {
    let value = value.abs();
    let degrees = value.trunc();
    (degrees as i64, (value - degrees) * 60.0)
}

/// Longitude block, then latitude block, then elevation in whole metres.
/// The hemisphere letters keep their fixed slots: `N`/`S` after the first
/// block, `E`/`W` after the second.
fn station_line(station: &StationRecord) -> String {
    let (lon_deg, lon_min) = degrees_minutes(station.longitude);
    let (lat_deg, lat_min) = degrees_minutes(station.latitude);
    let ns = if station.latitude < 0.0 { 'S' } else { 'N' };
    let ew = if station.longitude < 0.0 { 'W' } else { 'E' };
    let elevation_m = (station.elevation * 1000.0).round() as i64;
    format!(
        "{:>6}{:>2}{:5.2}{}{:>3}{:5.2}{}{:>4}\n",
        station.code, lon_deg, lon_min, ns, lat_deg, lat_min, ew, elevation_m
    )
}

/// Station file: coordinates of every catalog station.
pub fn encode_stations(catalog: &StationCatalog) -> String {
    catalog.iter().map(station_line).collect()
}

fn phase_codes(pick: &PhasePick) -> (char, char, u8) {
    (
        pick.onset().map(|o| o.code()).unwrap_or('I'),
        pick.polarity().map(|p| p.code()).unwrap_or('?'),
        pick.weight().unwrap_or(0),
    )
}

/// Phase file: one line per station with a P pick, S appended when present.
pub fn encode_phases(catalog: &StationCatalog, store: &PickStore) -> String {
    let mut out = String::new();
    for (station, record) in store.with_stations(catalog) {
        let Some(p_sample) = record.p().pick() else {
            if record.s().has_pick() {
                warn!("{}: S pick without P pick, not passed to hyp2000", station.code);
            }
            continue;
        };
        let p_time = station.reference_trace().time_of_sample(p_sample);
        let (onset, polarity, weight) = phase_codes(record.p());
        out.push_str(&format!(
            "{:>4}{}P{}{} {}",
            station.code,
            onset,
            polarity,
            weight,
            dates::format_hyp2000(&p_time)
        ));
        if let Some(s_sample) = record.s().pick() {
            let trace = station
                .trace(record.time_component(Phase::S))
                .unwrap_or_else(|| station.reference_trace());
            let s_time = trace.time_of_sample(s_sample);
            let (onset, polarity, weight) = phase_codes(record.s());
            out.push_str(&format!(
                "{:>12}{}S{}{}",
                dates::format_hyp2000_time(&s_time),
                onset,
                polarity,
                weight
            ));
        }
        out.push('\n');
    }
    out
}

fn required<T: std::str::FromStr>(line: &str, n: usize, start: usize, end: usize) -> Result<T> {
    parse_field(line, start, end).ok_or_else(|| {
        LocateError::malformed(
            n,
            format!("bad field [{}:{}]: {:?}", start, end, field(line, start, end)),
        )
    })
}

fn find_header<'a, I>(lines: &mut I, header: &str) -> Result<()>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    if lines.any(|(_, l)| l.starts_with(header)) {
        Ok(())
    } else {
        Err(LocateError::NoLocation(format!("header {:?} not found", header.trim())))
    }
}

fn parse_origin(line: &str, n: usize) -> Result<Hyp2000Origin> {
    let time = dates::from_parts(
        required(line, n, 1, 5)?,
        required(line, n, 6, 8)?,
        required(line, n, 9, 11)?,
        required(line, n, 13, 15)?,
        required(line, n, 15, 17)?,
        required(line, n, 18, 23)?,
    )
    .ok_or_else(|| LocateError::malformed(n, "invalid origin time"))?;
    let lat_deg: f64 = required(line, n, 25, 27)?;
    let lat_min: f64 = required(line, n, 28, 33)?;
    let mut latitude = lat_deg + lat_min / 60.0;
    if char_at(line, 27) == Some('S') {
        latitude = -latitude;
    }
    let lon_deg: f64 = required(line, n, 35, 38)?;
    let lon_min: f64 = required(line, n, 39, 44)?;
    let mut longitude = lon_deg + lon_min / 60.0;
    if matches!(char_at(line, 38), Some(' ') | None) {
        longitude = -longitude;
    }
    Ok(Hyp2000Origin {
        time,
        latitude,
        longitude,
        depth: required(line, n, 46, 51)?,
        rms: required(line, n, 52, 57)?,
        error_xy: required(line, n, 58, 63)?,
        error_z: required(line, n, 64, 69)?,
    })
}

/// Parse a complete hyp2000 print report.
pub fn parse_report(text: &str) -> Result<Hyp2000Report> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    find_header(&mut lines, ORIGIN_HEADER)?;
    let (n, line) = lines
        .next()
        .ok_or_else(|| LocateError::NoLocation("origin line missing".to_string()))?;
    let origin = parse_origin(line, n)?;

    find_header(&mut lines, MODEL_HEADER)?;
    let (n, line) = lines
        .next()
        .ok_or_else(|| LocateError::NoLocation("model line missing".to_string()))?;
    let model = field(line, 17, 22).trim().to_string();
    let azimuthal_gap = required(line, n, 23, 26)?;

    find_header(&mut lines, PHASE_HEADER)?;
    let mut phases = Vec::new();
    let mut previous: Option<&str> = None;
    for (n, line) in lines {
        let phase = match char_at(line, 32) {
            Some('P') => Phase::P,
            Some('S') => Phase::S,
            _ => {
                previous = Some(line);
                continue;
            }
        };
        // a blank station column continues the station of the line above
        let source = if field(line, 0, 6).trim().is_empty() {
            previous.ok_or_else(|| LocateError::malformed(n, "continuation without station"))?
        } else {
            line
        };
        phases.push(Hyp2000Phase {
            station: field(source, 0, 6).trim().to_string(),
            phase,
            azimuth: required(source, n, 23, 26)?,
            incidence: required(source, n, 27, 30)?,
            onset: char_at(line, 31).and_then(Onset::from_code),
            polarity: char_at(line, 33).and_then(Polarity::from_code),
            residual: required(line, n, 61, 66)?,
            weight: required(line, n, 68, 72)?,
        });
        previous = Some(line);
    }
    Ok(Hyp2000Report {
        origin,
        model,
        azimuthal_gap,
        phases,
    })
}

/// Keep a "poor" qualifier when the decoded direction agrees with it.
fn merge_polarity(current: Option<Polarity>, decoded: Polarity) -> Polarity {
    match current {
        Some(p) if p.is_up() == decoded.is_up() => p,
        _ => decoded,
    }
}

/// Write a parsed report into the session.
pub fn apply_report(
    report: &Hyp2000Report,
    catalog: &StationCatalog,
    store: &mut PickStore,
    solution: &mut EventSolution,
) {
    store.clear_synthetics();
    let (mut p_count, mut s_count) = (0, 0);
    for phase in &report.phases {
        let (Some(station), Some(record)) = (catalog.get(&phase.station), store.get_mut(&phase.station))
        else {
            warn!(
                "did not find matching station for {} pick of {:?}",
                phase.phase, phase.station
            );
            continue;
        };
        let trace = station
            .trace(record.time_component(phase.phase))
            .unwrap_or_else(|| station.reference_trace());
        let offset = trace.seconds_to_samples(phase.residual);
        let pick = record.phase_mut(phase.phase);
        let Some(manual) = pick.pick() else {
            warn!("{} {}: no manual pick for residual, skipped", phase.station, phase.phase);
            continue;
        };
        match phase.phase {
            Phase::P => p_count += 1,
            Phase::S => s_count += 1,
        }
        pick.set_synthetic(manual + offset, phase.residual);
        pick.set_solver_weight(phase.weight);
        pick.set_angles(phase.azimuth, phase.incidence);
        if let Some(onset) = phase.onset {
            pick.set_onset(onset);
        }
        if let Some(polarity) = phase.polarity {
            let merged = merge_polarity(pick.polarity(), polarity);
            pick.set_polarity(merged);
        }
    }

    let origin = &report.origin;
    solution.location_type = LocationType::Hyp2000;
    solution.origin_time = Some(origin.time);
    solution.longitude = Some(origin.longitude);
    solution.latitude = Some(origin.latitude);
    solution.depth = Some(origin.depth);
    solution.error_x = Some(origin.error_xy);
    solution.error_y = Some(origin.error_xy);
    solution.error_z = Some(origin.error_z);
    solution.standard_error = Some(origin.rms);
    solution.azimuthal_gap = Some(report.azimuthal_gap);
    solution.velocity_model = Some(report.model.clone());
    solution.p_phase_count = Some(p_count);
    solution.s_phase_count = Some(s_count);
    solution.used_station_count = Some(store.used_station_count());
}

/// The hyp2000 adapter.
#[derive(Debug, Clone, Default)]
pub struct Hyp2000 {
    settings: Hyp2000Settings,
}

impl Hyp2000 {
    pub fn new(settings: Hyp2000Settings) -> Hyp2000 {
        Hyp2000 { settings }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.settings.working_dir.join(file)
    }
}

impl LocationSolver for Hyp2000 {
    fn location_type(&self) -> LocationType {
        LocationType::Hyp2000
    }

    fn run(
        &self,
        catalog: &StationCatalog,
        store: &mut PickStore,
        solution: &mut EventSolution,
    ) -> Result<String> {
        let phases = self.path(&self.settings.phase_file);
        let stations = self.path(&self.settings.station_file);
        let summary = self.path(&self.settings.summary_file);
        process::remove_stale(&[&phases, &stations, &summary])?;
        process::write_file(&phases, &encode_phases(catalog, store))?;
        process::write_file(&stations, &encode_stations(catalog))?;

        let mut env = BTreeMap::new();
        env.insert(
            "HYP2000_DATA".to_string(),
            self.settings.working_dir.display().to_string(),
        );
        env.extend(self.settings.env.clone());
        process::run_program(
            &self.settings.program,
            &self.settings.args,
            &self.settings.working_dir,
            &env,
            Some(&self.path(&self.settings.control_file)),
        )?;

        let raw = process::read_output(&summary)?;
        let report = parse_report(&raw)?;
        info!(
            "hyp2000 located event at {:.4} {:.4}, {:.2} km (model {}) with {} phases",
            report.origin.longitude,
            report.origin.latitude,
            report.origin.depth,
            report.model,
            report.phases.len()
        );
        solution.event_id = Some(new_event_id());
        apply_report(&report, catalog, store, solution);
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spk_core::station::Component;
    use spk_core::testing::*;

    /// Build a report line by placing each text at its start column.
    fn place(fields: &[(usize, &str)]) -> String {
        let mut line: Vec<char> = Vec::new();
        for (start, text) in fields {
            for (i, c) in text.chars().enumerate() {
                let idx = start + i;
                if line.len() <= idx {
                    line.resize(idx + 1, ' ');
                }
                line[idx] = c;
            }
        }
        line.into_iter().collect()
    }

    fn phase_line(station: &str, az: &str, inc: &str, onset: &str, phase: &str, pol: &str, res: &str) -> String {
        place(&[
            (0, station),
            (23, az),
            (27, inc),
            (31, onset),
            (32, phase),
            (33, pol),
            (61, res),
            (68, "0.85"),
        ])
    }

    fn report() -> String {
        let origin = place(&[
            (1, "2009"),
            (6, "12"),
            (9, "27"),
            (13, "10"),
            (15, "52"),
            (18, "58.80"),
            (25, "47"),
            (27, "N"),
            (28, "44.50"),
            (35, " 12"),
            (38, "E"),
            (39, "48.00"),
            (46, " 4.50"),
            (52, " 0.12"),
            (58, " 1.10"),
            (64, " 2.30"),
        ]);
        let model = place(&[(0, "    5   7   1.2"), (17, "BAY  "), (23, "123")]);
        [
            " HYPO2000 run".to_string(),
            format!("{}  --ERH-- --ERZ--", ORIGIN_HEADER),
            origin,
            String::new(),
            format!("{} GAP", MODEL_HEADER),
            model,
            String::new(),
            format!("{} TOFF IN", PHASE_HEADER),
            phase_line("  RJOB", "298", "136", "I", "P", "U", "-0.05"),
            phase_line("", "", "", "E", "S", "D", " 0.10"),
            phase_line("  XXXX", " 10", " 90", "I", "P", "U", " 0.01"),
            phase_line("  RMOA", " 45", " 95", "E", "P", "D", " 0.02"),
        ]
        .join("\n")
    }

    fn picked_store() -> (StationCatalog, PickStore) {
        let catalog = test_catalog();
        let mut store = PickStore::for_catalog(&catalog);
        let rjob = store.get_mut("RJOB").unwrap();
        rjob.set_p(3885);
        rjob.phase_mut(Phase::P).set_polarity(Polarity::PoorUp);
        rjob.phase_mut(Phase::P).set_weight(2);
        rjob.set_s(4020, Component::E);
        rjob.phase_mut(Phase::S).set_onset(Onset::Emergent);
        rjob.phase_mut(Phase::S).set_polarity(Polarity::PoorUp);
        store.get_mut("RNON").unwrap().set_s(4100, Component::N);
        (catalog, store)
    }

    #[test]
    fn test_station_line() {
        let catalog = test_catalog();
        let stations = encode_stations(&catalog);
        let first = stations.lines().next().unwrap();
        assert_eq!(first, "  RJOB1247.74N 4744.23E 860");
        assert_eq!(stations.lines().count(), 3);
    }

    #[test]
    fn test_station_line_longitude_first() {
        let station = test_station("BGLD", 13.0125, 47.6523, 0.93);
        assert_eq!(station_line(&station), "  BGLD13 0.75N 4739.14E 930\n");
    }

    #[test]
    fn test_station_line_southern_western() {
        let station = test_station("ABCD", -70.5, -33.25, 0.1234);
        assert_eq!(station_line(&station), "  ABCD7030.00S 3315.00W 123\n");
    }

    #[test]
    fn test_station_elevation_rounds_to_metres() {
        let station = test_station("BGLD", 13.0125, 47.6523, 0.9299999);
        assert!(station_line(&station).ends_with(" 930\n"));
    }

    #[test]
    fn test_phase_lines() {
        let (catalog, store) = picked_store();
        let phases = encode_phases(&catalog, &store);
        let lines: Vec<&str> = phases.lines().collect();
        // RNON has only an S pick
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "RJOBIPU2 091227105259.43   105300.10ESU0");
    }

    #[test]
    fn test_phase_line_without_s() {
        let catalog = test_catalog();
        let mut store = PickStore::for_catalog(&catalog);
        store.get_mut("RMOA").unwrap().set_p(200);
        assert_eq!(encode_phases(&catalog, &store), "RMOAIP?0 091227105241.00\n");
    }

    #[test]
    fn test_parse_report() {
        let report = parse_report(&report()).unwrap();
        assert_eq!(
            dates::format_iso(&report.origin.time),
            "2009-12-27T10:52:58.800000"
        );
        assert!((report.origin.latitude - (47.0 + 44.5 / 60.0)).abs() < 1e-12);
        assert!((report.origin.longitude - 12.8).abs() < 1e-12);
        assert_eq!(report.origin.depth, 4.5);
        assert_eq!(report.origin.rms, 0.12);
        assert_eq!(report.origin.error_xy, 1.1);
        assert_eq!(report.origin.error_z, 2.3);
        assert_eq!(report.model, "BAY");
        assert_eq!(report.azimuthal_gap, 123.0);
        assert_eq!(report.phases.len(), 4);
        assert_eq!(report.phases[0].polarity, Some(Polarity::Up));
        assert_eq!(report.phases[0].weight, 0.85);
    }

    #[test]
    fn test_continuation_line_belongs_to_previous_station() {
        let report = parse_report(&report()).unwrap();
        let s = &report.phases[1];
        assert_eq!(s.station, "RJOB");
        assert_eq!(s.phase, Phase::S);
        assert_eq!(s.azimuth, 298.0);
        assert_eq!(s.incidence, 136.0);
        assert_eq!(s.onset, Some(Onset::Emergent));
        assert_eq!(s.residual, 0.1);
    }

    #[test]
    fn test_hemisphere_flags() {
        let origin = place(&[
            (1, "2009"),
            (6, "12"),
            (9, "27"),
            (13, "10"),
            (15, "52"),
            (18, "58.80"),
            (25, "33"),
            (27, "S"),
            (28, "15.00"),
            (35, " 70"),
            (39, "30.00"),
            (46, " 4.50"),
            (52, " 0.12"),
            (58, " 1.10"),
            (64, " 2.30"),
        ]);
        let origin = parse_origin(&origin, 1).unwrap();
        assert_eq!(origin.latitude, -33.25);
        assert_eq!(origin.longitude, -70.5);
    }

    #[test]
    fn test_missing_header_is_failure() {
        assert!(matches!(
            parse_report("nothing useful here\n"),
            Err(LocateError::NoLocation(_))
        ));
        let truncated = report().replace(PHASE_HEADER, " STATIONS");
        assert!(matches!(parse_report(&truncated), Err(LocateError::NoLocation(_))));
    }

    #[test]
    fn test_apply_report() {
        let (catalog, mut store) = picked_store();
        let mut solution = EventSolution::default();
        let report = parse_report(&report()).unwrap();
        apply_report(&report, &catalog, &mut store, &mut solution);

        let rjob = store.get("RJOB").unwrap();
        assert_eq!(rjob.p().synthetic(), Some(3875));
        assert_eq!(rjob.p().residual(), Some(-0.05));
        assert_eq!(rjob.p().polarity(), Some(Polarity::PoorUp));
        assert_eq!(rjob.p().onset(), Some(Onset::Impulsive));
        assert_eq!(rjob.p().weight(), Some(2));
        assert_eq!(rjob.p().solver_weight(), Some(0.85));
        assert_eq!(rjob.s().synthetic(), Some(4040));
        assert_eq!(rjob.s().polarity(), Some(Polarity::Down));
        assert_eq!(rjob.s().azimuth(), Some(298.0));
        // RMOA has no manual P pick
        assert_eq!(store.get("RMOA").unwrap().p().synthetic(), None);

        assert_eq!(solution.location_type, LocationType::Hyp2000);
        assert_eq!(solution.error_x, Some(1.1));
        assert_eq!(solution.error_y, Some(1.1));
        assert_eq!(solution.standard_error, Some(0.12));
        assert_eq!(solution.velocity_model.as_deref(), Some("BAY"));
        assert_eq!(solution.p_phase_count, Some(1));
        assert_eq!(solution.s_phase_count, Some(1));
        assert_eq!(solution.used_station_count, Some(1));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_feeds_control_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bay2000.inp"), report()).unwrap();
        let settings = Hyp2000Settings {
            working_dir: dir.path().to_path_buf(),
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "test -s hyp2000.pha && test -s stations.dat && cat > hypo.prt".to_string(),
            ],
            ..Default::default()
        };
        let solver = Hyp2000::new(settings);
        let (catalog, mut store) = picked_store();
        let mut solution = EventSolution::default();
        solver.run(&catalog, &mut store, &mut solution).unwrap();
        assert_eq!(solution.location_type, LocationType::Hyp2000);
        assert_eq!(store.get("RJOB").unwrap().p().synthetic(), Some(3875));
    }
}
