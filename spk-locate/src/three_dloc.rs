//! 3dloc, the small-aperture location program.
//!
//! Input is one whitespace-separated line per pick. The report starts with
//! the origin line, followed by one line per phase carrying its residual and
//! ray angles.

use crate::error::{LocateError, Result};
use crate::process;
use crate::LocationSolver;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use spk_core::pick::Phase;
use spk_core::solution::{new_event_id, EventSolution, LocationType};
use spk_core::station::StationCatalog;
use spk_core::store::PickStore;
use spk_utils::dates;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where and how 3dloc is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreeDLocSettings {
    pub working_dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub input_file: String,
    pub output_file: String,
    pub env: BTreeMap<String, String>,
}

impl Default for ThreeDLocSettings {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("D3_VELOCITY".to_string(), "/scratch/rh_vel/vp_5836/".to_string());
        env.insert("D3_VELOCITY_2".to_string(), "/scratch/rh_vel/vs_32220/".to_string());
        ThreeDLocSettings {
            working_dir: PathBuf::from("/baysoft/obspyck/3dloc"),
            program: "3dloc_pitsa".to_string(),
            args: Vec::new(),
            input_file: "3dloc-in".to_string(),
            output_file: "3dloc-out".to_string(),
            env,
        }
    }
}

/// Origin line of a 3dloc report.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeDLocOrigin {
    pub time: DateTime<Utc>,
    pub longitude: f64,
    pub latitude: f64,
    pub depth: f64,
    pub error_x: f64,
    pub error_y: f64,
    pub error_z: f64,
    pub standard_error: f64,
    pub azimuthal_gap: f64,
}

/// One phase line of a 3dloc report. `observed` is the picked time as
/// written to the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeDLocPhase {
    pub station: String,
    pub phase: Phase,
    pub observed: DateTime<Utc>,
    pub residual: f64,
    pub azimuth: f64,
    pub incidence: f64,
}

impl ThreeDLocPhase {
    /// Theoretical arrival time.
    pub fn synthetic_time(&self) -> DateTime<Utc> {
        dates::offset_seconds(&self.observed, self.residual)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreeDLocReport {
    pub origin: ThreeDLocOrigin,
    pub phases: Vec<ThreeDLocPhase>,
}

/// Build the input file: one line per P or S pick, stations in catalog order.
pub fn encode_input(catalog: &StationCatalog, store: &PickStore) -> String {
    let mut out = String::new();
    for (station, record) in store.with_stations(catalog) {
        for phase in [Phase::P, Phase::S] {
            let pick = record.phase(phase);
            let Some(sample) = pick.pick() else {
                continue;
            };
            let trace = station
                .trace(record.time_component(phase))
                .unwrap_or_else(|| station.reference_trace());
            let time = trace.time_of_sample(sample);
            let delta = pick
                .bracket_width()
                .map(|w| trace.samples_to_seconds(w))
                .unwrap_or(0.0);
            out.push_str(&format!(
                "{:>4}  {}        {} {:5.3} -999.0 0.000 -999. 0.000 T__DR_ {:9.6} {:9.6} {:8.6}\n",
                station.code,
                phase,
                dates::format_3dloc(&time),
                delta,
                station.longitude,
                station.latitude,
                station.elevation
            ));
        }
    }
    out
}

fn number<T: std::str::FromStr>(tokens: &[&str], idx: usize, line: usize) -> Result<T> {
    let token = tokens
        .get(idx)
        .ok_or_else(|| LocateError::malformed(line, format!("missing field {}", idx)))?;
    token
        .parse::<T>()
        .map_err(|_| LocateError::malformed(line, format!("bad field {}: {:?}", idx, token)))
}

fn timestamp(tokens: &[&str], start: usize, line: usize) -> Result<DateTime<Utc>> {
    dates::from_parts(
        number(tokens, start, line)?,
        number(tokens, start + 1, line)?,
        number(tokens, start + 2, line)?,
        number(tokens, start + 3, line)?,
        number(tokens, start + 4, line)?,
        number(tokens, start + 5, line)?,
    )
    .ok_or_else(|| LocateError::malformed(line, "invalid date"))
}

/// Parse a complete 3dloc report.
pub fn parse_output(text: &str) -> Result<ThreeDLocReport> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let (n, first) = lines
        .next()
        .ok_or_else(|| LocateError::NoLocation("empty 3dloc report".to_string()))?;
    let tokens: Vec<&str> = first.split_whitespace().collect();
    let line = n + 1;
    let origin = ThreeDLocOrigin {
        time: timestamp(&tokens, 2, line)?,
        longitude: number(&tokens, 8, line)?,
        latitude: number(&tokens, 9, line)?,
        depth: number(&tokens, 10, line)?,
        error_x: number(&tokens, 11, line)?,
        error_y: number(&tokens, 12, line)?,
        error_z: number(&tokens, 13, line)?,
        standard_error: number(&tokens, 14, line)?,
        azimuthal_gap: number(&tokens, 15, line)?,
    };

    let mut phases = Vec::new();
    for (n, text) in lines {
        let line = n + 1;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some(phase) = tokens.get(1).and_then(|p| p.parse::<Phase>().ok()) else {
            warn!("3dloc report line {}: unknown phase, skipped", line);
            continue;
        };
        phases.push(ThreeDLocPhase {
            station: tokens[0].trim().to_string(),
            phase,
            observed: timestamp(&tokens, 2, line)?,
            residual: number(&tokens, 8, line)?,
            azimuth: number(&tokens, 9, line)?,
            incidence: number(&tokens, 10, line)?,
        });
    }
    Ok(ThreeDLocReport { origin, phases })
}

/// Write a parsed report into the session.
pub fn apply_report(
    report: &ThreeDLocReport,
    catalog: &StationCatalog,
    store: &mut PickStore,
    solution: &mut EventSolution,
    velocity_model: &str,
) {
    store.clear_synthetics();
    let (mut p_count, mut s_count) = (0, 0);
    for phase in &report.phases {
        let (Some(station), Some(record)) = (catalog.get(&phase.station), store.get_mut(&phase.station))
        else {
            warn!("{} {}: station not in session, skipped", phase.station, phase.phase);
            continue;
        };
        match phase.phase {
            Phase::P => p_count += 1,
            Phase::S => s_count += 1,
        }
        let trace = station
            .trace(record.time_component(phase.phase))
            .unwrap_or_else(|| station.reference_trace());
        let synthetic = phase.synthetic_time();
        if !trace.covers(&synthetic) {
            warn!(
                "{} {}: synthetic pick {} outside trace",
                phase.station,
                phase.phase,
                dates::format_iso(&synthetic)
            );
            continue;
        }
        let pick = record.phase_mut(phase.phase);
        pick.set_synthetic(trace.sample_at(&synthetic), phase.residual);
        pick.set_angles(phase.azimuth, phase.incidence);
    }

    let origin = &report.origin;
    solution.location_type = LocationType::ThreeDLoc;
    solution.origin_time = Some(origin.time);
    solution.longitude = Some(origin.longitude);
    solution.latitude = Some(origin.latitude);
    solution.depth = Some(origin.depth);
    solution.error_x = Some(origin.error_x);
    solution.error_y = Some(origin.error_y);
    solution.error_z = Some(origin.error_z);
    solution.standard_error = Some(origin.standard_error);
    solution.azimuthal_gap = Some(origin.azimuthal_gap);
    solution.velocity_model = Some(velocity_model.to_string());
    solution.p_phase_count = Some(p_count);
    solution.s_phase_count = Some(s_count);
    solution.used_station_count = Some(store.used_station_count());
}

/// The 3dloc adapter.
#[derive(Debug, Clone)]
pub struct ThreeDLoc {
    settings: ThreeDLocSettings,
    velocity_model: String,
}

impl ThreeDLoc {
    pub fn new(settings: ThreeDLocSettings, velocity_model: &str) -> ThreeDLoc {
        ThreeDLoc {
            settings,
            velocity_model: velocity_model.to_string(),
        }
    }

    fn input_path(&self) -> PathBuf {
        self.settings.working_dir.join(&self.settings.input_file)
    }

    fn output_path(&self) -> PathBuf {
        self.settings.working_dir.join(&self.settings.output_file)
    }
}

impl LocationSolver for ThreeDLoc {
    fn location_type(&self) -> LocationType {
        LocationType::ThreeDLoc
    }

    fn run(
        &self,
        catalog: &StationCatalog,
        store: &mut PickStore,
        solution: &mut EventSolution,
    ) -> Result<String> {
        let (input, output) = (self.input_path(), self.output_path());
        process::remove_stale(&[&input, &output])?;
        process::write_file(&input, &encode_input(catalog, store))?;
        process::run_program(
            &self.settings.program,
            &self.settings.args,
            &self.settings.working_dir,
            &self.settings.env,
            None,
        )?;
        let raw = process::read_output(&output)?;
        let report = parse_output(&raw)?;
        info!(
            "3dloc located event at {:.4} {:.4}, {:.2} km with {} phases",
            report.origin.longitude,
            report.origin.latitude,
            report.origin.depth,
            report.phases.len()
        );
        solution.event_id = Some(new_event_id());
        apply_report(&report, catalog, store, solution, &self.velocity_model);
        Ok(raw)
    }
}
