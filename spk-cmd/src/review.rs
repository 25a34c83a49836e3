//! Local review operations: locate, magnitude and clear.

use crate::config::Config;
use crate::session::{AmplitudePick, Session};
use crate::Solver;
use anyhow::Context;
use log::{info, warn};
use spk_locate::{Hyp2000, LocationSolver, ThreeDLoc};
use std::path::Path;

pub fn solver_for(config: &Config, solver: Solver) -> Box<dyn LocationSolver> {
    match solver {
        Solver::ThreeDLoc => Box::new(ThreeDLoc::new(
            config.three_dloc.clone(),
            &config.velocity_model,
        )),
        Solver::Hyp2000 => Box::new(Hyp2000::new(config.hyp2000.clone())),
    }
}

pub fn read_amplitudes(path: &Path) -> anyhow::Result<Vec<AmplitudePick>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read amplitudes {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid amplitudes {}", path.display()))
}

/// Write to `output`, or to stdout without one.
pub fn write_output(xml: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, xml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", xml),
    }
    Ok(())
}

/// Magnitudes after a change of picks or location. Station magnitudes are
/// only recomputed when amplitude picks are available.
fn refresh_magnitudes(session: &mut Session, amplitudes: Option<&Path>) -> anyhow::Result<()> {
    let recompute = match amplitudes {
        Some(path) => {
            let picks = read_amplitudes(path)?;
            let applied = session.apply_amplitudes(&picks);
            info!("Applied {} of {} amplitude picks", applied, picks.len());
            true
        }
        None => false,
    };
    let network = session.update_magnitudes(recompute);
    if network.station_count == 0 {
        warn!("No station magnitudes, network magnitude undefined");
    }
    Ok(())
}

/// Station magnitudes depend on the hypocentral distances, so a new location
/// keeps them only when they can be derived again from amplitude picks.
fn magnitudes_after_location(
    session: &mut Session,
    amplitudes: Option<&Path>,
) -> anyhow::Result<()> {
    if amplitudes.is_some() {
        return refresh_magnitudes(session, amplitudes);
    }
    let cleared = session.clear_magnitudes();
    if cleared > 0 {
        warn!(
            "No amplitude picks, dropped {} station magnitudes of the previous location",
            cleared
        );
    }
    Ok(())
}

pub fn run_locate(
    config: &Config,
    manifest: &Path,
    solver: Solver,
    event: &Path,
    amplitudes: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = Session::from_manifest(manifest)?;
    session.load_event_file(event)?;
    let solver = solver_for(config, solver);
    session.locate(solver.as_ref())?;
    magnitudes_after_location(&mut session, amplitudes)?;
    write_output(&session.to_xml()?, output)
}

pub fn run_magnitude(
    manifest: &Path,
    event: &Path,
    amplitudes: Option<&Path>,
    exclude: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = Session::from_manifest(manifest)?;
    session.load_event_file(event)?;
    if amplitudes.is_some() && !session.update_distances() {
        anyhow::bail!("{} has no hypocenter, locate the event first", event.display());
    }
    for station in exclude {
        session.set_magnitude_use(station, false)?;
    }
    refresh_magnitudes(&mut session, amplitudes)?;
    write_output(&session.to_xml()?, output)
}

pub fn run_clear(
    manifest: &Path,
    event: &Path,
    keep_picks: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut session = Session::from_manifest(manifest)?;
    session.load_event_file(event)?;
    if keep_picks {
        session.clear_event();
    } else {
        session.clear_all();
    }
    write_output(&session.to_xml()?, Some(output.unwrap_or(event)))
}
