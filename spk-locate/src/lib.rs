//! Adapters for external hypocenter location programs.
//!
//! Each adapter writes the picks of a session into the program's fixed-column
//! input files, runs the program, and reads its report back into synthetic
//! picks and an origin. Reports are parsed completely before anything in the
//! pick store changes, so a failed run leaves the session as it was.

pub mod error;
pub mod hyp2000;
pub mod three_dloc;

mod process;

pub use error::{LocateError, Result};
pub use hyp2000::{Hyp2000, Hyp2000Settings};
pub use three_dloc::{ThreeDLoc, ThreeDLocSettings};

use spk_core::solution::{EventSolution, LocationType};
use spk_core::station::StationCatalog;
use spk_core::store::PickStore;

/// An external location program.
pub trait LocationSolver {
    fn location_type(&self) -> LocationType;

    /// Encode the picks, run the program and apply its report.
    ///
    /// Returns the raw report text. On error neither `store` nor `solution`
    /// has been modified.
    fn run(
        &self,
        catalog: &StationCatalog,
        store: &mut PickStore,
        solution: &mut EventSolution,
    ) -> Result<String>;
}
