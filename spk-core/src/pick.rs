use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seismic phase of a pick.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Phase {
    P,
    S,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::P => write!(f, "P"),
            Phase::S => write!(f, "S"),
        }
    }
}

impl FromStr for Phase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "P" => Ok(Phase::P),
            "S" => Ok(Phase::S),
            _ => Err(()),
        }
    }
}

/// Sharpness of a phase arrival.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Onset {
    Impulsive,
    Emergent,
}

impl Onset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Onset::Impulsive => "impulsive",
            Onset::Emergent => "emergent",
        }
    }

    /// One-letter code of the hypo phase formats.
    pub fn code(&self) -> char {
        match self {
            Onset::Impulsive => 'I',
            Onset::Emergent => 'E',
        }
    }

    pub fn from_code(code: char) -> Option<Onset> {
        match code {
            'I' => Some(Onset::Impulsive),
            'E' => Some(Onset::Emergent),
            _ => None,
        }
    }
}

impl FromStr for Onset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "impulsive" => Ok(Onset::Impulsive),
            "emergent" => Ok(Onset::Emergent),
            _ => Err(()),
        }
    }
}

/// First-motion direction of a phase, with a quality qualifier.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Up,
    PoorUp,
    Down,
    PoorDown,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Up => "up",
            Polarity::PoorUp => "poorup",
            Polarity::Down => "down",
            Polarity::PoorDown => "poordown",
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Polarity::Up | Polarity::PoorUp)
    }

    /// One-letter code of the hypo phase formats.
    pub fn code(&self) -> char {
        if self.is_up() {
            'U'
        } else {
            'D'
        }
    }

    pub fn from_code(code: char) -> Option<Polarity> {
        match code {
            'U' => Some(Polarity::Up),
            'D' => Some(Polarity::Down),
            _ => None,
        }
    }

    /// Name used by the event exchange format.
    pub fn exchange_name(&self) -> &'static str {
        if self.is_up() {
            "positive"
        } else {
            "negative"
        }
    }
}

impl FromStr for Polarity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "up" | "positive" => Ok(Polarity::Up),
            "poorup" => Ok(Polarity::PoorUp),
            "down" | "negative" => Ok(Polarity::Down),
            "poordown" => Ok(Polarity::PoorDown),
            _ => Err(()),
        }
    }
}

/// Which bound of an error bracket a sample was assigned to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorSide {
    Lower,
    Upper,
}

/// Highest weight class accepted for a manual pick.
pub const MAX_WEIGHT: u8 = 3;

/// Manual pick of one phase plus everything derived from it.
///
/// Sample indices refer to the trace the pick was made on. The error
/// bracket and the qualitative annotations only exist while the pick does.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct PhasePick {
    pick: Option<i64>,
    err1: Option<i64>,
    err2: Option<i64>,
    onset: Option<Onset>,
    polarity: Option<Polarity>,
    weight: Option<u8>,
    synthetic: Option<i64>,
    residual: Option<f64>,
    solver_weight: Option<f64>,
    azimuth: Option<f64>,
    incidence: Option<f64>,
}

impl PhasePick {
    pub fn pick(&self) -> Option<i64> {
        self.pick
    }

    pub fn err1(&self) -> Option<i64> {
        self.err1
    }

    pub fn err2(&self) -> Option<i64> {
        self.err2
    }

    pub fn onset(&self) -> Option<Onset> {
        self.onset
    }

    pub fn polarity(&self) -> Option<Polarity> {
        self.polarity
    }

    pub fn weight(&self) -> Option<u8> {
        self.weight
    }

    pub fn synthetic(&self) -> Option<i64> {
        self.synthetic
    }

    /// Residual in seconds of the synthetic pick.
    pub fn residual(&self) -> Option<f64> {
        self.residual
    }

    /// Weight reported by the location program; never replaces `weight`.
    pub fn solver_weight(&self) -> Option<f64> {
        self.solver_weight
    }

    pub fn azimuth(&self) -> Option<f64> {
        self.azimuth
    }

    pub fn incidence(&self) -> Option<f64> {
        self.incidence
    }

    pub fn has_pick(&self) -> bool {
        self.pick.is_some()
    }

    pub fn has_synthetic(&self) -> bool {
        self.synthetic.is_some()
    }

    /// Width of the error bracket in samples, when both bounds exist.
    pub fn bracket_width(&self) -> Option<i64> {
        Some(self.err2? - self.err1?)
    }

    /// Set the pick, dropping any bracket bound the new pick now lies outside.
    pub(crate) fn set_pick(&mut self, sample: i64) {
        self.pick = Some(sample);
        if self.err1.is_some_and(|e| sample < e) {
            debug!("pick {} left of lower error bound, dropping it", sample);
            self.err1 = None;
        }
        if self.err2.is_some_and(|e| sample > e) {
            debug!("pick {} right of upper error bound, dropping it", sample);
            self.err2 = None;
        }
    }

    /// Remove the pick together with weight, polarity, onset and bracket.
    pub(crate) fn clear_pick(&mut self) {
        self.pick = None;
        self.weight = None;
        self.polarity = None;
        self.onset = None;
        self.err1 = None;
        self.err2 = None;
    }

    /// Set the bracket bound on whichever side of the pick `sample` falls.
    /// Returns `None` (and changes nothing) when there is no pick.
    pub fn set_error(&mut self, sample: i64) -> Option<ErrorSide> {
        let pick = self.pick?;
        if sample < pick {
            self.err1 = Some(sample);
            Some(ErrorSide::Lower)
        } else {
            self.err2 = Some(sample);
            Some(ErrorSide::Upper)
        }
    }

    /// Set a symmetric bracket of `half_width` samples around the pick.
    pub fn set_bracket(&mut self, half_width: i64) -> bool {
        match self.pick {
            Some(pick) => {
                let half_width = half_width.abs();
                self.err1 = Some(pick - half_width);
                self.err2 = Some(pick + half_width);
                true
            }
            None => false,
        }
    }

    pub fn clear_err1(&mut self) {
        self.err1 = None;
    }

    pub fn clear_err2(&mut self) {
        self.err2 = None;
    }

    pub fn set_onset(&mut self, onset: Onset) -> bool {
        if !self.has_pick() {
            return false;
        }
        self.onset = Some(onset);
        true
    }

    pub fn clear_onset(&mut self) {
        self.onset = None;
    }

    pub fn set_polarity(&mut self, polarity: Polarity) -> bool {
        if !self.has_pick() {
            return false;
        }
        self.polarity = Some(polarity);
        true
    }

    pub fn clear_polarity(&mut self) {
        self.polarity = None;
    }

    /// Weight classes run from 0 (best) to 3.
    pub fn set_weight(&mut self, weight: u8) -> bool {
        if !self.has_pick() || weight > MAX_WEIGHT {
            return false;
        }
        self.weight = Some(weight);
        true
    }

    pub fn clear_weight(&mut self) {
        self.weight = None;
    }

    pub fn set_synthetic(&mut self, sample: i64, residual: f64) {
        self.synthetic = Some(sample);
        self.residual = Some(residual);
    }

    pub fn set_solver_weight(&mut self, weight: f64) {
        self.solver_weight = Some(weight);
    }

    pub fn set_angles(&mut self, azimuth: f64, incidence: f64) {
        self.azimuth = Some(azimuth);
        self.incidence = Some(incidence);
    }

    pub fn set_azimuth(&mut self, azimuth: f64) {
        self.azimuth = Some(azimuth);
    }

    pub fn set_incidence(&mut self, incidence: f64) {
        self.incidence = Some(incidence);
    }

    /// Remove the synthetic pick and its residual and solver weight.
    pub fn clear_synthetic(&mut self) {
        self.synthetic = None;
        self.residual = None;
        self.solver_weight = None;
    }

    /// Remove everything a location run contributes.
    pub fn clear_solution(&mut self) {
        self.clear_synthetic();
        self.azimuth = None;
        self.incidence = None;
    }
}

/// An amplitude extremum picked for magnitude estimation.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct AmplitudeExtremum {
    pub value: f64,
    /// Sample index of the extremum
    pub sample: i64,
}

/// Minimum/maximum amplitude pair on one horizontal component.
///
/// A maximum below the minimum never persists: inserting the extremum that
/// would invert the pair drops the other one.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct AmplitudeBracket {
    min: Option<AmplitudeExtremum>,
    max: Option<AmplitudeExtremum>,
}

impl AmplitudeBracket {
    pub fn min(&self) -> Option<AmplitudeExtremum> {
        self.min
    }

    pub fn max(&self) -> Option<AmplitudeExtremum> {
        self.max
    }

    pub fn set_min(&mut self, extremum: AmplitudeExtremum) {
        if self.max.is_some_and(|max| extremum.value > max.value) {
            debug!("new minimum {} above maximum, dropping maximum", extremum.value);
            self.max = None;
        }
        self.min = Some(extremum);
    }

    pub fn set_max(&mut self, extremum: AmplitudeExtremum) {
        if self.min.is_some_and(|min| min.value > extremum.value) {
            debug!("new maximum {} below minimum, dropping minimum", extremum.value);
            self.min = None;
        }
        self.max = Some(extremum);
    }

    pub fn clear_min(&mut self) {
        self.min = None;
    }

    pub fn clear_max(&mut self) {
        self.max = None;
    }

    pub fn clear(&mut self) {
        self.min = None;
        self.max = None;
    }

    pub fn is_complete(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Peak-to-peak amplitude and the sample distance between the extrema.
    pub fn peak_to_peak(&self) -> Option<(f64, i64)> {
        let (min, max) = (self.min?, self.max?);
        Some((max.value - min.value, (max.sample - min.sample).abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picked(sample: i64) -> PhasePick {
        let mut phase = PhasePick::default();
        phase.set_pick(sample);
        phase
    }

    #[test]
    fn test_new_pick_right_of_bracket_drops_upper_bound() {
        let mut phase = picked(100);
        assert_eq!(phase.set_error(90), Some(ErrorSide::Lower));
        assert_eq!(phase.set_error(110), Some(ErrorSide::Upper));
        phase.set_pick(200);
        assert_eq!(phase.err1(), Some(90));
        assert_eq!(phase.err2(), None);
    }

    #[test]
    fn test_new_pick_left_of_bracket_drops_lower_bound() {
        let mut phase = picked(100);
        phase.set_error(90);
        phase.set_error(110);
        phase.set_pick(50);
        assert_eq!(phase.err1(), None);
        assert_eq!(phase.err2(), Some(110));
    }

    #[test]
    fn test_new_pick_inside_bracket_keeps_it() {
        let mut phase = picked(100);
        phase.set_error(90);
        phase.set_error(110);
        phase.set_pick(105);
        assert_eq!(phase.bracket_width(), Some(20));
    }

    #[test]
    fn test_annotations_require_pick() {
        let mut phase = PhasePick::default();
        assert_eq!(phase.set_error(10), None);
        assert!(!phase.set_bracket(5));
        assert!(!phase.set_onset(Onset::Impulsive));
        assert!(!phase.set_polarity(Polarity::Up));
        assert!(!phase.set_weight(1));
        assert_eq!(phase, PhasePick::default());
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let mut phase = picked(10);
        assert!(!phase.set_weight(4));
        assert!(phase.set_weight(3));
        assert_eq!(phase.weight(), Some(3));
    }

    #[test]
    fn test_clear_pick_cascades() {
        let mut phase = picked(100);
        phase.set_error(95);
        phase.set_error(104);
        phase.set_onset(Onset::Emergent);
        phase.set_polarity(Polarity::PoorDown);
        phase.set_weight(2);
        phase.set_synthetic(101, 0.005);
        phase.clear_pick();
        assert_eq!(phase.pick(), None);
        assert_eq!(phase.err1(), None);
        assert_eq!(phase.err2(), None);
        assert_eq!(phase.onset(), None);
        assert_eq!(phase.polarity(), None);
        assert_eq!(phase.weight(), None);
        assert_eq!(phase.synthetic(), Some(101));
        // idempotent
        phase.clear_pick();
        phase.clear_err1();
        phase.clear_onset();
        assert_eq!(phase.pick(), None);
    }

    #[test]
    fn test_symmetric_bracket() {
        let mut phase = picked(400);
        assert!(phase.set_bracket(-6));
        assert_eq!(phase.err1(), Some(394));
        assert_eq!(phase.err2(), Some(406));
    }

    #[test]
    fn test_min_above_max_drops_max() {
        let mut bracket = AmplitudeBracket::default();
        bracket.set_max(AmplitudeExtremum { value: 3.0, sample: 10 });
        bracket.set_min(AmplitudeExtremum { value: 5.0, sample: 12 });
        assert_eq!(bracket.max(), None);
        assert_eq!(bracket.min().map(|m| m.value), Some(5.0));
    }

    #[test]
    fn test_max_below_min_drops_min() {
        let mut bracket = AmplitudeBracket::default();
        bracket.set_min(AmplitudeExtremum { value: -2.0, sample: 10 });
        bracket.set_max(AmplitudeExtremum { value: -4.0, sample: 30 });
        assert_eq!(bracket.min(), None);
        assert!(!bracket.is_complete());
    }

    #[test]
    fn test_peak_to_peak() {
        let mut bracket = AmplitudeBracket::default();
        assert_eq!(bracket.peak_to_peak(), None);
        bracket.set_min(AmplitudeExtremum { value: -120.0, sample: 540 });
        bracket.set_max(AmplitudeExtremum { value: 80.0, sample: 520 });
        assert_eq!(bracket.peak_to_peak(), Some((200.0, 20)));
    }

    #[test]
    fn test_polarity_names() {
        assert_eq!("poorup".parse::<Polarity>(), Ok(Polarity::PoorUp));
        assert_eq!("negative".parse::<Polarity>(), Ok(Polarity::Down));
        assert_eq!(Polarity::PoorDown.exchange_name(), "negative");
        assert_eq!(Polarity::PoorUp.code(), 'U');
        assert_eq!(Onset::from_code('E'), Some(Onset::Emergent));
        assert!("sideways".parse::<Polarity>().is_err());
    }
}
