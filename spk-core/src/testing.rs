//! Fixture stations shared by the test suites of the workspace.

use crate::station::{PazResponse, StationCatalog, StationRecord, TraceStats};
use num_complex::Complex64;
use spk_utils::dates;

pub fn test_response() -> PazResponse {
    PazResponse {
        gain: 1.0,
        sensitivity: 671140000.0,
        poles: vec![
            Complex64::new(-4.444, 4.444),
            Complex64::new(-4.444, -4.444),
            Complex64::new(-1.083, 0.0),
        ],
        zeros: vec![Complex64::new(0.0, 0.0); 3],
    }
}

/// A ZNE station recorded at 200 Hz for two minutes from 2009-12-27T10:52:40.
pub fn test_station(code: &str, lon: f64, lat: f64, ele: f64) -> StationRecord {
    let start = dates::from_parts(2009, 12, 27, 10, 52, 40.0).expect("valid fixture time");
    let end = dates::offset_seconds(&start, 120.0);
    let traces = ["EHZ", "EHN", "EHE"]
        .iter()
        .map(|channel| TraceStats {
            network: "BW".to_string(),
            station: code.to_string(),
            location: String::new(),
            channel: channel.to_string(),
            starttime: start,
            endtime: end,
            sampling_rate: 200.0,
        })
        .collect();
    StationRecord {
        code: code.to_string(),
        network: "BW".to_string(),
        longitude: lon,
        latitude: lat,
        elevation: ele,
        responses: vec![test_response(); 3],
        traces,
    }
}

/// Three Bavarian network stations.
pub fn test_catalog() -> StationCatalog {
    StationCatalog::new(vec![
        test_station("RJOB", 12.795714, 47.737167, 0.86),
        test_station("RMOA", 12.864466, 47.761658, 0.815),
        test_station("RNON", 12.8671, 47.740501, 0.555),
    ])
    .expect("valid fixture catalog")
}
