use std::path::Path;

use regex::Regex;

use crate::error::{DataError, Result};

/// Beam energy in GeV of the runs with a known configuration.
pub const BEAM_ENERGIES: &[(i64, f64)] = &[(11983, 10.3894), (12016, 10.3894), (12439, 2.1864)];

/// Extract the run number from a filename of the form `<text><run number>.<extension>`.
///
/// # Example
///
/// ```
/// use rgedf::run::run_number;
/// use std::path::Path;
///
/// assert_eq!(run_number(Path::new("/data/rge_012016.db")).unwrap(), 12016);
/// ```
pub fn run_number(path: &Path) -> Result<i64> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DataError::BadFilename(path.display().to_string()))?;

    let re = Regex::new(r"(\d+)\.[^.]+$").map_err(|_| DataError::BadFilename(name.to_string()))?;
    let run = re
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or_else(|| DataError::BadFilename(name.to_string()))?;
    Ok(run)
}

/// Beam energy of `run`, unless `override_energy` is given.
pub fn beam_energy(run: i64, override_energy: Option<f64>) -> Result<f64> {
    if let Some(energy) = override_energy {
        return Ok(energy);
    }
    BEAM_ENERGIES
        .iter()
        .find(|(r, _)| *r == run)
        .map(|(_, energy)| *energy)
        .ok_or(DataError::UnknownBeamEnergy { run })
}
