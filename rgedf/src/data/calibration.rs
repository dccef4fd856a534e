use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use rgecore::algorithm::sampling_fraction::CalibrationTable;
use rgecore::error::RgeError;
use rgecore::physics::constants::{NSECTORS, SIMULATION_RUN_PREFIX};

use crate::error::Result;

/// True for run numbers reserved for simulation, 999xxx.
pub fn is_simulation_run(run: i64) -> bool {
    run / 1000 == SIMULATION_RUN_PREFIX
}

/// File holding the sampling fraction parameters of `run`.
pub fn calibration_path(data_dir: &Path, run: i64) -> PathBuf {
    if is_simulation_run(run) {
        data_dir.join("sf_params_mc.txt")
    } else {
        data_dir.join(format!("sf_params_{:06}.txt", run))
    }
}

/// Read the sampling fraction calibration of `run` from `data_dir`.
///
/// # Returns
///
/// * `Result<CalibrationTable>` - `NoCalibrationData` when the run has no calibration file,
///   `BadCalibration` when the file exists but cannot be parsed
///
pub fn read_calibration(data_dir: &Path, run: i64) -> Result<CalibrationTable> {
    let path = calibration_path(data_dir, run);
    if !path.is_file() {
        return Err(RgeError::NoCalibrationData { run }.into());
    }
    let text = fs::read_to_string(&path)?;
    Ok(parse_calibration(&text)?)
}

/// Parse whitespace separated parameters, sector-major, each parameter as `mean sigma`.
pub fn parse_calibration(text: &str) -> rgecore::error::Result<CalibrationTable> {
    let values = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| RgeError::BadCalibration {
                reason: format!("`{}` is not a number", token),
            })
        })
        .collect::<rgecore::error::Result<Vec<f64>>>()?;
    CalibrationTable::from_values(&values)
}

/// Write `table` in the format [`read_calibration`] expects, one sector per line.
pub fn write_calibration(data_dir: &Path, run: i64, table: &CalibrationTable) -> Result<PathBuf> {
    let path = calibration_path(data_dir, run);
    let values = table.to_values();
    let per_sector = values.len() / NSECTORS;
    let text = values.chunks(per_sector).map(|sector| sector.iter().join(" ")).join("\n");
    fs::write(&path, text + "\n")?;
    Ok(path)
}
