use serde::{Deserialize, Serialize};

use crate::error::{Result, RgeError};
use crate::physics::constants::{NSECTORS, NSFPARAMS, SF_CHI2_CONFORMITY};

/// Conformity of a candidate's calorimeter response with the electron hypothesis.
pub trait SamplingFractionTest {
    /// # Arguments
    ///
    /// * `sector` - sector of the track, 1..=6
    /// * `momentum` - momentum magnitude in GeV
    /// * `total_energy` - energy deposited over all calorimeter layers in GeV
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - whether E/p lies within the accepted band, `InvalidSector` for a sector
    ///   that has no calibration entry
    ///
    fn conforms(&self, sector: i32, momentum: f64, total_energy: f64) -> Result<bool>;
}

/// One sampling fraction parameter, fitted as a mean and a width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SfParameter {
    pub mean: f64,
    pub sigma: f64,
}

/// Sampling fraction parameters of a single sector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorParams {
    pub params: [SfParameter; NSFPARAMS],
}

impl SectorParams {
    /// Expected E/p at momentum `p`.
    pub fn mean(&self, p: f64) -> f64 {
        let m = &self.params;
        m[0].mean * (m[1].mean + m[2].mean / p + m[3].mean / (p * p))
    }

    /// Width of the E/p distribution at momentum `p`.
    pub fn sigma(&self, p: f64) -> f64 {
        let s = &self.params;
        s[0].sigma * (s[1].sigma + s[2].sigma / p + s[3].sigma / (p * p))
    }
}

/// Per-sector sampling fraction calibration of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    sectors: [SectorParams; NSECTORS],
}

impl CalibrationTable {
    pub fn new(sectors: [SectorParams; NSECTORS]) -> Self {
        CalibrationTable { sectors }
    }

    /// Build a table from a flat list of values, sector-major, each parameter given as
    /// `mean sigma`.
    ///
    /// # Arguments
    ///
    /// * `values` - exactly `NSECTORS * NSFPARAMS * 2` finite numbers
    ///
    /// # Example
    ///
    /// ```
    /// use rgecore::algorithm::sampling_fraction::CalibrationTable;
    ///
    /// let values = vec![0.25; 48];
    /// let table = CalibrationTable::from_values(&values).unwrap();
    /// assert_eq!(table.sector(3).unwrap().params[0].mean, 0.25);
    /// ```
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let expected = NSECTORS * NSFPARAMS * 2;
        if values.len() != expected {
            return Err(RgeError::BadCalibration {
                reason: format!("expected {} values, found {}", expected, values.len()),
            });
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(RgeError::BadCalibration {
                reason: format!("value {} is not a finite number", pos),
            });
        }

        let mut sectors = [SectorParams::default(); NSECTORS];
        for (s, sector) in sectors.iter_mut().enumerate() {
            for (i, param) in sector.params.iter_mut().enumerate() {
                let base = (s * NSFPARAMS + i) * 2;
                *param = SfParameter { mean: values[base], sigma: values[base + 1] };
            }
        }
        Ok(CalibrationTable { sectors })
    }

    /// Flat list of values in the order [`CalibrationTable::from_values`] reads them.
    pub fn to_values(&self) -> Vec<f64> {
        self.sectors
            .iter()
            .flat_map(|s| s.params.iter().flat_map(|p| [p.mean, p.sigma]))
            .collect()
    }

    /// Parameters of `sector`, counted from 1.
    pub fn sector(&self, sector: i32) -> Result<&SectorParams> {
        if sector < 1 || sector as usize > NSECTORS {
            return Err(RgeError::InvalidSector { sector: sector as i64 });
        }
        Ok(&self.sectors[sector as usize - 1])
    }
}

impl SamplingFractionTest for CalibrationTable {
    fn conforms(&self, sector: i32, momentum: f64, total_energy: f64) -> Result<bool> {
        let params = self.sector(sector)?;
        if momentum.is_nan() || momentum <= 0.0 {
            return Ok(false);
        }
        let sf = total_energy / momentum;
        Ok((sf - params.mean(momentum)).abs() < SF_CHI2_CONFORMITY * params.sigma(momentum))
    }
}
