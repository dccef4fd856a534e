use serde::{Deserialize, Serialize};

use crate::algorithm::fusion::{DepositedEnergy, Photoelectrons};
use crate::algorithm::sampling_fraction::SamplingFractionTest;
use crate::error::{Result, RgeError};
use crate::physics::constants::{HTCC_NPHE_CUT, PCAL_ENERGY_CUT, TRIGGER_PID};
use crate::physics::pid;

/// Everything the classifier looks at for one candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifierInput {
    /// Code assigned by the event builder.
    pub pid: i32,
    pub status: i32,
    pub charge: i32,
    pub sector: i32,
    /// Momentum magnitude in GeV.
    pub momentum: f64,
    pub energy: DepositedEnergy,
    pub nphe: Photoelectrons,
}

/// Outcome of classifying one candidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Final code, 0 when the candidate could not be identified.
    pub pid: i32,
    /// True when the candidate independently qualifies as the trigger electron.
    pub trigger_eligible: bool,
}

impl Classification {
    fn unidentified() -> Self {
        Classification { pid: 0, trigger_eligible: false }
    }
}

/// Assign the final identity of a candidate.
///
/// The event builder's code is kept unless the candidate contradicts it: a charge that
/// does not match the code, or a lepton without a Cherenkov signal and a calorimeter
/// response compatible with the sampling fraction. Trigger eligibility additionally
/// requires the trigger bit in `status` and a minimum PCAL deposit.
///
/// # Arguments
///
/// * `input` - candidate quantities
/// * `sf` - sampling fraction test of the run
///
/// # Returns
///
/// * `Result<Classification>` - `UnsupportedParticleId` for a code the pid table does not know
///
pub fn classify<S: SamplingFractionTest + ?Sized>(input: &ClassifierInput, sf: &S) -> Result<Classification> {
    let constants = pid::lookup(input.pid).map_err(|_| RgeError::UnsupportedParticleId { pid: input.pid })?;

    if input.pid == 0 || constants.charge != input.charge {
        return Ok(Classification::unidentified());
    }

    if input.pid.abs() != TRIGGER_PID {
        return Ok(Classification { pid: input.pid, trigger_eligible: false });
    }

    // leptons need a Cherenkov signal and an electromagnetic shower
    let has_signal = input.nphe.htcc >= HTCC_NPHE_CUT;
    let conforms = has_signal && sf.conforms(input.sector, input.momentum, input.energy.total())?;
    if !conforms {
        return Ok(Classification::unidentified());
    }

    let trigger_eligible = input.pid == TRIGGER_PID && input.status < 0 && input.energy.pcal >= PCAL_ENERGY_CUT;

    Ok(Classification { pid: input.pid, trigger_eligible })
}
