use std::fmt::{self, Display, Formatter};

use crate::error::{Result, RgeError};
use crate::physics::constants::*;

/// Charge, mass and name associated to a particle code.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidConstants {
    pub pid: i32,
    pub charge: i32,
    pub mass: f64,
    pub name: &'static str,
}

const fn entry(pid: i32, charge: i32, mass: f64, name: &'static str) -> PidConstants {
    PidConstants { pid, charge, mass, name }
}

/// Particle codes the classifier supports, ordered by code.
pub const PID_TABLE: &[PidConstants] = &[
    entry(-2212, -1, MASS_PROTON, "antiproton"),
    entry(-321, -1, MASS_KAON, "negative kaon"),
    entry(-211, -1, MASS_PION, "negative pion"),
    entry(-13, 1, MASS_MUON, "antimuon"),
    entry(-11, 1, MASS_ELECTRON, "positron"),
    entry(0, 0, 0.0, "unidentified"),
    entry(11, -1, MASS_ELECTRON, "electron"),
    entry(13, -1, MASS_MUON, "muon"),
    entry(22, 0, 0.0, "photon"),
    entry(45, 1, MASS_DEUTERON, "deuteron"),
    entry(111, 0, MASS_PION_ZERO, "neutral pion"),
    entry(130, 0, MASS_KAON_ZERO, "long neutral kaon"),
    entry(211, 1, MASS_PION, "positive pion"),
    entry(321, 1, MASS_KAON, "positive kaon"),
    entry(2112, 0, MASS_NEUTRON, "neutron"),
    entry(2212, 1, MASS_PROTON, "proton"),
];

pub fn lookup(pid: i32) -> Result<&'static PidConstants> {
    PID_TABLE
        .binary_search_by_key(&pid, |c| c.pid)
        .map(|i| &PID_TABLE[i])
        .map_err(|_| RgeError::PidNotFound { pid })
}

pub fn charge(pid: i32) -> Result<i32> {
    Ok(lookup(pid)?.charge)
}

pub fn mass(pid: i32) -> Result<f64> {
    Ok(lookup(pid)?.mass)
}

/// All supported codes carrying `charge`.
pub fn pids_by_charge(charge: i32) -> Vec<i32> {
    PID_TABLE.iter().filter(|c| c.charge == charge && c.pid != 0).map(|c| c.pid).collect()
}

/// Printable list of the supported codes, one per line.
pub struct PidListing;

impl Display for PidListing {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "  pid   name")?;
        for c in PID_TABLE {
            writeln!(f, "{:>5}   {}", c.pid, c.name)?;
        }
        Ok(())
    }
}
