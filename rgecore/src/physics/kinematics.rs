use std::f64::consts::PI;

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RgeError};
use crate::physics::constants::{MASS_ELECTRON, MASS_PROTON};

/// Convert an angle from degrees to radians.
///
/// By convention every angle handled here lies within [-180, 180] degrees; anything
/// else, or a non-finite value, is a failed conversion rather than a number.
pub fn to_rad(degrees: f64) -> Result<f64> {
    if !degrees.is_finite() || degrees < -180.0 || degrees > 180.0 {
        return Err(RgeError::AngleConversion { value: degrees });
    }
    Ok(degrees * PI / 180.0)
}

/// Polar angle of `p` with respect to the beam line, in radians.
pub fn theta(p: &Vector3<f64>) -> f64 {
    (p.x * p.x + p.y * p.y).sqrt().atan2(p.z)
}

/// Azimuthal angle of `p`, in radians.
pub fn phi(p: &Vector3<f64>) -> f64 {
    p.y.atan2(p.x)
}

/// Angle between two vectors, in radians.
pub fn angle(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let cos = a.dot(b) / (a.norm() * b.norm());
    cos.clamp(-1.0, 1.0).acos()
}

/// Inclusive kinematics of the scattered beam electron.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisKinematics {
    pub q2: f64,
    pub nu: f64,
    pub xb: f64,
    pub yb: f64,
    pub w2: f64,
}

impl DisKinematics {
    /// # Arguments
    ///
    /// * `beam_energy` - beam energy in GeV, beam along +z
    /// * `electron` - momentum of the scattered electron in GeV
    ///
    pub fn new(beam_energy: f64, electron: &Vector3<f64>) -> Self {
        let energy = (electron.norm_squared() + MASS_ELECTRON * MASS_ELECTRON).sqrt();

        let q2 = 2.0 * beam_energy * energy * (1.0 - theta(electron).cos());
        let nu = beam_energy - energy;
        let xb = q2 / (2.0 * MASS_PROTON * nu);
        let yb = nu / beam_energy;
        let w2 = MASS_PROTON * MASS_PROTON + 2.0 * MASS_PROTON * nu - q2;

        DisKinematics { q2, nu, xb, yb, w2 }
    }

    /// Invariant mass of the hadronic final state; NaN when W2 is negative.
    pub fn w(&self) -> f64 {
        self.w2.sqrt()
    }
}

/// Kinematics of a hadron in the frame of the virtual photon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SidisKinematics {
    pub zh: f64,
    pub pt2: f64,
    pub pl2: f64,
    pub phipq: f64,
    pub thetapq: f64,
}

impl SidisKinematics {
    /// # Arguments
    ///
    /// * `beam_energy` - beam energy in GeV
    /// * `electron` - momentum of the trigger electron
    /// * `hadron` - momentum of the hadron
    /// * `hadron_mass` - mass assigned to the hadron by its identity
    ///
    pub fn new(beam_energy: f64, electron: &Vector3<f64>, hadron: &Vector3<f64>, hadron_mass: f64) -> Self {
        let dis = DisKinematics::new(beam_energy, electron);
        let photon = Vector3::new(0.0, 0.0, beam_energy) - electron;

        let hadron_energy = (hadron.norm_squared() + hadron_mass * hadron_mass).sqrt();
        let zh = hadron_energy / dis.nu;

        // rotate so the virtual photon points along z and the lepton plane is x-z
        let to_plane = Rotation3::from_axis_angle(&Vector3::z_axis(), -phi(&photon));
        let to_axis = Rotation3::from_axis_angle(&Vector3::y_axis(), -theta(&photon));
        let rotated = to_axis * (to_plane * hadron);

        SidisKinematics {
            zh,
            pt2: rotated.x * rotated.x + rotated.y * rotated.y,
            pl2: rotated.z * rotated.z,
            phipq: phi(&rotated),
            thetapq: angle(&photon, hadron),
        }
    }
}
