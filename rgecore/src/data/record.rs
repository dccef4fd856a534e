use serde::{Deserialize, Serialize};

use crate::algorithm::fusion::FusedParticle;
use crate::physics::kinematics::{phi, theta, DisKinematics, SidisKinematics};
use crate::physics::pid;

/// Names of the variables of a particle record, in storage order.
pub const RGE_VARS: [&str; 36] = [
    "run", "event", "beamE", "pid", "charge", "status", "mass", "vx", "vy", "vz", "px", "py", "pz", "p",
    "theta", "phi", "beta", "chi2", "NDF", "pcalE", "ecinE", "ecouE", "totE", "dtof", "nphe_ltcc",
    "nphe_htcc", "Q2", "nu", "xb", "yb", "W2", "zh", "pt2", "pl2", "phipq", "thetapq",
];

pub const NVARS: usize = RGE_VARS.len();

/// Metadata shared by every record of a run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run: i64,
    /// Beam energy in GeV.
    pub beam_energy: f64,
}

/// One output row: a classified particle with its kinematics relative to the event's trigger.
///
/// Angles are in radians, energies and momenta in GeV, times in ns. `dtof` is the time of
/// flight relative to the trigger and is absent when either time is unknown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub run: i64,
    pub event: i64,
    pub beam_energy: f64,
    pub pid: i32,
    pub charge: i32,
    pub status: i32,
    pub mass: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub p: f64,
    pub theta: f64,
    pub phi: f64,
    pub beta: f64,
    pub chi2: f64,
    pub ndf: i32,
    pub pcal_energy: f64,
    pub ecin_energy: f64,
    pub ecou_energy: f64,
    pub total_energy: f64,
    pub dtof: Option<f64>,
    pub nphe_ltcc: f64,
    pub nphe_htcc: f64,
    pub dis: DisKinematics,
    pub sidis: SidisKinematics,
}

impl ParticleRecord {
    /// # Arguments
    ///
    /// * `particle` - the particle to record
    /// * `trigger` - the trigger electron of the same event, possibly `particle` itself
    /// * `info` - run metadata
    /// * `event` - event number
    ///
    pub fn new(particle: &FusedParticle, trigger: &FusedParticle, info: &RunInfo, event: i64) -> Self {
        let c = &particle.candidate;
        // unidentified particles carry no mass hypothesis
        let mass = pid::mass(particle.pid).unwrap_or(0.0);
        let dis = DisKinematics::new(info.beam_energy, &trigger.candidate.momentum);
        let sidis = SidisKinematics::new(info.beam_energy, &trigger.candidate.momentum, &c.momentum, mass);
        let dtof = match (particle.tof, trigger.tof) {
            (Some(tof), Some(trigger_tof)) => Some(tof - trigger_tof),
            _ => None,
        };

        ParticleRecord {
            run: info.run,
            event,
            beam_energy: info.beam_energy,
            pid: particle.pid,
            charge: c.charge,
            status: c.status,
            mass,
            vx: c.vertex.x,
            vy: c.vertex.y,
            vz: c.vertex.z,
            px: c.momentum.x,
            py: c.momentum.y,
            pz: c.momentum.z,
            p: c.p(),
            theta: theta(&c.momentum),
            phi: phi(&c.momentum),
            beta: c.beta,
            chi2: c.chi2,
            ndf: c.ndf,
            pcal_energy: particle.energy.pcal,
            ecin_energy: particle.energy.ecin,
            ecou_energy: particle.energy.ecou,
            total_energy: particle.energy.total(),
            dtof,
            nphe_ltcc: particle.nphe.ltcc,
            nphe_htcc: particle.nphe.htcc,
            dis,
            sidis,
        }
    }

    /// Values in the order of [`RGE_VARS`].
    pub fn values(&self) -> [Option<f64>; NVARS] {
        [
            Some(self.run as f64),
            Some(self.event as f64),
            Some(self.beam_energy),
            Some(self.pid as f64),
            Some(self.charge as f64),
            Some(self.status as f64),
            Some(self.mass),
            Some(self.vx),
            Some(self.vy),
            Some(self.vz),
            Some(self.px),
            Some(self.py),
            Some(self.pz),
            Some(self.p),
            Some(self.theta),
            Some(self.phi),
            Some(self.beta),
            Some(self.chi2),
            Some(self.ndf as f64),
            Some(self.pcal_energy),
            Some(self.ecin_energy),
            Some(self.ecou_energy),
            Some(self.total_energy),
            self.dtof,
            Some(self.nphe_ltcc),
            Some(self.nphe_htcc),
            Some(self.dis.q2),
            Some(self.dis.nu),
            Some(self.dis.xb),
            Some(self.dis.yb),
            Some(self.dis.w2),
            Some(self.sidis.zh),
            Some(self.sidis.pt2),
            Some(self.sidis.pl2),
            Some(self.sidis.phipq),
            Some(self.sidis.thetapq),
        ]
    }
}

/// Records of one event: the trigger first, then every other fused particle in track order.
///
/// Events without a trigger produce no records.
pub fn event_records(particles: &[FusedParticle], info: &RunInfo, event: i64) -> Vec<ParticleRecord> {
    let trigger = match particles.iter().find(|p| p.is_trigger) {
        Some(trigger) => trigger,
        None => return Vec::new(),
    };
    let mut records = Vec::with_capacity(particles.len());
    records.push(ParticleRecord::new(trigger, trigger, info, event));
    records.extend(
        particles
            .iter()
            .filter(|p| !p.is_trigger)
            .map(|p| ParticleRecord::new(p, trigger, info, event)),
    );
    records
}
