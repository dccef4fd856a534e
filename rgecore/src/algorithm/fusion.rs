//! Detector fusion: combines the per-detector rows of one event into particle candidates.
//!
//! Each track row yields at most one candidate. A candidate collects the timing, energy and
//! Cherenkov response of the detectors associated to its particle through `pindex`, is
//! classified, and the first candidate qualifying as the trigger electron is flagged.

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::algorithm::classify::{classify, ClassifierInput};
use crate::algorithm::sampling_fraction::SamplingFractionTest;
use crate::data::detector::{CalorimeterRow, CherenkovRow, DetectorRows, ScintillatorRow};
use crate::error::{Result, RgeError};
use crate::physics::constants::*;
use crate::physics::kinematics::{theta, to_rad};

/// Time of flight of particle `pindex`, in ns.
///
/// FTOF hits are preferred, layer 1B over 1A over 2; without any FTOF hit the calorimeter
/// time is used, PCAL over ECIN over ECOU. Among hits of the same layer the first row wins.
///
/// # Returns
///
/// * `Option<f64>` - `None` when no detector measured a time for the particle
///
pub fn get_tof(pindex: i32, scintillator: &[ScintillatorRow], calorimeter: &[CalorimeterRow]) -> Option<f64> {
    let ftof = scintillator.iter().filter(|r| r.pindex == pindex && r.detector == FTOF_ID);
    let ftof = best_by_precedence(ftof.map(|r| (r.layer, r.time)), &[FTOF1B_LYR, FTOF1A_LYR, FTOF2_LYR]);
    if ftof.is_some() {
        return ftof;
    }

    let ecal = calorimeter.iter().filter(|r| r.pindex == pindex);
    best_by_precedence(ecal.map(|r| (r.layer, r.time)), &[PCAL_LYR, ECIN_LYR, ECOU_LYR])
}

/// Time of the hit with the highest ranked layer; a hit on the top layer ends the scan.
fn best_by_precedence(hits: impl Iterator<Item = (i32, f64)>, precedence: &[i32]) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;
    for (layer, time) in hits {
        let rank = match precedence.iter().position(|&l| l == layer) {
            Some(rank) => rank,
            None => continue,
        };
        if best.map_or(true, |(r, _)| rank < r) {
            best = Some((rank, time));
            if rank == 0 {
                break;
            }
        }
    }
    best.map(|(_, time)| time)
}

/// Energy deposited per calorimeter layer, in GeV.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DepositedEnergy {
    pub pcal: f64,
    pub ecin: f64,
    pub ecou: f64,
}

impl DepositedEnergy {
    pub fn total(&self) -> f64 {
        self.pcal + self.ecin + self.ecou
    }
}

/// Sum the calorimeter energy of particle `pindex` per layer.
///
/// # Returns
///
/// * `Result<DepositedEnergy>` - `InvalidCalorimeterLayer` when a matching row has a layer
///   other than PCAL, ECIN or ECOU
///
pub fn get_deposited_energy(pindex: i32, calorimeter: &[CalorimeterRow]) -> Result<DepositedEnergy> {
    let mut energy = DepositedEnergy::default();
    for row in calorimeter.iter().filter(|r| r.pindex == pindex) {
        match row.layer {
            PCAL_LYR => energy.pcal += row.energy,
            ECIN_LYR => energy.ecin += row.energy,
            ECOU_LYR => energy.ecou += row.energy,
            layer => return Err(RgeError::InvalidCalorimeterLayer { layer: layer as i64 }),
        }
    }
    Ok(energy)
}

/// Photoelectrons collected by each Cherenkov counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Photoelectrons {
    pub htcc: f64,
    pub ltcc: f64,
}

/// Sum the photoelectrons of particle `pindex` per Cherenkov counter.
///
/// # Returns
///
/// * `Result<Photoelectrons>` - `InvalidCherenkovId` for a matching row from a detector that
///   is neither HTCC nor LTCC
///
pub fn count_photoelectrons(pindex: i32, cherenkov: &[CherenkovRow]) -> Result<Photoelectrons> {
    let mut nphe = Photoelectrons::default();
    for row in cherenkov.iter().filter(|r| r.pindex == pindex) {
        match row.detector {
            HTCC_ID => nphe.htcc += row.nphe,
            LTCC_ID => nphe.ltcc += row.nphe,
            detector => return Err(RgeError::InvalidCherenkovId { detector: detector as i64 }),
        }
    }
    Ok(nphe)
}

/// Polar acceptance of the FMT seen from a given vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FmtGeometryCut {
    pub r_min: f64,
    pub r_max: f64,
    pub z0: f64,
    pub scale: f64,
}

impl Default for FmtGeometryCut {
    fn default() -> Self {
        FmtGeometryCut {
            r_min: FMTCUT_RMIN,
            r_max: FMTCUT_RMAX,
            z0: FMTCUT_Z0,
            scale: FMTCUT_ANGLE,
        }
    }
}

impl FmtGeometryCut {
    /// Accepted polar window `(theta_min, theta_max)` in radians for a vertex at `vz`.
    pub fn window(&self, vz: f64) -> Result<(f64, f64)> {
        let depth = self.z0 - vz;
        if depth == 0.0 {
            return Err(RgeError::AngleConversion { value: f64::INFINITY });
        }
        let theta_min = to_rad(self.scale * (self.r_min / depth).atan())?;
        let theta_max = to_rad(self.scale * (self.r_max / depth).atan())?;
        Ok((theta_min, theta_max))
    }

    /// Whether a track with polar angle `theta` from a vertex at `vz` crosses the FMT.
    pub fn accepts(&self, vz: f64, theta: f64) -> Result<bool> {
        let (theta_min, theta_max) = self.window(vz)?;
        Ok(theta_min <= theta && theta <= theta_max)
    }

    pub fn apply(&self, candidate: &Candidate) -> Result<bool> {
        self.accepts(candidate.vertex.z, candidate.theta())
    }
}

/// Apply the default FMT geometry cut to `candidate`.
pub fn apply_fmt_geometry_cut(candidate: &Candidate) -> Result<bool> {
    FmtGeometryCut::default().apply(candidate)
}

/// Number of FMT layers a track is required to cross.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FmtLayers {
    /// Drift chamber tracking only.
    #[default]
    None,
    Two,
    Three,
}

impl FmtLayers {
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            0 => Some(FmtLayers::None),
            FMT_MIN_LAYERS => Some(FmtLayers::Two),
            FMT_NLAYERS => Some(FmtLayers::Three),
            _ => None,
        }
    }

    pub fn count(&self) -> u8 {
        match self {
            FmtLayers::None => 0,
            FmtLayers::Two => FMT_MIN_LAYERS,
            FmtLayers::Three => FMT_NLAYERS,
        }
    }

    pub fn required(&self) -> bool {
        *self != FmtLayers::None
    }
}

/// Track quality and vertex cuts, applied before any detector matching.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityCuts {
    pub chi2ndf_max: f64,
    pub vxvy_max: f64,
    pub vz_min: f64,
    pub vz_max: f64,
}

impl Default for QualityCuts {
    fn default() -> Self {
        QualityCuts {
            chi2ndf_max: CHI2NDF_CUT,
            vxvy_max: VXVY_CUT,
            vz_min: VZ_LOW_CUT,
            vz_max: VZ_HIGH_CUT,
        }
    }
}

impl QualityCuts {
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        let v = &candidate.vertex;
        let chi2ndf = if candidate.ndf > 0 { candidate.chi2 / candidate.ndf as f64 } else { f64::INFINITY };
        chi2ndf < self.chi2ndf_max
            && (v.x * v.x + v.y * v.y).sqrt() < self.vxvy_max
            && self.vz_min < v.z
            && v.z < self.vz_max
    }
}

/// Settings of the fusion pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub fmt_layers: FmtLayers,
    /// Reject candidates outside the FMT polar acceptance.
    pub fmt_cut: bool,
    pub geometry: FmtGeometryCut,
    /// Track quality cuts, disabled when `None`.
    pub quality: Option<QualityCuts>,
}

/// A reconstructed trajectory, built from one track row.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Row of the particle bank the track belongs to.
    pub pindex: i32,
    /// Row of the track bank the candidate was built from.
    pub track_row: usize,
    pub pid: i32,
    pub charge: i32,
    pub status: i32,
    pub sector: i32,
    pub vertex: Vector3<f64>,
    pub momentum: Vector3<f64>,
    pub beta: f64,
    pub chi2: f64,
    pub ndf: i32,
}

impl Candidate {
    pub fn theta(&self) -> f64 {
        theta(&self.momentum)
    }

    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }
}

/// Build the candidate of track row `track_row`.
///
/// # Returns
///
/// * `Result<Option<Candidate>>` - `None` when the track has no particle association, or when
///   FMT layers are required and no FMT segment covering them exists. `InvalidSector` for a
///   track outside sectors 1..6.
///
pub fn build_candidate(rows: &DetectorRows, track_row: usize, fmt_layers: FmtLayers) -> Result<Option<Candidate>> {
    let track = match rows.tracks.get(track_row) {
        Some(track) => track,
        None => return Ok(None),
    };
    if track.sector < 1 || track.sector > NSECTORS as i32 {
        return Err(RgeError::InvalidSector { sector: track.sector as i64 });
    }
    let particle = match usize::try_from(track.pindex).ok().and_then(|p| rows.particles.get(p)) {
        Some(particle) => particle,
        None => return Ok(None),
    };

    let mut candidate = Candidate {
        pindex: track.pindex,
        track_row,
        pid: particle.pid,
        charge: particle.charge,
        status: particle.status,
        sector: track.sector,
        vertex: Vector3::new(particle.vx, particle.vy, particle.vz),
        momentum: Vector3::new(particle.px, particle.py, particle.pz),
        beta: particle.beta,
        chi2: track.chi2,
        ndf: track.ndf,
    };

    if fmt_layers.required() {
        let segment = rows.fmt_tracks.iter().find(|f| f.index == track.index);
        let segment = match segment {
            Some(segment) if segment.ndf >= fmt_layers.count() as i32 => segment,
            _ => return Ok(None),
        };
        candidate.vertex = Vector3::new(segment.vx, segment.vy, segment.vz);
        candidate.momentum = Vector3::new(segment.px, segment.py, segment.pz);
        candidate.chi2 = segment.chi2;
        candidate.ndf = segment.ndf;
    }

    Ok(Some(candidate))
}

/// A candidate with its detector response and final identity.
#[derive(Clone, Debug, PartialEq)]
pub struct FusedParticle {
    pub candidate: Candidate,
    pub tof: Option<f64>,
    pub energy: DepositedEnergy,
    pub nphe: Photoelectrons,
    pub pid: i32,
    pub is_trigger: bool,
}

/// Counters of one fusion pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStats {
    pub events: u64,
    pub events_with_trigger: u64,
    pub candidates: u64,
    pub invalid: u64,
    pub quality_failed: u64,
    pub fiducial_failed: u64,
    pub unsupported: u64,
    pub identified: u64,
    pub positive_pions: u64,
    pub negative_pions: u64,
}

impl FusionStats {
    pub fn merge(&mut self, other: &FusionStats) {
        self.events += other.events;
        self.events_with_trigger += other.events_with_trigger;
        self.candidates += other.candidates;
        self.invalid += other.invalid;
        self.quality_failed += other.quality_failed;
        self.fiducial_failed += other.fiducial_failed;
        self.unsupported += other.unsupported;
        self.identified += other.identified;
        self.positive_pions += other.positive_pions;
        self.negative_pions += other.negative_pions;
    }
}

/// Fusion of the detector banks of one run.
pub struct FusionEngine<'a, S: SamplingFractionTest + ?Sized> {
    config: FusionConfig,
    sf: &'a S,
}

impl<'a, S: SamplingFractionTest + ?Sized> FusionEngine<'a, S> {
    pub fn new(config: FusionConfig, sf: &'a S) -> Self {
        FusionEngine { config, sf }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuse all track rows of one event.
    ///
    /// Candidates are returned in track row order. The first one that qualifies as the
    /// trigger electron carries `is_trigger`; no other does.
    ///
    /// # Arguments
    ///
    /// * `rows` - decoded banks of the event
    /// * `stats` - counters updated with the outcome of every track row
    ///
    /// # Returns
    ///
    /// * `Result<Vec<FusedParticle>>` - corrupt bank contents abort the pass
    ///
    pub fn process_event(&self, rows: &DetectorRows, stats: &mut FusionStats) -> Result<Vec<FusedParticle>> {
        let mut fused = Vec::with_capacity(rows.tracks.len());
        let mut trigger_found = false;
        stats.events += 1;

        for track_row in 0..rows.tracks.len() {
            stats.candidates += 1;

            let candidate = match build_candidate(rows, track_row, self.config.fmt_layers)? {
                Some(candidate) => candidate,
                None => {
                    debug!("track row {}: no valid association, skipped", track_row);
                    stats.invalid += 1;
                    continue;
                }
            };

            if let Some(quality) = &self.config.quality {
                if !quality.accepts(&candidate) {
                    stats.quality_failed += 1;
                    continue;
                }
            }

            if self.config.fmt_cut && !self.config.geometry.apply(&candidate)? {
                stats.fiducial_failed += 1;
                continue;
            }

            let energy = get_deposited_energy(candidate.pindex, &rows.calorimeter)?;
            let nphe = count_photoelectrons(candidate.pindex, &rows.cherenkov)?;
            let tof = get_tof(candidate.pindex, &rows.scintillator, &rows.calorimeter);

            let input = ClassifierInput {
                pid: candidate.pid,
                status: candidate.status,
                charge: candidate.charge,
                sector: candidate.sector,
                momentum: candidate.p(),
                energy,
                nphe,
            };
            let classification = match classify(&input, self.sf) {
                Ok(classification) => classification,
                Err(RgeError::UnsupportedParticleId { pid }) => {
                    debug!("track row {}: unsupported pid {}, skipped", track_row, pid);
                    stats.unsupported += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let is_trigger = !trigger_found && classification.trigger_eligible;
            trigger_found |= is_trigger;

            if classification.pid != 0 {
                stats.identified += 1;
            }
            match classification.pid {
                211 => stats.positive_pions += 1,
                -211 => stats.negative_pions += 1,
                _ => {}
            }

            fused.push(FusedParticle {
                candidate,
                tof,
                energy,
                nphe,
                pid: classification.pid,
                is_trigger,
            });
        }

        if trigger_found {
            stats.events_with_trigger += 1;
        }
        Ok(fused)
    }
}

/// The trigger particle of an event, if any.
pub fn trigger(particles: &[FusedParticle]) -> Option<&FusedParticle> {
    particles.iter().find(|p| p.is_trigger)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::algorithm::sampling_fraction::tests::flat_table;
    use crate::data::detector::{FmtTrackRow, ParticleRow, TrackRow};

    fn scintillator(pindex: i32, layer: i32, time: f64) -> ScintillatorRow {
        ScintillatorRow { pindex, detector: FTOF_ID, sector: 1, layer, component: 10, energy: 5.0, time, path: 650.0 }
    }

    fn calorimeter(pindex: i32, layer: i32, energy: f64, time: f64) -> CalorimeterRow {
        CalorimeterRow { pindex, detector: 7, sector: 1, layer, energy, time, path: 700.0 }
    }

    fn cherenkov(pindex: i32, detector: i32, nphe: f64) -> CherenkovRow {
        CherenkovRow { pindex, detector, sector: 1, nphe, time: 20.0, path: 150.0 }
    }

    fn particle(pid: i32, charge: i32, status: i32, p: (f64, f64, f64)) -> ParticleRow {
        ParticleRow {
            pid,
            px: p.0,
            py: p.1,
            pz: p.2,
            vx: 0.1,
            vy: -0.1,
            vz: -3.0,
            vt: 0.0,
            charge,
            beta: 1.0,
            chi2pid: 0.5,
            status,
        }
    }

    fn track(index: i32, pindex: i32, sector: i32) -> TrackRow {
        TrackRow { index, pindex, detector: 6, sector, status: 1, q: -1, chi2: 20.0, ndf: 10 }
    }

    /// Two electrons passing every trigger requirement followed by a positive pion.
    pub(crate) fn event_rows() -> DetectorRows {
        DetectorRows {
            particles: vec![
                particle(11, -1, -2110, (0.3, 0.2, 3.98)),
                particle(11, -1, -2110, (0.1, 0.4, 3.97)),
                particle(211, 1, 2110, (0.2, 0.1, 1.5)),
            ],
            tracks: vec![track(0, 0, 1), track(1, 1, 2), track(2, 2, 4)],
            calorimeter: vec![
                calorimeter(0, PCAL_LYR, 0.6, 25.0),
                calorimeter(0, ECIN_LYR, 0.4, 25.5),
                calorimeter(1, PCAL_LYR, 0.7, 26.0),
                calorimeter(1, ECOU_LYR, 0.3, 26.5),
            ],
            cherenkov: vec![cherenkov(0, HTCC_ID, 10.0), cherenkov(1, HTCC_ID, 8.0)],
            scintillator: vec![scintillator(0, FTOF1B_LYR, 24.0), scintillator(2, FTOF1A_LYR, 27.0)],
            fmt_tracks: vec![],
        }
    }

    #[test]
    fn test_tof_layer_precedence() {
        let a = scintillator(0, FTOF1A_LYR, 10.0);
        let b = scintillator(0, FTOF1B_LYR, 12.0);
        assert_eq!(get_tof(0, &[a.clone(), b.clone()], &[]), Some(12.0));
        assert_eq!(get_tof(0, &[b, a], &[]), Some(12.0));

        // first row wins among equal layers
        let first = scintillator(0, FTOF2_LYR, 30.0);
        let second = scintillator(0, FTOF2_LYR, 31.0);
        assert_eq!(get_tof(0, &[first, second], &[]), Some(30.0));
    }

    #[test]
    fn test_tof_falls_back_to_calorimeter() {
        let other = scintillator(1, FTOF1B_LYR, 5.0);
        let ecal = [calorimeter(0, ECOU_LYR, 0.1, 40.0), calorimeter(0, ECIN_LYR, 0.2, 39.0)];
        assert_eq!(get_tof(0, &[other], &ecal), Some(39.0));
        assert_eq!(get_tof(2, &[], &ecal), None);
    }

    #[test]
    fn test_deposited_energy() {
        let rows = [
            calorimeter(0, PCAL_LYR, 1.0, 0.0),
            calorimeter(0, PCAL_LYR, 0.5, 0.0),
            calorimeter(0, ECIN_LYR, 2.0, 0.0),
            calorimeter(1, ECOU_LYR, 9.0, 0.0),
        ];
        let energy = get_deposited_energy(0, &rows).unwrap();
        assert_eq!(energy, DepositedEnergy { pcal: 1.5, ecin: 2.0, ecou: 0.0 });
        assert_eq!(energy.total(), 3.5);

        let bad = [calorimeter(0, 3, 1.0, 0.0)];
        assert_eq!(get_deposited_energy(0, &bad), Err(RgeError::InvalidCalorimeterLayer { layer: 3 }));
        // rows of other particles are never inspected
        assert!(get_deposited_energy(1, &bad).is_ok());
    }

    #[test]
    fn test_photoelectrons() {
        let rows = [cherenkov(0, HTCC_ID, 4.0), cherenkov(0, LTCC_ID, 1.0), cherenkov(0, HTCC_ID, 2.5)];
        assert_eq!(count_photoelectrons(0, &rows).unwrap(), Photoelectrons { htcc: 6.5, ltcc: 1.0 });
        assert_eq!(
            count_photoelectrons(0, &[cherenkov(0, 14, 1.0)]),
            Err(RgeError::InvalidCherenkovId { detector: 14 })
        );
    }

    #[test]
    fn test_fmt_window_at_origin() {
        let cut = FmtGeometryCut::default();
        let (theta_min, theta_max) = cut.window(0.0).unwrap();
        let expected_min = to_rad(FMTCUT_ANGLE * (FMTCUT_RMIN / FMTCUT_Z0).atan()).unwrap();
        let expected_max = to_rad(FMTCUT_ANGLE * (FMTCUT_RMAX / FMTCUT_Z0).atan()).unwrap();
        assert!((theta_min - expected_min).abs() < 1e-12);
        assert!((theta_max - expected_max).abs() < 1e-12);

        assert!(cut.accepts(0.0, theta_min).unwrap());
        assert!(cut.accepts(0.0, theta_max).unwrap());
        assert!(!cut.accepts(0.0, theta_min - 1e-9).unwrap());
        assert!(!cut.accepts(0.0, theta_max + 1e-9).unwrap());
    }

    #[test]
    fn test_fmt_window_on_reference_plane_fails() {
        let cut = FmtGeometryCut::default();
        assert!(matches!(cut.window(FMTCUT_Z0), Err(RgeError::AngleConversion { .. })));
    }

    #[test]
    fn test_fmt_cut_on_candidate() {
        let rows = event_rows();
        let mut candidate = build_candidate(&rows, 0, FmtLayers::None).unwrap().unwrap();
        // about 5 degrees, inside the FMT hole
        assert!(!apply_fmt_geometry_cut(&candidate).unwrap());

        candidate.momentum = Vector3::new(0.6, 0.0, 3.0);
        assert!(apply_fmt_geometry_cut(&candidate).unwrap());

        candidate.vertex.z = FMTCUT_Z0;
        assert!(apply_fmt_geometry_cut(&candidate).is_err());
    }

    #[test]
    fn test_candidate_sector_and_association() {
        let mut rows = event_rows();
        rows.tracks.push(track(3, 7, 2));
        assert!(build_candidate(&rows, 3, FmtLayers::None).unwrap().is_none());

        rows.tracks[0].sector = 0;
        assert_eq!(build_candidate(&rows, 0, FmtLayers::None), Err(RgeError::InvalidSector { sector: 0 }));
    }

    #[test]
    fn test_candidate_takes_fmt_segment() {
        let mut rows = event_rows();
        assert!(build_candidate(&rows, 0, FmtLayers::Two).unwrap().is_none());

        rows.fmt_tracks.push(FmtTrackRow {
            index: 0,
            status: 0,
            sector: 1,
            vx: 0.0,
            vy: 0.0,
            vz: -1.5,
            px: 0.31,
            py: 0.21,
            pz: 3.99,
            q: -1,
            chi2: 3.0,
            ndf: 2,
        });
        let candidate = build_candidate(&rows, 0, FmtLayers::Two).unwrap().unwrap();
        assert_eq!(candidate.vertex.z, -1.5);
        assert_eq!(candidate.momentum.z, 3.99);
        assert!(build_candidate(&rows, 0, FmtLayers::Three).unwrap().is_none());
    }

    #[test]
    fn test_exactly_one_trigger() {
        let sf = flat_table(0.25, 0.02);
        let engine = FusionEngine::new(FusionConfig::default(), &sf);
        let mut stats = FusionStats::default();
        let fused = engine.process_event(&event_rows(), &mut stats).unwrap();

        assert_eq!(fused.len(), 3);
        assert_eq!(fused.iter().filter(|p| p.is_trigger).count(), 1);
        assert!(fused[0].is_trigger);
        assert_eq!(fused[1].pid, 11);
        assert_eq!(fused[2].pid, 211);
        assert_eq!(fused[0].tof, Some(24.0));
        assert_eq!(trigger(&fused).map(|p| p.candidate.pindex), Some(0));
        assert_eq!(stats.events_with_trigger, 1);
        assert_eq!(stats.positive_pions, 1);
    }

    #[test]
    fn test_process_event_is_idempotent() {
        let sf = flat_table(0.25, 0.02);
        let engine = FusionEngine::new(FusionConfig::default(), &sf);
        let rows = event_rows();
        let mut stats = FusionStats::default();
        let first = engine.process_event(&rows, &mut stats).unwrap();
        let second = engine.process_event(&rows, &mut stats).unwrap();
        assert_eq!(first, second);
        assert_eq!(stats.events, 2);
    }

    #[test]
    fn test_no_trigger_without_cherenkov() {
        let sf = flat_table(0.25, 0.02);
        let engine = FusionEngine::new(FusionConfig::default(), &sf);
        let mut rows = event_rows();
        rows.cherenkov.clear();
        let mut stats = FusionStats::default();
        let fused = engine.process_event(&rows, &mut stats).unwrap();
        assert!(trigger(&fused).is_none());
        assert_eq!(stats.events_with_trigger, 0);
    }

    #[test]
    fn test_skips_are_counted() {
        let sf = flat_table(0.25, 0.02);
        let config = FusionConfig { quality: Some(QualityCuts::default()), ..FusionConfig::default() };
        let engine = FusionEngine::new(config, &sf);
        let mut rows = event_rows();
        rows.particles[2].pid = 3122;
        rows.tracks[1].chi2 = 200.0;
        let mut stats = FusionStats::default();
        let fused = engine.process_event(&rows, &mut stats).unwrap();
        assert_eq!(fused.len(), 1);
        assert_eq!(stats.quality_failed, 1);
        assert_eq!(stats.unsupported, 1);
    }

    #[test]
    fn test_corrupt_calorimeter_aborts() {
        let sf = flat_table(0.25, 0.02);
        let engine = FusionEngine::new(FusionConfig::default(), &sf);
        let mut rows = event_rows();
        rows.calorimeter.push(calorimeter(2, 5, 0.1, 30.0));
        let mut stats = FusionStats::default();
        assert_eq!(
            engine.process_event(&rows, &mut stats),
            Err(RgeError::InvalidCalorimeterLayer { layer: 5 })
        );
    }
}
