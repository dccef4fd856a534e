//! Typed rows of the detector banks read by the reconstruction.
//!
//! Field order in the `*_FIELDS` tables is the column order of a bound [`Bank`]; the row
//! decoders below index into it by position, so rows decode without any string lookup.

use crate::data::bank::{Bank, BankKind, BankRow, EventContext, Primitive};
use crate::error::Result;

use Primitive::{Byte, Float, Int, Short};

pub const PARTICLE_FIELDS: &[(&str, Primitive)] = &[
    ("pid", Int),
    ("px", Float),
    ("py", Float),
    ("pz", Float),
    ("vx", Float),
    ("vy", Float),
    ("vz", Float),
    ("vt", Float),
    ("charge", Byte),
    ("beta", Float),
    ("chi2pid", Float),
    ("status", Short),
];

pub const TRACK_FIELDS: &[(&str, Primitive)] = &[
    ("index", Short),
    ("pindex", Short),
    ("detector", Byte),
    ("sector", Byte),
    ("status", Short),
    ("q", Byte),
    ("chi2", Float),
    ("NDF", Short),
];

pub const CALORIMETER_FIELDS: &[(&str, Primitive)] = &[
    ("index", Short),
    ("pindex", Short),
    ("detector", Byte),
    ("sector", Byte),
    ("layer", Byte),
    ("energy", Float),
    ("time", Float),
    ("path", Float),
];

pub const CHERENKOV_FIELDS: &[(&str, Primitive)] = &[
    ("index", Short),
    ("pindex", Short),
    ("detector", Byte),
    ("sector", Byte),
    ("nphe", Float),
    ("time", Float),
    ("path", Float),
];

pub const SCINTILLATOR_FIELDS: &[(&str, Primitive)] = &[
    ("index", Short),
    ("pindex", Short),
    ("detector", Byte),
    ("sector", Byte),
    ("layer", Byte),
    ("component", Short),
    ("energy", Float),
    ("time", Float),
    ("path", Float),
];

pub const FMT_TRACK_FIELDS: &[(&str, Primitive)] = &[
    ("index", Short),
    ("status", Byte),
    ("sector", Byte),
    ("Vtx0_x", Float),
    ("Vtx0_y", Float),
    ("Vtx0_z", Float),
    ("p0_x", Float),
    ("p0_y", Float),
    ("p0_z", Float),
    ("q", Byte),
    ("chi2", Float),
    ("NDF", Byte),
];

/// One row of `REC::Particle`.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleRow {
    pub pid: i32,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub vt: f64,
    pub charge: i32,
    pub beta: f64,
    pub chi2pid: f64,
    pub status: i32,
}

impl BankRow for ParticleRow {
    const KIND: BankKind = BankKind::Particle;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self> {
        Ok(ParticleRow {
            pid: bank.i64_at(0, row)? as i32,
            px: bank.f64_at(1, row)?,
            py: bank.f64_at(2, row)?,
            pz: bank.f64_at(3, row)?,
            vx: bank.f64_at(4, row)?,
            vy: bank.f64_at(5, row)?,
            vz: bank.f64_at(6, row)?,
            vt: bank.f64_at(7, row)?,
            charge: bank.i64_at(8, row)? as i32,
            beta: bank.f64_at(9, row)?,
            chi2pid: bank.f64_at(10, row)?,
            status: bank.i64_at(11, row)? as i32,
        })
    }
}

/// One row of `REC::Track`.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRow {
    pub index: i32,
    pub pindex: i32,
    pub detector: i32,
    pub sector: i32,
    pub status: i32,
    pub q: i32,
    pub chi2: f64,
    pub ndf: i32,
}

impl BankRow for TrackRow {
    const KIND: BankKind = BankKind::Track;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self> {
        Ok(TrackRow {
            index: bank.i64_at(0, row)? as i32,
            pindex: bank.i64_at(1, row)? as i32,
            detector: bank.i64_at(2, row)? as i32,
            sector: bank.i64_at(3, row)? as i32,
            status: bank.i64_at(4, row)? as i32,
            q: bank.i64_at(5, row)? as i32,
            chi2: bank.f64_at(6, row)?,
            ndf: bank.i64_at(7, row)? as i32,
        })
    }
}

/// One row of `REC::Calorimeter`.
#[derive(Clone, Debug, PartialEq)]
pub struct CalorimeterRow {
    pub pindex: i32,
    pub detector: i32,
    pub sector: i32,
    pub layer: i32,
    pub energy: f64,
    pub time: f64,
    pub path: f64,
}

impl BankRow for CalorimeterRow {
    const KIND: BankKind = BankKind::Calorimeter;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self> {
        Ok(CalorimeterRow {
            pindex: bank.i64_at(1, row)? as i32,
            detector: bank.i64_at(2, row)? as i32,
            sector: bank.i64_at(3, row)? as i32,
            layer: bank.i64_at(4, row)? as i32,
            energy: bank.f64_at(5, row)?,
            time: bank.f64_at(6, row)?,
            path: bank.f64_at(7, row)?,
        })
    }
}

/// One row of `REC::Cherenkov`.
#[derive(Clone, Debug, PartialEq)]
pub struct CherenkovRow {
    pub pindex: i32,
    pub detector: i32,
    pub sector: i32,
    pub nphe: f64,
    pub time: f64,
    pub path: f64,
}

impl BankRow for CherenkovRow {
    const KIND: BankKind = BankKind::Cherenkov;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self> {
        Ok(CherenkovRow {
            pindex: bank.i64_at(1, row)? as i32,
            detector: bank.i64_at(2, row)? as i32,
            sector: bank.i64_at(3, row)? as i32,
            nphe: bank.f64_at(4, row)?,
            time: bank.f64_at(5, row)?,
            path: bank.f64_at(6, row)?,
        })
    }
}

/// One row of `REC::Scintillator`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScintillatorRow {
    pub pindex: i32,
    pub detector: i32,
    pub sector: i32,
    pub layer: i32,
    pub component: i32,
    pub energy: f64,
    pub time: f64,
    pub path: f64,
}

impl BankRow for ScintillatorRow {
    const KIND: BankKind = BankKind::Scintillator;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self> {
        Ok(ScintillatorRow {
            pindex: bank.i64_at(1, row)? as i32,
            detector: bank.i64_at(2, row)? as i32,
            sector: bank.i64_at(3, row)? as i32,
            layer: bank.i64_at(4, row)? as i32,
            component: bank.i64_at(5, row)? as i32,
            energy: bank.f64_at(6, row)?,
            time: bank.f64_at(7, row)?,
            path: bank.f64_at(8, row)?,
        })
    }
}

/// One row of `FMT::Tracks`, a track segment refitted with the forward micromegas tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct FmtTrackRow {
    pub index: i32,
    pub status: i32,
    pub sector: i32,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub q: i32,
    pub chi2: f64,
    pub ndf: i32,
}

impl BankRow for FmtTrackRow {
    const KIND: BankKind = BankKind::FmtTracks;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self> {
        Ok(FmtTrackRow {
            index: bank.i64_at(0, row)? as i32,
            status: bank.i64_at(1, row)? as i32,
            sector: bank.i64_at(2, row)? as i32,
            vx: bank.f64_at(3, row)?,
            vy: bank.f64_at(4, row)?,
            vz: bank.f64_at(5, row)?,
            px: bank.f64_at(6, row)?,
            py: bank.f64_at(7, row)?,
            pz: bank.f64_at(8, row)?,
            q: bank.i64_at(9, row)? as i32,
            chi2: bank.f64_at(10, row)?,
            ndf: bank.i64_at(11, row)? as i32,
        })
    }
}

/// All rows of one event, decoded into their typed representations.
#[derive(Clone, Debug, Default)]
pub struct DetectorRows {
    pub particles: Vec<ParticleRow>,
    pub tracks: Vec<TrackRow>,
    pub calorimeter: Vec<CalorimeterRow>,
    pub cherenkov: Vec<CherenkovRow>,
    pub scintillator: Vec<ScintillatorRow>,
    pub fmt_tracks: Vec<FmtTrackRow>,
}

/// The six banks of one event, advanced together.
pub struct EventBanks {
    pub particle: Bank,
    pub track: Bank,
    pub calorimeter: Bank,
    pub cherenkov: Bank,
    pub scintillator: Bank,
    pub fmt_tracks: Bank,
    read_fmt: bool,
}

impl EventBanks {
    /// # Arguments
    ///
    /// * `read_fmt` - read `FMT::Tracks` on advance; when false that bank stays empty
    ///
    pub fn new(read_fmt: bool) -> Self {
        EventBanks {
            particle: Bank::for_kind(BankKind::Particle),
            track: Bank::for_kind(BankKind::Track),
            calorimeter: Bank::for_kind(BankKind::Calorimeter),
            cherenkov: Bank::for_kind(BankKind::Cherenkov),
            scintillator: Bank::for_kind(BankKind::Scintillator),
            fmt_tracks: Bank::for_kind(BankKind::FmtTracks),
            read_fmt,
        }
    }

    pub fn advance(&mut self, ctx: &EventContext) -> Result<()> {
        self.particle.advance(ctx)?;
        self.track.advance(ctx)?;
        self.calorimeter.advance(ctx)?;
        self.cherenkov.advance(ctx)?;
        self.scintillator.advance(ctx)?;
        if self.read_fmt {
            self.fmt_tracks.advance(ctx)?;
        }
        Ok(())
    }

    pub fn rows(&self) -> Result<DetectorRows> {
        Ok(DetectorRows {
            particles: self.particle.rows()?,
            tracks: self.track.rows()?,
            calorimeter: self.calorimeter.rows()?,
            cherenkov: self.cherenkov.rows()?,
            scintillator: self.scintillator.rows()?,
            fmt_tracks: if self.read_fmt { self.fmt_tracks.rows()? } else { Vec::new() },
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::bank::{Column, RawBank};

    /// Raw banks built from typed rows, shared by the fusion and classification tests.
    pub(crate) fn raw_calorimeter(rows: &[(i16, i8, f32, f32)]) -> RawBank {
        let n = rows.len();
        RawBank::new(n)
            .with_column("index", Column::Short((0..n as i16).collect()))
            .with_column("pindex", Column::Short(rows.iter().map(|r| r.0).collect()))
            .with_column("detector", Column::Byte(vec![7; n]))
            .with_column("sector", Column::Byte(vec![1; n]))
            .with_column("layer", Column::Byte(rows.iter().map(|r| r.1).collect()))
            .with_column("energy", Column::Float(rows.iter().map(|r| r.2).collect()))
            .with_column("time", Column::Float(rows.iter().map(|r| r.3).collect()))
            .with_column("path", Column::Float(vec![700.0; n]))
    }

    #[test]
    fn test_typed_rows_follow_field_tables() {
        let mut bank = Bank::for_kind(BankKind::Calorimeter);
        bank.bind(raw_calorimeter(&[(0, 1, 0.25, 30.0), (1, 4, 0.5, 31.0)])).unwrap();

        let rows: Vec<CalorimeterRow> = bank.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pindex, 1);
        assert_eq!(rows[1].layer, 4);
        assert!((rows[1].energy - 0.5).abs() < 1e-6);
        assert!((rows[0].time - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_accessor_positions_match_schema() {
        let schema = BankKind::Particle.schema();
        assert_eq!(schema.position("pid"), Some(0));
        assert_eq!(schema.position("status"), Some(11));
        let schema = BankKind::FmtTracks.schema();
        assert_eq!(schema.position("NDF"), Some(11));
        let schema = BankKind::Scintillator.schema();
        assert_eq!(schema.position("time"), Some(7));
    }
}
