// Purpose: To store detector, particle and cut constants used by the reconstruction

// Masses
pub const MASS_ELECTRON: f64 = 0.000511; // GeV
pub const MASS_MUON: f64 = 0.105658; // GeV
pub const MASS_PION: f64 = 0.139570; // GeV, charged
pub const MASS_PION_ZERO: f64 = 0.134977; // GeV
pub const MASS_KAON: f64 = 0.493677; // GeV, charged
pub const MASS_KAON_ZERO: f64 = 0.497614; // GeV
pub const MASS_PROTON: f64 = 0.938272; // GeV
pub const MASS_NEUTRON: f64 = 0.939565; // GeV
pub const MASS_DEUTERON: f64 = 1.875; // GeV

// Detector geometry
pub const NSECTORS: usize = 6;

// Detector ids in the reconstruction banks
pub const FTOF_ID: i32 = 12;
pub const HTCC_ID: i32 = 15;
pub const LTCC_ID: i32 = 16;

// FTOF layers
pub const FTOF1A_LYR: i32 = 1;
pub const FTOF1B_LYR: i32 = 2;
pub const FTOF2_LYR: i32 = 3;

// ECAL layers
pub const PCAL_LYR: i32 = 1;
pub const ECIN_LYR: i32 = 4;
pub const ECOU_LYR: i32 = 7;

// FMT geometry cut: inner and outer radius of the FMT (cm), z of its first layer (cm), angle scale
pub const FMTCUT_RMIN: f64 = 4.2575;
pub const FMTCUT_RMAX: f64 = 18.48;
pub const FMTCUT_Z0: f64 = 26.1197;
pub const FMTCUT_ANGLE: f64 = 57.29;

// FMT layers a track may be required to cross
pub const FMT_MIN_LAYERS: u8 = 2;
pub const FMT_NLAYERS: u8 = 3;

// Sampling fraction
pub const NSFPARAMS: usize = 4;
pub const SF_CHI2_CONFORMITY: f64 = 2.0; // source of systematic error

// Trigger electron identification
pub const TRIGGER_PID: i32 = 11;
pub const HTCC_NPHE_CUT: f64 = 2.0;
pub const PCAL_ENERGY_CUT: f64 = 0.07; // GeV

// Track quality and DIS cuts
pub const Q2_CUT: f64 = 1.0; // GeV^2, Q2 of trigger must be over this value
pub const W2_CUT: f64 = 4.0; // GeV^2, W2 of trigger must be over this value
pub const CHI2NDF_CUT: f64 = 15.0;
pub const VXVY_CUT: f64 = 4.0; // cm
pub const VZ_LOW_CUT: f64 = -40.0; // cm
pub const VZ_HIGH_CUT: f64 = 26.1197; // cm

// Run numbers of simulated samples are 999xxx
pub const SIMULATION_RUN_PREFIX: i64 = 999;
