pub mod error;

// data module
pub mod data {
    pub mod bank;
    pub mod detector;
    pub mod record;
}

// physics module
pub mod physics {
    pub mod constants;
    pub mod pid;
    pub mod kinematics;
}

// algorithm module
pub mod algorithm {
    pub mod sampling_fraction;
    pub mod classify;
    pub mod fusion;
    pub mod binning;
}
