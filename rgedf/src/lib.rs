pub mod config;
pub mod error;
pub mod run;

pub mod data {
    pub mod acceptance;
    pub mod calibration;
    pub mod ntuple;
    pub mod store;
    pub mod utility;
}

pub mod pipeline {
    pub mod acc_corr;
    pub mod ntuples;
}
