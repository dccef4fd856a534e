use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::info;
use rayon::ThreadPoolBuilder;
use rgecore::algorithm::binning::{AcceptanceTable, SampleKind, SpeciesStats, AXIS_NAMES, NAXES};
use serde::{Deserialize, Serialize};

use crate::config::{BinningConfig, CutsConfig};
use crate::data::acceptance::{acceptance_path, write_acceptance};
use crate::data::ntuple::read_sample;
use crate::error::{DataError, Result};

/// Outcome of an acc-corr run, written as JSON next to the acceptance table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccCorrSummary {
    pub thrown_rows: u64,
    pub simulated_rows: u64,
    pub species: Vec<SpeciesStats>,
    pub output: PathBuf,
}

/// Count the thrown and simulated samples on the configured binning and write the
/// acceptance table to `work_dir`.
///
/// # Arguments
///
/// * `thrown` - ntuple of generated events
/// * `simulated` - ntuple of reconstructed simulated events
/// * `work_dir` - directory receiving the acceptance table
/// * `binning` - bin edges and sample settings
/// * `cuts` - DIS cuts applied before binning
///
pub fn acc_corr(
    thrown: &Path,
    simulated: &Path,
    work_dir: &Path,
    binning: &BinningConfig,
    cuts: &CutsConfig,
) -> Result<AccCorrSummary> {
    let edges = binning.binning()?;
    for axis in 0..NAXES {
        info!("{:>6} = [{}]", AXIS_NAMES[axis], edges.axis(axis).edges().iter().map(|e| format!("{:.2}", e)).join(", "));
    }

    let output = acceptance_path(work_dir);
    if output.exists() {
        return Err(DataError::OutputExists(output));
    }
    fs::metadata(thrown)?;
    fs::metadata(simulated)?;

    let thrown = read_sample(thrown, SampleKind::Thrown, binning.thrown_phipq_in_degrees)?;
    let simulated = read_sample(simulated, SampleKind::Simulated, binning.simulated_phipq_in_degrees)?;
    for sample in [&thrown, &simulated] {
        info!("{} sample: {} rows", sample.kind.to_str(), sample.rows.len());
    }

    let mut builder = ThreadPoolBuilder::new();
    if let Some(threads) = binning.threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;
    let cuts = cuts.binning_cuts();
    let (table, species) = pool.install(|| AcceptanceTable::build(&edges, &cuts, &thrown, &simulated));

    for stats in &species {
        info!(
            "pid {:>6}: {} / {} thrown, {} / {} simulated rows binned",
            stats.pid, stats.thrown.accepted, stats.thrown.rows, stats.simulated.accepted, stats.simulated.rows
        );
        debug_assert_eq!(table.thrown(stats.pid).map(|c| c.total()), Some(stats.thrown.accepted));
        debug_assert_eq!(table.simulated(stats.pid).map(|c| c.total()), Some(stats.simulated.accepted));
    }

    write_acceptance(&output, &table)?;

    let summary = AccCorrSummary {
        thrown_rows: thrown.rows.len() as u64,
        simulated_rows: simulated.rows.len() as u64,
        species,
        output: output.clone(),
    };
    fs::write(output.with_extension("json"), serde_json::to_string_pretty(&summary)?)?;
    info!("wrote acceptance table of {} species to {}", summary.species.len(), output.display());
    Ok(summary)
}
