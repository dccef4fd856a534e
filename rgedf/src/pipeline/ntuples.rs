use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use rgecore::algorithm::fusion::{FmtLayers, FusionEngine, FusionStats};
use rgecore::algorithm::sampling_fraction::CalibrationTable;
use rgecore::data::bank::{BankKind, EventContext};
use rgecore::data::detector::EventBanks;
use rgecore::data::record::{event_records, ParticleRecord, RunInfo};
use serde::{Deserialize, Serialize};

use crate::config::NtuplesConfig;
use crate::data::calibration::read_calibration;
use crate::data::ntuple::NtupleWriter;
use crate::data::store::EventStore;
use crate::error::{DataError, Result};
use crate::run::{beam_energy, run_number};

/// Events between two progress lines.
const PROGRESS_INTERVAL: usize = 100_000;

/// Records buffered before they are written in one transaction.
const WRITE_BATCH: usize = 10_000;

/// Outcome of a make-ntuples run, written as JSON next to the ntuple.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NtuplesSummary {
    pub run: i64,
    pub beam_energy: f64,
    pub fmt_layers: u8,
    pub events_read: u64,
    pub events_without_tracks: u64,
    pub records_written: u64,
    pub fusion: FusionStats,
    pub output: PathBuf,
}

/// Ntuple file of `run` in `work_dir`.
pub fn ntuple_path(work_dir: &Path, run: i64, fmt_layers: FmtLayers) -> PathBuf {
    match fmt_layers {
        FmtLayers::None => work_dir.join(format!("ntuples_dc_{:06}.db", run)),
        layers => work_dir.join(format!("ntuples_fmt{}_{:06}.db", layers.count(), run)),
    }
}

/// Summary file accompanying `output`.
pub fn summary_path(output: &Path) -> PathBuf {
    output.with_extension("json")
}

/// File the ntuple is filled in before it is moved to `output`.
pub fn partial_path(output: &Path) -> PathBuf {
    output.with_extension("db.part")
}

/// Reconstruct every event of the event store at `input` and write the particle records
/// of events with a trigger electron to an ntuple.
///
/// Configuration, calibration and output problems are reported before the first event is
/// read. Corrupt banks abort the run and leave no ntuple behind: records are collected in a
/// partial file that only becomes the ntuple once every event was processed.
///
/// # Arguments
///
/// * `input` - event store, named `<text><run number>.<extension>`
/// * `config` - run settings
///
/// # Returns
///
/// * `Result<NtuplesSummary>` - counters of the run
///
pub fn make_ntuples(input: &Path, config: &NtuplesConfig) -> Result<NtuplesSummary> {
    // get the run metadata
    let run = run_number(input)?;
    let energy = beam_energy(run, config.beam_energy)?;
    let fusion_config = config.fusion_config()?;
    let calibration = read_calibration(&config.data_dir, run)?;

    // check input and output before touching either
    fs::metadata(input)?;
    let output = ntuple_path(&config.work_dir, run, fusion_config.fmt_layers);
    if output.exists() {
        return Err(DataError::OutputExists(output));
    }

    let store = EventStore::open(input)?;
    if fusion_config.fmt_layers.required() && !store.has_bank(BankKind::FmtTracks.name()) {
        return Err(DataError::NoFmtBank(input.to_path_buf()));
    }
    let n_events = config.n_events.map_or(store.len(), |n| n.min(store.len()));
    if n_events == 0 {
        warn!("event store {} holds no events", input.display());
    }
    info!(
        "run {}: {} events, beam energy {} GeV, {} FMT layers, fmt cut {}",
        run,
        n_events,
        energy,
        fusion_config.fmt_layers.count(),
        fusion_config.fmt_cut
    );

    // leftover of an aborted run
    let partial = partial_path(&output);
    if partial.exists() {
        warn!("removing stale partial ntuple {}", partial.display());
        fs::remove_file(&partial)?;
    }

    let mut summary = NtuplesSummary {
        run,
        beam_energy: energy,
        fmt_layers: fusion_config.fmt_layers.count(),
        output: output.clone(),
        ..NtuplesSummary::default()
    };

    let engine = FusionEngine::new(fusion_config, &calibration);
    let info = RunInfo { run, beam_energy: energy };
    let filled = NtupleWriter::create(&partial)
        .and_then(|writer| fill_ntuple(writer, &store, n_events, &engine, &info, &mut summary));
    if let Err(e) = filled {
        if partial.exists() {
            fs::remove_file(&partial)?;
        }
        return Err(e);
    }
    fs::rename(&partial, &output)?;

    info!("e-  found: {}", summary.fusion.events_with_trigger);
    info!("pi+ found: {}", summary.fusion.positive_pions);
    info!("pi- found: {}", summary.fusion.negative_pions);
    info!(
        "skipped candidates: {} invalid, {} quality, {} fiducial, {} unsupported",
        summary.fusion.invalid,
        summary.fusion.quality_failed,
        summary.fusion.fiducial_failed,
        summary.fusion.unsupported
    );

    fs::write(summary_path(&output), serde_json::to_string_pretty(&summary)?)?;
    info!("wrote {} records to {}", summary.records_written, output.display());
    Ok(summary)
}

/// Run the first `n_events` events of `store` through `engine` and write their records.
///
/// The writer is consumed so the ntuple is closed once this returns.
fn fill_ntuple(
    mut writer: NtupleWriter,
    store: &EventStore,
    n_events: usize,
    engine: &FusionEngine<'_, CalibrationTable>,
    info: &RunInfo,
    summary: &mut NtuplesSummary,
) -> Result<()> {
    let mut banks = EventBanks::new(engine.config().fmt_layers.required());
    let mut buffer: Vec<ParticleRecord> = Vec::with_capacity(WRITE_BATCH);

    for id in 0..n_events {
        if id > 0 && id % PROGRESS_INTERVAL == 0 {
            info!("processed {} / {} events", id, n_events);
        }

        banks.advance(&EventContext::new(store, id))?;
        let rows = banks.rows()?;
        summary.events_read += 1;
        if rows.particles.is_empty() || rows.tracks.is_empty() {
            summary.events_without_tracks += 1;
            continue;
        }

        let event = store.event_number(id)?;
        let fused = match engine.process_event(&rows, &mut summary.fusion) {
            Ok(fused) => fused,
            Err(e) => {
                if e.is_corrupt_bank() {
                    error!("corrupt detector bank in event {} ({} of {})", event, id, n_events);
                }
                return Err(e.into());
            }
        };
        let records = event_records(&fused, info, event);
        if records.is_empty() {
            debug!("event {}: no trigger electron", event);
            continue;
        }
        buffer.extend(records);

        if buffer.len() >= WRITE_BATCH {
            writer.write(&buffer)?;
            buffer.clear();
        }
    }
    writer.write(&buffer)?;
    summary.records_written = writer.written();
    Ok(())
}
