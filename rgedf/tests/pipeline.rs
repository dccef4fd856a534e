use std::path::Path;

use rgecore::algorithm::binning::SampleKind;
use rgecore::algorithm::fusion::FmtLayers;
use rgecore::algorithm::sampling_fraction::CalibrationTable;
use rgecore::data::bank::{BankKind, Column, RawBank};
use rgecore::error::RgeError;
use rgecore::physics::constants::{ECIN_LYR, FTOF1B_LYR, FTOF_ID, HTCC_ID, NSECTORS, PCAL_LYR};
use rgedf::config::{BinningConfig, CutsConfig, NtuplesConfig};
use rgedf::data::acceptance::read_acceptance;
use rgedf::data::calibration::write_calibration;
use rgedf::data::ntuple::read_sample;
use rgedf::data::store::EventStoreWriter;
use rgedf::error::DataError;
use rgedf::pipeline::acc_corr::acc_corr;
use rgedf::pipeline::ntuples::{make_ntuples, ntuple_path, partial_path, summary_path, NtuplesSummary};
use rusqlite::{params, Connection};
use tempfile::tempdir;

const RUN: i64 = 12016;

/// Sampling fraction of 0.25 +- 0.05 in every sector.
fn calibration() -> CalibrationTable {
    let sector = [0.25, 0.05, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    let values: Vec<f64> = (0..NSECTORS).flat_map(|_| sector).collect();
    CalibrationTable::from_values(&values).unwrap()
}

struct Particle {
    pid: i32,
    charge: i8,
    status: i16,
    p: (f32, f32, f32),
}

fn particle_bank(particles: &[Particle]) -> RawBank {
    let n = particles.len();
    RawBank::new(n)
        .with_column("pid", Column::Int(particles.iter().map(|p| p.pid).collect()))
        .with_column("px", Column::Float(particles.iter().map(|p| p.p.0).collect()))
        .with_column("py", Column::Float(particles.iter().map(|p| p.p.1).collect()))
        .with_column("pz", Column::Float(particles.iter().map(|p| p.p.2).collect()))
        .with_column("vx", Column::Float(vec![0.1; n]))
        .with_column("vy", Column::Float(vec![-0.1; n]))
        .with_column("vz", Column::Float(vec![-3.0; n]))
        .with_column("vt", Column::Float(vec![0.0; n]))
        .with_column("charge", Column::Byte(particles.iter().map(|p| p.charge).collect()))
        .with_column("beta", Column::Float(vec![1.0; n]))
        .with_column("chi2pid", Column::Float(vec![0.5; n]))
        .with_column("status", Column::Short(particles.iter().map(|p| p.status).collect()))
}

/// One track per particle, track `i` pointing at particle `i`.
fn track_bank(sectors: &[i8]) -> RawBank {
    let n = sectors.len();
    RawBank::new(n)
        .with_column("index", Column::Short((0..n as i16).collect()))
        .with_column("pindex", Column::Short((0..n as i16).collect()))
        .with_column("detector", Column::Byte(vec![6; n]))
        .with_column("sector", Column::Byte(sectors.to_vec()))
        .with_column("status", Column::Short(vec![1; n]))
        .with_column("q", Column::Byte(vec![-1; n]))
        .with_column("chi2", Column::Float(vec![20.0; n]))
        .with_column("NDF", Column::Short(vec![10; n]))
}

/// Calorimeter hits as `(pindex, layer, energy, time)`.
fn calorimeter_bank(hits: &[(i16, i8, f32, f32)]) -> RawBank {
    let n = hits.len();
    RawBank::new(n)
        .with_column("index", Column::Short((0..n as i16).collect()))
        .with_column("pindex", Column::Short(hits.iter().map(|h| h.0).collect()))
        .with_column("detector", Column::Byte(vec![7; n]))
        .with_column("sector", Column::Byte(vec![1; n]))
        .with_column("layer", Column::Byte(hits.iter().map(|h| h.1).collect()))
        .with_column("energy", Column::Float(hits.iter().map(|h| h.2).collect()))
        .with_column("time", Column::Float(hits.iter().map(|h| h.3).collect()))
        .with_column("path", Column::Float(vec![700.0; n]))
}

/// HTCC hits as `(pindex, nphe)`.
fn cherenkov_bank(hits: &[(i16, f32)]) -> RawBank {
    let n = hits.len();
    RawBank::new(n)
        .with_column("index", Column::Short((0..n as i16).collect()))
        .with_column("pindex", Column::Short(hits.iter().map(|h| h.0).collect()))
        .with_column("detector", Column::Byte(vec![HTCC_ID as i8; n]))
        .with_column("sector", Column::Byte(vec![1; n]))
        .with_column("nphe", Column::Float(hits.iter().map(|h| h.1).collect()))
        .with_column("time", Column::Float(vec![20.0; n]))
        .with_column("path", Column::Float(vec![150.0; n]))
}

/// FTOF 1B hits as `(pindex, time)`.
fn scintillator_bank(hits: &[(i16, f32)]) -> RawBank {
    let n = hits.len();
    RawBank::new(n)
        .with_column("index", Column::Short((0..n as i16).collect()))
        .with_column("pindex", Column::Short(hits.iter().map(|h| h.0).collect()))
        .with_column("detector", Column::Byte(vec![FTOF_ID as i8; n]))
        .with_column("sector", Column::Byte(vec![1; n]))
        .with_column("layer", Column::Byte(vec![FTOF1B_LYR as i8; n]))
        .with_column("component", Column::Short(vec![10; n]))
        .with_column("energy", Column::Float(vec![5.0; n]))
        .with_column("time", Column::Float(hits.iter().map(|h| h.1).collect()))
        .with_column("path", Column::Float(vec![650.0; n]))
}

/// Three events: a trigger electron with a positive pion, an event without tracks and an
/// event holding a lone pion.
fn write_store(path: &Path) {
    let mut writer = EventStoreWriter::create(path).unwrap();

    let particles = particle_bank(&[
        Particle { pid: 11, charge: -1, status: -2110, p: (0.3, 0.2, 3.98) },
        Particle { pid: 211, charge: 1, status: 2110, p: (0.2, 0.1, 1.5) },
    ]);
    let tracks = track_bank(&[1, 4]);
    let calorimeter = calorimeter_bank(&[(0, PCAL_LYR as i8, 0.6, 25.0), (0, ECIN_LYR as i8, 0.4, 25.5)]);
    let cherenkov = cherenkov_bank(&[(0, 10.0)]);
    let scintillator = scintillator_bank(&[(0, 24.0), (1, 27.0)]);
    writer
        .write_event(
            101,
            &[
                (BankKind::Particle.name(), &particles),
                (BankKind::Track.name(), &tracks),
                (BankKind::Calorimeter.name(), &calorimeter),
                (BankKind::Cherenkov.name(), &cherenkov),
                (BankKind::Scintillator.name(), &scintillator),
            ],
        )
        .unwrap();

    let lone = particle_bank(&[Particle { pid: 211, charge: 1, status: 2110, p: (0.2, 0.1, 1.5) }]);
    writer.write_event(102, &[(BankKind::Particle.name(), &lone)]).unwrap();

    let tracks = track_bank(&[2]);
    writer.write_event(103, &[(BankKind::Particle.name(), &lone), (BankKind::Track.name(), &tracks)]).unwrap();
}

/// Bank of `kind` holding no rows.
fn empty_bank(kind: BankKind) -> RawBank {
    kind.fields()
        .iter()
        .fold(RawBank::new(0), |raw, (name, primitive)| raw.with_column(name, Column::empty(*primitive)))
}

/// Trigger event 101 followed by event 102 whose calorimeter bank holds a hit in layer 5.
fn write_corrupt_store(path: &Path) {
    let mut writer = EventStoreWriter::create(path).unwrap();
    let particles = particle_bank(&[
        Particle { pid: 11, charge: -1, status: -2110, p: (0.3, 0.2, 3.98) },
        Particle { pid: 211, charge: 1, status: 2110, p: (0.2, 0.1, 1.5) },
    ]);
    let tracks = track_bank(&[1, 4]);
    let good = calorimeter_bank(&[(0, PCAL_LYR as i8, 0.6, 25.0), (0, ECIN_LYR as i8, 0.4, 25.5)]);
    let bad = calorimeter_bank(&[(0, PCAL_LYR as i8, 0.6, 25.0), (1, 5, 0.1, 30.0)]);

    for (number, calorimeter) in [(101, &good), (102, &bad)] {
        writer
            .write_event(
                number,
                &[
                    (BankKind::Particle.name(), &particles),
                    (BankKind::Track.name(), &tracks),
                    (BankKind::Calorimeter.name(), calorimeter),
                ],
            )
            .unwrap();
    }
}

fn ntuples_config(dir: &Path) -> NtuplesConfig {
    NtuplesConfig {
        data_dir: dir.join("data"),
        work_dir: dir.join("work"),
        ..NtuplesConfig::default()
    }
}

#[test]
fn test_make_ntuples() {
    let dir = tempdir().unwrap();
    let config = ntuples_config(dir.path());
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::create_dir_all(&config.work_dir).unwrap();
    write_calibration(&config.data_dir, RUN, &calibration()).unwrap();

    let input = dir.path().join("rge_012016.db");
    write_store(&input);

    // leftover of an aborted run is replaced
    let output = ntuple_path(&config.work_dir, RUN, FmtLayers::None);
    std::fs::write(partial_path(&output), b"truncated").unwrap();

    let summary = make_ntuples(&input, &config).unwrap();
    assert!(!partial_path(&output).exists());
    assert_eq!(summary.output, output);
    assert_eq!(summary.run, RUN);
    assert_eq!(summary.events_read, 3);
    assert_eq!(summary.events_without_tracks, 1);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.fusion.events, 2);
    assert_eq!(summary.fusion.events_with_trigger, 1);
    assert_eq!(summary.fusion.positive_pions, 2);

    // records of the trigger event only, trigger first
    let connection = Connection::open(&output).unwrap();
    let mut stmt = connection.prepare("SELECT pid, event, beamE, dtof FROM data ORDER BY rowid").unwrap();
    let rows: Vec<(f64, f64, f64, Option<f64>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].0, rows[0].1), (11.0, 101.0));
    assert_eq!((rows[1].0, rows[1].1), (211.0, 101.0));
    assert!((rows[0].2 - 10.3894).abs() < 1e-9);
    assert_eq!(rows[1].3, Some(3.0));

    let sample = read_sample(&output, SampleKind::Simulated, false).unwrap();
    assert_eq!(sample.rows.len(), 2);
    assert!(sample.rows[1].zh > 0.0);

    let text = std::fs::read_to_string(summary_path(&output)).unwrap();
    let written: NtuplesSummary = serde_json::from_str(&text).unwrap();
    assert_eq!(written.records_written, summary.records_written);
    assert_eq!(written.fusion, summary.fusion);
    assert_eq!(written.output, output);

    // a second run never overwrites the ntuple
    match make_ntuples(&input, &config) {
        Err(DataError::OutputExists(path)) => assert_eq!(path, output),
        other => panic!("expected OutputExists, got {:?}", other),
    }
}

#[test]
fn test_make_ntuples_leaves_nothing_after_corrupt_bank() {
    let dir = tempdir().unwrap();
    let config = ntuples_config(dir.path());
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::create_dir_all(&config.work_dir).unwrap();
    write_calibration(&config.data_dir, RUN, &calibration()).unwrap();

    let input = dir.path().join("rge_012016.db");
    write_corrupt_store(&input);
    let output = ntuple_path(&config.work_dir, RUN, FmtLayers::None);

    // the failure repeats on a rerun instead of turning into OutputExists
    for _ in 0..2 {
        match make_ntuples(&input, &config) {
            Err(DataError::Rge(RgeError::InvalidCalorimeterLayer { layer: 5 })) => {}
            other => panic!("expected InvalidCalorimeterLayer, got {:?}", other),
        }
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
        assert!(!summary_path(&output).exists());
    }
}

#[test]
fn test_make_ntuples_requires_fmt_bank() {
    let dir = tempdir().unwrap();
    let config = NtuplesConfig { fmt_layers: 2, ..ntuples_config(dir.path()) };
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::create_dir_all(&config.work_dir).unwrap();
    write_calibration(&config.data_dir, RUN, &calibration()).unwrap();

    let input = dir.path().join("rge_012016.db");
    write_store(&input);
    match make_ntuples(&input, &config) {
        Err(DataError::NoFmtBank(path)) => assert_eq!(path, input),
        other => panic!("expected NoFmtBank, got {:?}", other),
    }
    let output = ntuple_path(&config.work_dir, RUN, FmtLayers::Two);
    assert!(!output.exists());
    assert!(!partial_path(&output).exists());

    // an FMT bank without hits is enough, the tracks then fail the layer requirement
    let with_fmt = dir.path().join("rge_fmt_012016.db");
    let mut writer = EventStoreWriter::create(&with_fmt).unwrap();
    let particles = particle_bank(&[Particle { pid: 11, charge: -1, status: -2110, p: (0.3, 0.2, 3.98) }]);
    let tracks = track_bank(&[1]);
    let fmt = empty_bank(BankKind::FmtTracks);
    writer
        .write_event(
            101,
            &[
                (BankKind::Particle.name(), &particles),
                (BankKind::Track.name(), &tracks),
                (BankKind::FmtTracks.name(), &fmt),
            ],
        )
        .unwrap();
    drop(writer);

    let summary = make_ntuples(&with_fmt, &config).unwrap();
    assert_eq!(summary.fmt_layers, 2);
    assert_eq!(summary.records_written, 0);
    assert_eq!(summary.fusion.invalid, 1);
    assert!(output.exists());
}

#[test]
fn test_make_ntuples_fails_before_reading() {
    let dir = tempdir().unwrap();
    let config = ntuples_config(dir.path());
    let input = dir.path().join("rge_012016.db");
    write_store(&input);

    // no calibration file
    assert!(matches!(make_ntuples(&input, &config), Err(DataError::Rge(_))));

    let unknown = dir.path().join("rge_000042.db");
    assert!(matches!(make_ntuples(&unknown, &config), Err(DataError::UnknownBeamEnergy { run: 42 })));

    let bad_layers = NtuplesConfig { fmt_layers: 1, ..ntuples_config(dir.path()) };
    assert!(matches!(make_ntuples(&input, &bad_layers), Err(DataError::InvalidFmtLayers(1))));
    assert!(!config.work_dir.exists());
}

/// Write a sample table holding `pid Q2 nu zh pt2 phipq <w>` rows.
fn write_sample(path: &Path, w_column: &str, rows: &[[f64; 7]]) {
    let connection = Connection::open(path).unwrap();
    connection
        .execute_batch(&format!(
            "CREATE TABLE data (pid REAL, Q2 REAL, nu REAL, zh REAL, pt2 REAL, phipq REAL, \"{}\" REAL);",
            w_column
        ))
        .unwrap();
    for row in rows {
        connection
            .execute(
                &format!("INSERT INTO data (pid, Q2, nu, zh, pt2, phipq, \"{}\") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", w_column),
                params![row[0], row[1], row[2], row[3], row[4], row[5], row[6]],
            )
            .unwrap();
    }
}

fn binning_config() -> BinningConfig {
    BinningConfig {
        q2: Some(vec![1.0, 2.0, 4.0]),
        nu: Some(vec![2.0, 6.0, 10.0]),
        zh: Some(vec![0.1, 0.5, 1.0]),
        pt2: Some(vec![0.01, 0.5, 1.0]),
        phipq: Some(vec![-3.2, 0.0, 3.2]),
        threads: Some(2),
        ..BinningConfig::default()
    }
}

#[test]
fn test_acc_corr() {
    let dir = tempdir().unwrap();
    let thrown = dir.path().join("thrown.db");
    let simulated = dir.path().join("simulated.db");
    write_sample(
        &thrown,
        "w",
        &[
            [211.0, 1.5, 3.0, 0.3, 0.2, 1.0, 2.5],
            [211.0, 1.5, 3.0, 0.3, 0.2, 1.0, 2.5],
            // below the W cut
            [211.0, 1.5, 3.0, 0.3, 0.2, 1.0, 1.5],
            [-211.0, 3.0, 7.0, 0.7, 0.6, -1.0, 2.5],
        ],
    );
    write_sample(&simulated, "W2", &[[211.0, 1.5, 3.0, 0.3, 0.2, 1.0, 6.25], [-211.0, 3.0, 7.0, 0.7, 0.6, -1.0, 3.0]]);

    let summary = acc_corr(&thrown, &simulated, dir.path(), &binning_config(), &CutsConfig::default()).unwrap();
    assert_eq!(summary.thrown_rows, 4);
    assert_eq!(summary.simulated_rows, 2);
    assert_eq!(summary.species.iter().map(|s| s.pid).collect::<Vec<_>>(), vec![211, -211]);
    assert_eq!(summary.species[0].thrown.accepted, 2);
    assert_eq!(summary.species[0].thrown.cut, 1);
    assert_eq!(summary.species[1].simulated.cut, 1);

    let table = read_acceptance(&summary.output).unwrap();
    assert_eq!(table.species(), &[211, -211]);
    assert_eq!(table.correction(211, &[0, 0, 0, 0, 1]), Some(0.5));
    assert_eq!(table.correction(-211, &[1, 1, 1, 1, 0]), Some(0.0));
    assert_eq!(table.correction(211, &[1, 1, 1, 1, 1]), None);

    match acc_corr(&thrown, &simulated, dir.path(), &binning_config(), &CutsConfig::default()) {
        Err(DataError::OutputExists(path)) => assert_eq!(path, summary.output),
        other => panic!("expected OutputExists, got {:?}", other),
    }
}

#[test]
fn test_acc_corr_names_missing_axis() {
    let dir = tempdir().unwrap();
    let config = BinningConfig { zh: None, ..binning_config() };
    let err = acc_corr(&dir.path().join("a.db"), &dir.path().join("b.db"), dir.path(), &config, &CutsConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("zh"));
}
