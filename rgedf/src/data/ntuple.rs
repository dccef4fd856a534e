use std::path::Path;

use itertools::Itertools;
use rgecore::algorithm::binning::{Sample, SampleKind, SampleRow};
use rgecore::data::record::{ParticleRecord, RGE_VARS};
use rusqlite::{params_from_iter, Connection};

use crate::error::{DataError, Result};

/// Ntuple of particle records, stored in the SQLite table `data`.
#[derive(Debug)]
pub struct NtupleWriter {
    pub connection: Connection,
    insert: String,
    written: u64,
}

impl NtupleWriter {
    /// Create a new ntuple at `path`; an existing file is never overwritten.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(DataError::OutputExists(path.to_path_buf()));
        }
        let connection = Connection::open(path)?;

        let columns = RGE_VARS.iter().map(|v| format!("\"{}\" REAL", v)).join(", ");
        connection.execute_batch(&format!("CREATE TABLE data ({});", columns))?;

        let insert = format!(
            "INSERT INTO data ({}) VALUES ({})",
            RGE_VARS.iter().map(|v| format!("\"{}\"", v)).join(", "),
            (1..=RGE_VARS.len()).map(|i| format!("?{}", i)).join(", ")
        );
        Ok(NtupleWriter { connection, insert, written: 0 })
    }

    /// Append `records` in a single transaction.
    pub fn write(&mut self, records: &[ParticleRecord]) -> Result<()> {
        let tx = self.connection.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.insert)?;
            for record in records {
                stmt.execute(params_from_iter(record.values()))?;
            }
        }
        tx.commit()?;
        self.written += records.len() as u64;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Name of the column holding the invariant mass variable of a sample.
///
/// Thrown samples store W, simulated samples store W2.
pub fn w_column(kind: SampleKind) -> &'static str {
    match kind {
        SampleKind::Thrown => "w",
        SampleKind::Simulated => "W2",
    }
}

/// Read the binning variables of every row of the ntuple at `path`.
///
/// # Arguments
///
/// * `path` - SQLite file with a `data` table
/// * `kind` - whether the file holds a thrown or a simulated sample
/// * `phipq_in_degrees` - phi_PQ is stored in degrees
///
pub fn read_sample(path: &Path, kind: SampleKind, phipq_in_degrees: bool) -> Result<Sample> {
    let connection = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let query = format!(
        "SELECT pid, Q2, nu, zh, pt2, phipq, \"{}\" FROM data",
        w_column(kind)
    );

    let mut stmt = connection.prepare(&query)?;
    let rows_iter = stmt.query_map([], |row| {
        Ok(SampleRow {
            pid: row.get(0)?,
            q2: row.get(1)?,
            nu: row.get(2)?,
            zh: row.get(3)?,
            pt2: row.get(4)?,
            phipq: row.get(5)?,
            w: row.get(6)?,
        })
    })?;

    let mut rows = Vec::new();
    for row in rows_iter {
        rows.push(row?);
    }
    Ok(Sample { kind, rows, phipq_in_degrees })
}
