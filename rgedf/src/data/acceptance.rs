use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rgecore::algorithm::binning::AcceptanceTable;

use crate::error::{DataError, Result};

pub const ACCEPTANCE_FILENAME: &str = "acc_corr.txt";

/// Path of the acceptance table written into `work_dir`.
pub fn acceptance_path(work_dir: &Path) -> PathBuf {
    work_dir.join(ACCEPTANCE_FILENAME)
}

/// Write `table` to a new file at `path`; an existing file is never overwritten.
pub fn write_acceptance(path: &Path, table: &AcceptanceTable) -> Result<()> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(DataError::OutputExists(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let mut out = BufWriter::new(file);
    table.write_to(&mut out)?;
    out.flush()?;
    Ok(())
}

pub fn read_acceptance(path: &Path) -> Result<AcceptanceTable> {
    let file = File::open(path)?;
    Ok(AcceptanceTable::read_from(BufReader::new(file))?)
}
