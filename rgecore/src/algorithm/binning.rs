//! Acceptance binning: five-dimensional count tables of thrown and simulated samples.
//!
//! The axes are, in order, Q2, nu, z_h, Pt2 and phi_PQ. Every axis is described by its bin
//! edges; bins are half open except the last one, which also includes the upper edge.
//! Tables are flat vectors indexed row-major over the five axes, last axis fastest.

use std::io::{BufRead, Write};

use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RgeError};
use crate::physics::constants::{Q2_CUT, W2_CUT};
use crate::physics::kinematics::to_rad;

pub const NAXES: usize = 5;

/// Names of the binning variables, in axis order.
pub const AXIS_NAMES: [&str; NAXES] = ["Q2", "nu", "zh", "Pt2", "phiPQ"];

/// Bin of `value` in `edges`.
///
/// # Returns
///
/// * `Option<usize>` - `i` such that `edges[i] <= value < edges[i + 1]`, the last bin being
///   closed on both ends; `None` outside `[edges[0], edges[n - 1]]`
///
/// # Example
///
/// ```
/// use rgecore::algorithm::binning::find_pos;
///
/// let edges = [0.0, 1.0, 2.0, 4.0];
/// assert_eq!(find_pos(&edges, 1.0), Some(1));
/// assert_eq!(find_pos(&edges, 4.0), Some(2));
/// assert_eq!(find_pos(&edges, 4.5), None);
/// ```
pub fn find_pos(edges: &[f64], value: f64) -> Option<usize> {
    let n = edges.len();
    if n < 2 || !(edges[0] <= value && value <= edges[n - 1]) {
        return None;
    }
    // number of edges <= value, minus one, clamped into the last bin
    let pos = edges.partition_point(|e| *e <= value);
    Some((pos - 1).min(n - 2))
}

/// Validated bin edges of a single axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    /// # Arguments
    ///
    /// * `axis` - axis name, used in error messages
    /// * `edges` - at least two finite, strictly increasing values
    ///
    pub fn new(axis: &str, edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(RgeError::BadEdges { axis: axis.to_string(), len: edges.len() });
        }
        for (position, pair) in edges.windows(2).enumerate() {
            if !pair[0].is_finite() || !pair[1].is_finite() || pair[1] <= pair[0] {
                return Err(RgeError::NonIncreasingEdges {
                    axis: axis.to_string(),
                    position: position + 1,
                    value: pair[1],
                });
            }
        }
        Ok(BinEdges { edges })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn find_pos(&self, value: f64) -> Option<usize> {
        find_pos(&self.edges, value)
    }
}

/// Bin edges of all five axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    axes: Vec<BinEdges>,
}

impl Binning {
    /// Build the binning from optional edge lists, one per axis in [`AXIS_NAMES`] order.
    ///
    /// # Returns
    ///
    /// * `Result<Binning>` - `NoEdge` naming the first missing axis, `BadEdges` or
    ///   `NonIncreasingEdges` for a malformed one
    ///
    pub fn new(axes: [Option<Vec<f64>>; NAXES]) -> Result<Self> {
        let axes = axes
            .into_iter()
            .zip(AXIS_NAMES)
            .map(|(edges, name)| {
                let edges = edges.ok_or_else(|| RgeError::NoEdge { axis: name.to_string() })?;
                BinEdges::new(name, edges)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Binning { axes })
    }

    pub fn axis(&self, axis: usize) -> &BinEdges {
        &self.axes[axis]
    }

    /// Number of bins of each axis.
    pub fn shape(&self) -> [usize; NAXES] {
        let mut shape = [0; NAXES];
        for (s, axis) in shape.iter_mut().zip(&self.axes) {
            *s = axis.nbins();
        }
        shape
    }

    /// Bin of every axis, `None` if any value is out of range.
    pub fn locate(&self, values: &[f64; NAXES]) -> Option<[usize; NAXES]> {
        let mut bin = [0; NAXES];
        for ((b, axis), value) in bin.iter_mut().zip(&self.axes).zip(values) {
            *b = axis.find_pos(*value)?;
        }
        Some(bin)
    }
}

/// Dense per-bin counts over the five axes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTable {
    shape: [usize; NAXES],
    counts: Vec<u64>,
}

impl CountTable {
    pub fn new(shape: [usize; NAXES]) -> Self {
        CountTable { shape, counts: vec![0; shape.iter().product()] }
    }

    pub fn from_counts(shape: [usize; NAXES], counts: Vec<u64>) -> Result<Self> {
        let len: usize = shape.iter().product();
        if counts.len() != len {
            return Err(RgeError::MalformedAcceptance {
                reason: format!("table holds {} counts, binning has {} cells", counts.len(), len),
            });
        }
        Ok(CountTable { shape, counts })
    }

    pub fn shape(&self) -> [usize; NAXES] {
        self.shape
    }

    /// Flat position of a five-dimensional bin, last axis fastest.
    pub fn index(&self, bin: &[usize; NAXES]) -> usize {
        bin.iter().zip(&self.shape).fold(0, |acc, (b, n)| acc * n + b)
    }

    pub fn increment(&mut self, bin: &[usize; NAXES]) {
        let i = self.index(bin);
        self.counts[i] += 1;
    }

    pub fn get(&self, bin: &[usize; NAXES]) -> u64 {
        self.counts[self.index(bin)]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Add the counts of `other`, which must have the same shape.
    pub fn merge(&mut self, other: &CountTable) {
        debug_assert_eq!(self.shape, other.shape);
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
    }
}

/// Origin of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    /// Generated events, before detector simulation.
    Thrown,
    /// Events reconstructed after detector simulation.
    Simulated,
}

impl SampleKind {
    pub fn to_str(&self) -> &str {
        match self {
            SampleKind::Thrown => "thrown",
            SampleKind::Simulated => "simulated",
        }
    }
}

/// The variables of one sample row used for binning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    pub pid: f64,
    pub q2: f64,
    pub nu: f64,
    pub zh: f64,
    pub pt2: f64,
    pub phipq: f64,
    /// W for thrown samples, W2 for simulated samples, as stored in the sample.
    pub w: f64,
}

impl SampleRow {
    fn axes(&self) -> [f64; NAXES] {
        [self.q2, self.nu, self.zh, self.pt2, self.phipq]
    }
}

/// A full sample together with how its variables are stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub kind: SampleKind,
    pub rows: Vec<SampleRow>,
    /// phi_PQ is stored in degrees rather than radians.
    pub phipq_in_degrees: bool,
}

/// DIS cuts applied before binning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinningCuts {
    pub q2_min: f64,
    pub w2_min: f64,
}

impl Default for BinningCuts {
    fn default() -> Self {
        BinningCuts { q2_min: Q2_CUT, w2_min: W2_CUT }
    }
}

/// Fate of a single row in an accumulation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    WrongSpecies,
    ZeroValued,
    Cut,
    OutOfRange,
    Accepted([usize; NAXES]),
}

/// Counters of one accumulation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinningStats {
    pub rows: u64,
    pub wrong_species: u64,
    pub zero_valued: u64,
    pub cut: u64,
    pub out_of_range: u64,
    pub accepted: u64,
}

impl BinningStats {
    pub fn record(&mut self, outcome: &RowOutcome) {
        self.rows += 1;
        match outcome {
            RowOutcome::WrongSpecies => self.wrong_species += 1,
            RowOutcome::ZeroValued => self.zero_valued += 1,
            RowOutcome::Cut => self.cut += 1,
            RowOutcome::OutOfRange => self.out_of_range += 1,
            RowOutcome::Accepted(_) => self.accepted += 1,
        }
    }

    pub fn merge(&mut self, other: &BinningStats) {
        self.rows += other.rows;
        self.wrong_species += other.wrong_species;
        self.zero_valued += other.zero_valued;
        self.cut += other.cut;
        self.out_of_range += other.out_of_range;
        self.accepted += other.accepted;
    }
}

/// Decide where `row` of `sample` lands in the table of species `code`.
pub fn row_outcome(binning: &Binning, cuts: &BinningCuts, sample: &Sample, code: i32, row: &SampleRow) -> RowOutcome {
    if species_code(row.pid) != Some(code) {
        return RowOutcome::WrongSpecies;
    }

    let mut values = row.axes();
    if values.iter().any(|v| *v == 0.0) {
        return RowOutcome::ZeroValued;
    }

    let w_passes = match sample.kind {
        SampleKind::Thrown => row.w >= cuts.w2_min.sqrt(),
        SampleKind::Simulated => row.w >= cuts.w2_min,
    };
    if row.q2 < cuts.q2_min || !w_passes {
        return RowOutcome::Cut;
    }

    if sample.phipq_in_degrees {
        values[NAXES - 1] = match to_rad(values[NAXES - 1]) {
            Ok(radians) => radians,
            Err(_) => return RowOutcome::OutOfRange,
        };
    }

    match binning.locate(&values) {
        Some(bin) => RowOutcome::Accepted(bin),
        None => RowOutcome::OutOfRange,
    }
}

/// Count the rows of `sample` belonging to species `code`, in one sequential pass.
pub fn count_entries(binning: &Binning, cuts: &BinningCuts, sample: &Sample, code: i32) -> (CountTable, BinningStats) {
    let mut table = CountTable::new(binning.shape());
    let mut stats = BinningStats::default();
    for row in &sample.rows {
        let outcome = row_outcome(binning, cuts, sample, code, row);
        if let RowOutcome::Accepted(bin) = &outcome {
            table.increment(bin);
        }
        stats.record(&outcome);
    }
    (table, stats)
}

/// Parallel version of [`count_entries`]. Each worker folds rows into its own table; the
/// tables are then summed, so the result is identical to the sequential pass.
pub fn count_entries_par(
    binning: &Binning,
    cuts: &BinningCuts,
    sample: &Sample,
    code: i32,
) -> (CountTable, BinningStats) {
    let shape = binning.shape();
    sample
        .rows
        .par_iter()
        .fold(
            || (CountTable::new(shape), BinningStats::default()),
            |(mut table, mut stats), row| {
                let outcome = row_outcome(binning, cuts, sample, code, row);
                if let RowOutcome::Accepted(bin) = &outcome {
                    table.increment(bin);
                }
                stats.record(&outcome);
                (table, stats)
            },
        )
        .reduce(
            || (CountTable::new(shape), BinningStats::default()),
            |(mut table, mut stats), (other_table, other_stats)| {
                table.merge(&other_table);
                stats.merge(&other_stats);
                (table, stats)
            },
        )
}

/// Species code of a stored pid: the pid rounded to the nearest integer, halves away from
/// zero. Non finite pids and pids outside the `i32` range have no code.
pub fn species_code(pid: f64) -> Option<i32> {
    let code = pid.round();
    if !code.is_finite() || code < i32::MIN as f64 || code > i32::MAX as f64 {
        return None;
    }
    Some(code as i32)
}

/// Distinct species codes of `rows`, in first-seen order.
///
/// Rows without a species code are ignored.
pub fn discover_species(rows: &[SampleRow]) -> Vec<i32> {
    let mut species: Vec<i32> = Vec::new();
    for code in rows.iter().filter_map(|row| species_code(row.pid)) {
        if !species.contains(&code) {
            species.push(code);
        }
    }
    species
}

/// Accumulation counters of one species.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesStats {
    pub pid: i32,
    pub thrown: BinningStats,
    pub simulated: BinningStats,
}

/// Thrown and simulated count tables of every species on a common binning.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptanceTable {
    binning: Binning,
    species: Vec<i32>,
    thrown: Vec<CountTable>,
    simulated: Vec<CountTable>,
}

impl AcceptanceTable {
    /// Discover the species of the thrown sample and count both samples for each of them.
    ///
    /// Species are processed in parallel.
    pub fn build(
        binning: &Binning,
        cuts: &BinningCuts,
        thrown: &Sample,
        simulated: &Sample,
    ) -> (AcceptanceTable, Vec<SpeciesStats>) {
        let species = discover_species(&thrown.rows);
        debug!("{} species in the thrown sample: {:?}", species.len(), species);

        let counted: Vec<_> = species
            .par_iter()
            .map(|code| {
                let (thrown_table, thrown_stats) = count_entries_par(binning, cuts, thrown, *code);
                let (simulated_table, simulated_stats) = count_entries_par(binning, cuts, simulated, *code);
                let stats = SpeciesStats { pid: *code, thrown: thrown_stats, simulated: simulated_stats };
                (thrown_table, simulated_table, stats)
            })
            .collect();

        let mut table = AcceptanceTable {
            binning: binning.clone(),
            species,
            thrown: Vec::with_capacity(counted.len()),
            simulated: Vec::with_capacity(counted.len()),
        };
        let mut stats = Vec::with_capacity(counted.len());
        for (thrown_table, simulated_table, species_stats) in counted {
            table.thrown.push(thrown_table);
            table.simulated.push(simulated_table);
            stats.push(species_stats);
        }
        (table, stats)
    }

    pub fn binning(&self) -> &Binning {
        &self.binning
    }

    pub fn species(&self) -> &[i32] {
        &self.species
    }

    pub fn thrown(&self, pid: i32) -> Option<&CountTable> {
        self.position(pid).map(|i| &self.thrown[i])
    }

    pub fn simulated(&self, pid: i32) -> Option<&CountTable> {
        self.position(pid).map(|i| &self.simulated[i])
    }

    fn position(&self, pid: i32) -> Option<usize> {
        self.species.iter().position(|code| *code == pid)
    }

    /// Acceptance of species `pid` in `bin`: simulated over thrown counts.
    ///
    /// # Returns
    ///
    /// * `Option<f64>` - `None` for an unknown species or a bin where nothing was thrown
    ///
    pub fn correction(&self, pid: i32, bin: &[usize; NAXES]) -> Option<f64> {
        let i = self.position(pid)?;
        let thrown = self.thrown[i].get(bin);
        if thrown == 0 {
            return None;
        }
        Some(self.simulated[i].get(bin) as f64 / thrown as f64)
    }

    /// Write the table as whitespace separated text.
    ///
    /// Layout: bin counts of the five axes on one line, the edges of each axis on one line
    /// each, the number of species, the species codes, then per species the thrown counts
    /// followed by the simulated counts, one table per line.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", self.binning.shape().iter().join(" "))?;
        for axis in &self.binning.axes {
            writeln!(out, "{}", axis.edges().iter().join(" "))?;
        }
        writeln!(out, "{}", self.species.len())?;
        writeln!(out, "{}", self.species.iter().join(" "))?;
        for (thrown, simulated) in self.thrown.iter().zip(&self.simulated) {
            writeln!(out, "{}", thrown.counts().iter().join(" "))?;
            writeln!(out, "{}", simulated.counts().iter().join(" "))?;
        }
        Ok(())
    }

    /// Read a table written by [`AcceptanceTable::write_to`].
    pub fn read_from<R: BufRead>(input: R) -> Result<Self> {
        let mut lines = input.lines();
        let mut next_line = |what: &str| -> Result<String> {
            match lines.next() {
                Some(Ok(line)) => Ok(line),
                Some(Err(e)) => Err(malformed(format!("reading {}: {}", what, e))),
                None => Err(malformed(format!("missing {}", what))),
            }
        };

        let shape: Vec<usize> = parse_line(&next_line("bin counts")?, "bin counts")?;
        if shape.len() != NAXES {
            return Err(malformed(format!("expected {} bin counts, found {}", NAXES, shape.len())));
        }

        let mut axes = Vec::with_capacity(NAXES);
        for (name, nbins) in AXIS_NAMES.iter().zip(&shape) {
            let edges: Vec<f64> = parse_line(&next_line(*name)?, name)?;
            if edges.len() != nbins + 1 {
                return Err(malformed(format!("axis {} has {} edges for {} bins", name, edges.len(), nbins)));
            }
            axes.push(BinEdges::new(*name, edges)?);
        }
        let binning = Binning { axes };
        let shape = binning.shape();

        let nspecies: Vec<usize> = parse_line(&next_line("species count")?, "species count")?;
        let nspecies = match nspecies.as_slice() {
            [n] => *n,
            _ => return Err(malformed("species count should be a single integer".to_string())),
        };
        let species: Vec<i32> = parse_line(&next_line("species")?, "species")?;
        if species.len() != nspecies {
            return Err(malformed(format!("{} species announced, {} listed", nspecies, species.len())));
        }

        let mut thrown = Vec::with_capacity(nspecies);
        let mut simulated = Vec::with_capacity(nspecies);
        for pid in &species {
            let what = format!("thrown counts of {}", pid);
            thrown.push(CountTable::from_counts(shape, parse_line(&next_line(what.as_str())?, &what)?)?);
            let what = format!("simulated counts of {}", pid);
            simulated.push(CountTable::from_counts(shape, parse_line(&next_line(what.as_str())?, &what)?)?);
        }

        Ok(AcceptanceTable { binning, species, thrown, simulated })
    }
}

fn malformed(reason: String) -> RgeError {
    RgeError::MalformedAcceptance { reason }
}

fn parse_line<T: std::str::FromStr>(line: &str, what: &str) -> Result<Vec<T>> {
    line.split_whitespace()
        .map(|token| token.parse::<T>().map_err(|_| malformed(format!("bad value `{}` in {}", token, what))))
        .collect()
}
