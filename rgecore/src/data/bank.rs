use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::data::detector;
use crate::error::{Result, RgeError};

/// Primitive type of a bank column, as declared by the bank schema.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Primitive {
    Byte,
    Short,
    Int,
    Float,
}

impl Primitive {
    /// Width of one value in bytes.
    pub fn width(&self) -> usize {
        match self {
            Primitive::Byte => 1,
            Primitive::Short => 2,
            Primitive::Int => 4,
            Primitive::Float => 4,
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            Primitive::Byte => "B",
            Primitive::Short => "S",
            Primitive::Int => "I",
            Primitive::Float => "F",
        }
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Byte => write!(f, "Byte"),
            Primitive::Short => write!(f, "Short"),
            Primitive::Int => write!(f, "Int"),
            Primitive::Float => write!(f, "Float"),
        }
    }
}

impl TryFrom<&str> for Primitive {
    type Error = RgeError;

    fn try_from(item: &str) -> Result<Self> {
        match item {
            "B" => Ok(Primitive::Byte),
            "S" => Ok(Primitive::Short),
            "I" => Ok(Primitive::Int),
            "F" => Ok(Primitive::Float),
            other => Err(RgeError::EventSource(format!("unknown primitive type `{}`", other))),
        }
    }
}

/// One column of values, stored with its declared width.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Column {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl Column {
    pub fn empty(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Byte => Column::Byte(Vec::new()),
            Primitive::Short => Column::Short(Vec::new()),
            Primitive::Int => Column::Int(Vec::new()),
            Primitive::Float => Column::Float(Vec::new()),
        }
    }

    pub fn primitive(&self) -> Primitive {
        match self {
            Column::Byte(_) => Primitive::Byte,
            Column::Short(_) => Primitive::Short,
            Column::Int(_) => Primitive::Int,
            Column::Float(_) => Primitive::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Byte(v) => v.len(),
            Column::Short(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row` widened to f64. Caller guarantees `row < len()`.
    fn f64_unchecked(&self, row: usize) -> f64 {
        match self {
            Column::Byte(v) => v[row] as f64,
            Column::Short(v) => v[row] as f64,
            Column::Int(v) => v[row] as f64,
            Column::Float(v) => v[row] as f64,
        }
    }

    /// Value at `row` widened to i64, floats are truncated towards zero.
    fn i64_unchecked(&self, row: usize) -> i64 {
        match self {
            Column::Byte(v) => v[row] as i64,
            Column::Short(v) => v[row] as i64,
            Column::Int(v) => v[row] as i64,
            Column::Float(v) => v[row] as i64,
        }
    }
}

/// A bank as delivered by an event source: row count plus columns keyed by name.
///
/// This is the only place where columns are looked up by string; binding it to a
/// [`Bank`] reorders the columns into the schema order once per event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawBank {
    pub nrows: usize,
    pub columns: HashMap<String, Column>,
}

impl RawBank {
    pub fn new(nrows: usize) -> Self {
        RawBank { nrows, columns: HashMap::new() }
    }

    pub fn with_column(mut self, name: &str, column: Column) -> Self {
        self.columns.insert(name.to_string(), column);
        self
    }
}

/// Source of per-event detector banks, indexable by event number.
pub trait EventSource {
    /// Total number of events available.
    fn event_count(&self) -> Result<usize>;

    /// Rows of bank `bank` for event `event`. A bank absent from the event reads as zero rows.
    fn read_bank(&self, bank: &str, event: usize) -> Result<RawBank>;
}

/// Explicit handle on the event being processed, passed to every bank's advance.
pub struct EventContext<'a> {
    pub source: &'a dyn EventSource,
    pub event: usize,
}

impl<'a> EventContext<'a> {
    pub fn new(source: &'a dyn EventSource, event: usize) -> Self {
        EventContext { source, event }
    }
}

/// Kinds of detector banks the reconstruction reads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BankKind {
    Particle,
    Track,
    Calorimeter,
    Cherenkov,
    Scintillator,
    FmtTracks,
}

impl BankKind {
    pub const ALL: [BankKind; 6] = [
        BankKind::Particle,
        BankKind::Track,
        BankKind::Calorimeter,
        BankKind::Cherenkov,
        BankKind::Scintillator,
        BankKind::FmtTracks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BankKind::Particle => "REC::Particle",
            BankKind::Track => "REC::Track",
            BankKind::Calorimeter => "REC::Calorimeter",
            BankKind::Cherenkov => "REC::Cherenkov",
            BankKind::Scintillator => "REC::Scintillator",
            BankKind::FmtTracks => "FMT::Tracks",
        }
    }

    pub fn fields(&self) -> &'static [(&'static str, Primitive)] {
        match self {
            BankKind::Particle => detector::PARTICLE_FIELDS,
            BankKind::Track => detector::TRACK_FIELDS,
            BankKind::Calorimeter => detector::CALORIMETER_FIELDS,
            BankKind::Cherenkov => detector::CHERENKOV_FIELDS,
            BankKind::Scintillator => detector::SCINTILLATOR_FIELDS,
            BankKind::FmtTracks => detector::FMT_TRACK_FIELDS,
        }
    }

    pub fn schema(&self) -> BankSchema {
        BankSchema::new(self.name(), self.fields())
    }
}

impl Display for BankKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub primitive: Primitive,
}

/// Ordered list of named, typed fields shared by all rows of a bank.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BankSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl BankSchema {
    pub fn new(name: &str, fields: &[(&str, Primitive)]) -> Self {
        BankSchema {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(name, primitive)| Field { name: name.to_string(), primitive: *primitive })
                .collect(),
        }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == column)
    }
}

/// Typed columnar table holding one detector's rows for the active event.
#[derive(Clone, Debug)]
pub struct Bank {
    schema: BankSchema,
    columns: Vec<Column>,
    nrows: usize,
    event: Option<usize>,
}

impl Bank {
    pub fn new(schema: BankSchema) -> Self {
        let columns = schema.fields.iter().map(|f| Column::empty(f.primitive)).collect();
        Bank { schema, columns, nrows: 0, event: None }
    }

    pub fn for_kind(kind: BankKind) -> Self {
        Bank::new(kind.schema())
    }

    pub fn schema(&self) -> &BankSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Number of rows loaded for the active event.
    pub fn row_count(&self) -> usize {
        self.nrows
    }

    /// Event whose rows are currently loaded, if any.
    pub fn event(&self) -> Option<usize> {
        self.event
    }

    /// Value of `column` at `row`, widened to f64.
    pub fn get_f64(&self, column: &str, row: usize) -> Result<f64> {
        let idx = self.column_index(column)?;
        self.f64_at(idx, row)
    }

    /// Value of `column` at `row`, widened to i64.
    pub fn get_i64(&self, column: &str, row: usize) -> Result<i64> {
        let idx = self.column_index(column)?;
        self.i64_at(idx, row)
    }

    /// Value of the column at schema position `col`, widened to f64.
    pub fn f64_at(&self, col: usize, row: usize) -> Result<f64> {
        self.check_row(row)?;
        Ok(self.column_at(col)?.f64_unchecked(row))
    }

    /// Value of the column at schema position `col`, widened to i64.
    pub fn i64_at(&self, col: usize, row: usize) -> Result<i64> {
        self.check_row(row)?;
        Ok(self.column_at(col)?.i64_unchecked(row))
    }

    /// Replace the bank contents with the rows of `ctx.event`.
    ///
    /// Advancing twice to the same event is a no-op; advancing to another event always
    /// replaces, never appends.
    pub fn advance(&mut self, ctx: &EventContext) -> Result<()> {
        if self.event == Some(ctx.event) {
            return Ok(());
        }
        let raw = ctx.source.read_bank(&self.schema.name, ctx.event)?;
        self.bind(raw)?;
        self.event = Some(ctx.event);
        Ok(())
    }

    /// Bind a raw bank to this schema, replacing the current contents.
    ///
    /// On failure the bank is left empty, so no rows of a previous event survive.
    pub fn bind(&mut self, mut raw: RawBank) -> Result<()> {
        self.clear();

        let mut columns = Vec::with_capacity(self.schema.fields.len());
        for field in &self.schema.fields {
            let column = raw.columns.remove(&field.name).ok_or_else(|| RgeError::InvalidColumn {
                bank: self.schema.name.clone(),
                column: field.name.clone(),
            })?;

            if column.primitive() != field.primitive {
                return Err(RgeError::ColumnTypeMismatch {
                    bank: self.schema.name.clone(),
                    column: field.name.clone(),
                    expected: field.primitive.to_string(),
                    found: column.primitive().to_string(),
                });
            }

            if column.len() != raw.nrows {
                return Err(RgeError::RaggedBank {
                    bank: self.schema.name.clone(),
                    column: field.name.clone(),
                    len: column.len(),
                    nrows: raw.nrows,
                });
            }
            columns.push(column);
        }

        self.columns = columns;
        self.nrows = raw.nrows;
        Ok(())
    }

    /// Drop all rows, keeping the schema.
    pub fn clear(&mut self) {
        self.columns = self.schema.fields.iter().map(|f| Column::empty(f.primitive)).collect();
        self.nrows = 0;
        self.event = None;
    }

    /// Decode every row into its typed representation.
    ///
    /// `T` must be the row type of this bank's kind.
    pub fn rows<T: BankRow>(&self) -> Result<Vec<T>> {
        if T::KIND.name() != self.schema.name {
            return Err(RgeError::BankKindMismatch {
                bank: self.schema.name.clone(),
                expected: T::KIND.name().to_string(),
            });
        }
        (0..self.nrows).map(|row| T::from_bank(self, row)).collect()
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.schema.position(column).ok_or_else(|| RgeError::InvalidColumn {
            bank: self.schema.name.clone(),
            column: column.to_string(),
        })
    }

    fn column_at(&self, col: usize) -> Result<&Column> {
        self.columns.get(col).ok_or_else(|| RgeError::InvalidColumn {
            bank: self.schema.name.clone(),
            column: format!("#{}", col),
        })
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.nrows {
            return Err(RgeError::IndexOutOfRange {
                bank: self.schema.name.clone(),
                index: row,
                nrows: self.nrows,
            });
        }
        Ok(())
    }
}

/// A typed view of one bank row.
pub trait BankRow: Sized {
    const KIND: BankKind;

    fn from_bank(bank: &Bank, row: usize) -> Result<Self>;
}

/// Event source backed by banks held in memory.
#[derive(Default, Debug)]
pub struct MemoryEventSource {
    n_events: usize,
    banks: HashMap<(String, usize), RawBank>,
}

impl MemoryEventSource {
    pub fn new(n_events: usize) -> Self {
        MemoryEventSource { n_events, banks: HashMap::new() }
    }

    pub fn insert(&mut self, event: usize, bank: &str, raw: RawBank) {
        if event >= self.n_events {
            self.n_events = event + 1;
        }
        self.banks.insert((bank.to_string(), event), raw);
    }
}

impl EventSource for MemoryEventSource {
    fn event_count(&self) -> Result<usize> {
        Ok(self.n_events)
    }

    fn read_bank(&self, bank: &str, event: usize) -> Result<RawBank> {
        if event >= self.n_events {
            return Err(RgeError::EventSource(format!(
                "event {} requested, source holds {} events",
                event, self.n_events
            )));
        }
        match self.banks.get(&(bank.to_string(), event)) {
            Some(raw) => Ok(raw.clone()),
            None => {
                // absent bank: zero rows with every column the caller may ask for
                let kind = BankKind::ALL.iter().find(|k| k.name() == bank);
                let mut raw = RawBank::new(0);
                if let Some(kind) = kind {
                    for (name, primitive) in kind.fields() {
                        raw.columns.insert(name.to_string(), Column::empty(*primitive));
                    }
                }
                Ok(raw)
            }
        }
    }
}
