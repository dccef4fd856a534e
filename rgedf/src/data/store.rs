//! SQLite event store holding the detector banks of one run.
//!
//! Layout:
//!
//! * `schemas(bank, position, name, type)` - column list of every stored bank
//! * `events(id, number)` - one row per event, `id` counting from 0
//! * `banks(event_id, bank, nrows, data)` - zstd compressed payload of one bank in one event,
//!   columns concatenated in schema order, values little endian
//!
//! A bank without a row in `banks` for some event holds zero rows in that event.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use log::debug;
use rgecore::data::bank::{BankKind, BankSchema, Column, EventSource, Primitive, RawBank};
use rgecore::error::RgeError;
use rusqlite::{params, Connection, OptionalExtension};

use crate::data::utility::{read_column, row_width, write_column, zstd_compress, zstd_decompress, ZSTD_LEVEL};
use crate::error::{DataError, Result};

const CREATE_TABLES: &str = "
    CREATE TABLE schemas (
        bank TEXT NOT NULL,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        PRIMARY KEY (bank, position)
    );
    CREATE TABLE events (
        id INTEGER PRIMARY KEY,
        number INTEGER NOT NULL
    );
    CREATE TABLE banks (
        event_id INTEGER NOT NULL,
        bank TEXT NOT NULL,
        nrows INTEGER NOT NULL,
        data BLOB NOT NULL,
        PRIMARY KEY (event_id, bank)
    );
";

/// Read access to an event store.
#[derive(Debug)]
pub struct EventStore {
    pub connection: Connection,
    schemas: HashMap<String, Vec<(String, Primitive)>>,
    n_events: usize,
}

impl EventStore {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path)?;
        let schemas = read_schemas(&connection)?;
        let n_events: i64 = connection.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        debug!("opened event store {} with {} events", path.display(), n_events);
        Ok(EventStore { connection, schemas, n_events: n_events as usize })
    }

    pub fn len(&self) -> usize {
        self.n_events
    }

    pub fn is_empty(&self) -> bool {
        self.n_events == 0
    }

    /// Whether the store declares a schema for `bank`.
    pub fn has_bank(&self, bank: &str) -> bool {
        self.schemas.contains_key(bank)
    }

    /// Event number recorded by the data acquisition for event `id`.
    pub fn event_number(&self, id: usize) -> Result<i64> {
        let number = self
            .connection
            .query_row("SELECT number FROM events WHERE id = ?1", params![id as i64], |row| row.get(0))
            .optional()?;
        number.ok_or_else(|| missing_event(id, self.n_events))
    }

    /// Raw rows of `bank` in event `id`.
    pub fn read_raw(&self, bank: &str, id: usize) -> Result<RawBank> {
        if id >= self.n_events {
            return Err(missing_event(id, self.n_events));
        }

        let fields = match self.schemas.get(bank) {
            Some(fields) => fields.clone(),
            None => match BankKind::ALL.iter().find(|k| k.name() == bank) {
                Some(kind) => kind.fields().iter().map(|(n, p)| (n.to_string(), *p)).collect(),
                None => Vec::new(),
            },
        };

        let payload: Option<(i64, Vec<u8>)> = self
            .connection
            .query_row(
                "SELECT nrows, data FROM banks WHERE event_id = ?1 AND bank = ?2",
                params![id as i64, bank],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (nrows, data) = match payload {
            Some((nrows, data)) => (nrows as usize, data),
            None => {
                let mut raw = RawBank::new(0);
                for (name, primitive) in fields {
                    raw.columns.insert(name, Column::empty(primitive));
                }
                return Ok(raw);
            }
        };

        let corrupt = |reason: String| DataError::CorruptPayload { bank: bank.to_string(), event: id, reason };

        let bytes = zstd_decompress(&data).map_err(|e| corrupt(e.to_string()))?;
        let primitives: Vec<Primitive> = fields.iter().map(|(_, p)| *p).collect();
        let expected = nrows * row_width(&primitives);
        if bytes.len() != expected {
            return Err(corrupt(format!("{} bytes for {} rows, expected {}", bytes.len(), nrows, expected)));
        }

        let mut cursor = Cursor::new(bytes.as_slice());
        let mut raw = RawBank::new(nrows);
        for (name, primitive) in fields {
            let column = read_column(&mut cursor, primitive, nrows).map_err(|e| corrupt(e.to_string()))?;
            raw.columns.insert(name, column);
        }
        Ok(raw)
    }
}

impl EventSource for EventStore {
    fn event_count(&self) -> rgecore::error::Result<usize> {
        Ok(self.n_events)
    }

    fn read_bank(&self, bank: &str, event: usize) -> rgecore::error::Result<RawBank> {
        self.read_raw(bank, event).map_err(RgeError::from)
    }
}

fn missing_event(id: usize, n_events: usize) -> DataError {
    DataError::Rge(RgeError::EventSource(format!("event {} requested, store holds {} events", id, n_events)))
}

fn read_schemas(connection: &Connection) -> Result<HashMap<String, Vec<(String, Primitive)>>> {
    let mut stmt = connection.prepare("SELECT bank, name, type FROM schemas ORDER BY bank, position")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?;

    let mut schemas: HashMap<String, Vec<(String, Primitive)>> = HashMap::new();
    for row in rows {
        let (bank, name, type_name) = row?;
        let primitive = Primitive::try_from(type_name.as_str())?;
        schemas.entry(bank).or_default().push((name, primitive));
    }
    Ok(schemas)
}

/// Write access to a new event store.
#[derive(Debug)]
pub struct EventStoreWriter {
    pub connection: Connection,
    schemas: HashMap<String, BankSchema>,
    n_events: usize,
}

impl EventStoreWriter {
    /// Create a new, empty store at `path`.
    ///
    /// Standard banks register their schema the first time an event holds them, so the store
    /// only declares banks it actually carries.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(DataError::OutputExists(path.to_path_buf()));
        }
        let connection = Connection::open(path)?;
        connection.execute_batch(CREATE_TABLES)?;
        Ok(EventStoreWriter { connection, schemas: HashMap::new(), n_events: 0 })
    }

    /// Register the schema of a bank; its payloads are encoded in this column order.
    pub fn add_schema(&mut self, schema: BankSchema) -> Result<()> {
        self.connection.execute("DELETE FROM schemas WHERE bank = ?1", params![schema.name])?;
        for (position, field) in schema.fields.iter().enumerate() {
            self.connection.execute(
                "INSERT INTO schemas (bank, position, name, type) VALUES (?1, ?2, ?3, ?4)",
                params![schema.name, position as i64, field.name, field.primitive.to_str()],
            )?;
        }
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Append one event holding `banks`.
    ///
    /// # Arguments
    ///
    /// * `number` - event number recorded by the data acquisition
    /// * `banks` - bank name and rows; banks not listed hold zero rows in this event
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - id of the new event
    ///
    pub fn write_event(&mut self, number: i64, banks: &[(&str, &RawBank)]) -> Result<usize> {
        let id = self.n_events;
        let mut payloads = Vec::with_capacity(banks.len());
        for (name, raw) in banks {
            if !self.schemas.contains_key(*name) {
                if let Some(kind) = BankKind::ALL.iter().find(|k| k.name() == *name) {
                    self.add_schema(kind.schema())?;
                }
            }
            payloads.push((*name, raw.nrows, self.encode(name, raw)?));
        }

        let tx = self.connection.transaction()?;
        tx.execute("INSERT INTO events (id, number) VALUES (?1, ?2)", params![id as i64, number])?;
        for (name, nrows, data) in payloads {
            tx.execute(
                "INSERT INTO banks (event_id, bank, nrows, data) VALUES (?1, ?2, ?3, ?4)",
                params![id as i64, name, nrows as i64, data],
            )?;
        }
        tx.commit()?;

        self.n_events += 1;
        Ok(id)
    }

    fn encode(&self, name: &str, raw: &RawBank) -> Result<Vec<u8>> {
        let schema = self.schemas.get(name).ok_or_else(|| {
            DataError::Rge(RgeError::EventSource(format!("no schema registered for bank {}", name)))
        })?;

        let mut bytes = Vec::new();
        for field in &schema.fields {
            let column = raw.columns.get(&field.name).ok_or_else(|| RgeError::InvalidColumn {
                bank: name.to_string(),
                column: field.name.clone(),
            })?;
            if column.primitive() != field.primitive {
                return Err(RgeError::ColumnTypeMismatch {
                    bank: name.to_string(),
                    column: field.name.clone(),
                    expected: field.primitive.to_string(),
                    found: column.primitive().to_string(),
                }
                .into());
            }
            if column.len() != raw.nrows {
                return Err(RgeError::RaggedBank {
                    bank: name.to_string(),
                    column: field.name.clone(),
                    len: column.len(),
                    nrows: raw.nrows,
                }
                .into());
            }
            write_column(&mut bytes, column)?;
        }
        Ok(zstd_compress(&bytes, ZSTD_LEVEL)?)
    }
}
