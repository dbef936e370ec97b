use std::collections::HashMap;
use std::path::Path;

use hdf5::types::TypeDescriptor;
use hdf5::H5Type;
use log::debug;
use thiserror::Error;

/// Table holding one row per simulated event
pub const EVENT_HEADER: &str = "I3EventHeader";

/// Columnar access to per-event simulation records
///
/// Records are organised in named tables, each with named columns
/// that hold one value per event. All tables share the same row order.
pub trait EventSource {
    /// Whether a table with the given name exists
    fn has_table(&self, table: &str) -> bool;

    /// Read a full column
    fn column(&self, table: &str, field: &str) -> Result<Vec<f64>, SourceError>;

    /// Number of events
    fn nrows(&self) -> Result<usize, SourceError> {
        Ok(self.column(EVENT_HEADER, "Run")?.len())
    }

    /// Check that a table exists
    fn require_table(&self, table: &str) -> Result<(), SourceError> {
        if self.has_table(table) {
            Ok(())
        } else {
            Err(SourceError::FieldNotFound(table.to_owned()))
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No table or column `{0}` in event source")]
    FieldNotFound(String),
    #[error("Column `{0}` is not one-dimensional")]
    NotAColumn(String),
    #[error("`{0}` is neither a group nor a compound dataset")]
    NotATable(String),
    #[error("Reading column `{0}` from a compound table is not supported")]
    UnsupportedField(String),
    #[error("Column `{column}` has unsupported type {ty}")]
    UnsupportedType { column: String, ty: String },
    #[error("Column `{column}` has {found} rows, expected {expected}")]
    Length {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

/// In-memory event tables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnTable {
    tables: HashMap<String, HashMap<String, Vec<f64>>>,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, replacing any previous one with the same name
    pub fn insert_column(
        &mut self,
        table: &str,
        field: &str,
        values: Vec<f64>,
    ) -> &mut Self {
        self.tables
            .entry(table.to_owned())
            .or_default()
            .insert(field.to_owned(), values);
        self
    }

    pub fn with_column(mut self, table: &str, field: &str, values: Vec<f64>) -> Self {
        self.insert_column(table, field, values);
        self
    }
}

impl EventSource for ColumnTable {
    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn column(&self, table: &str, field: &str) -> Result<Vec<f64>, SourceError> {
        self.tables
            .get(table)
            .and_then(|t| t.get(field))
            .cloned()
            .ok_or_else(|| SourceError::FieldNotFound(format!("{table}.{field}")))
    }
}

/// Event tables stored in an HDF5 file
///
/// Each table is either a one-dimensional compound dataset in the
/// file root, one member per column, as written by PyTables and the
/// IceCube `hdfwriter`, or a group holding one numeric dataset per
/// column.
#[derive(Debug)]
pub struct Hdf5Source {
    file: hdf5::File,
}

impl Hdf5Source {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        debug!("Opening event source {:?}", path.as_ref());
        let file = hdf5::File::open(path)?;
        Ok(Self { file })
    }

    fn group_column(
        &self,
        group: &hdf5::Group,
        table: &str,
        field: &str,
    ) -> Result<Vec<f64>, SourceError> {
        let name = format!("{table}.{field}");
        if !group.link_exists(field) {
            return Err(SourceError::FieldNotFound(name));
        }
        let dataset = group.dataset(field)?;
        if dataset.ndim() != 1 {
            return Err(SourceError::NotAColumn(name));
        }
        Ok(dataset.read_raw::<f64>()?)
    }

    fn compound_column(&self, table: &str, field: &str) -> Result<Vec<f64>, SourceError> {
        let name = format!("{table}.{field}");
        let dataset = self.file.dataset(table)?;
        if dataset.ndim() != 1 {
            return Err(SourceError::NotAColumn(table.to_owned()));
        }
        let TypeDescriptor::Compound(members) = dataset.dtype()?.to_descriptor()? else {
            return Err(SourceError::NotATable(table.to_owned()));
        };
        let member = members
            .fields
            .into_iter()
            .find(|m| m.name == field)
            .ok_or_else(|| SourceError::FieldNotFound(name.clone()))?;
        let column = match member.ty {
            TypeDescriptor::Integer(_)
            | TypeDescriptor::Unsigned(_)
            | TypeDescriptor::Float(_) => read_numeric_member(&dataset, field),
            TypeDescriptor::Boolean => read_flag_member(&dataset, field),
            ty => {
                return Err(SourceError::UnsupportedType {
                    column: name,
                    ty: ty.to_string(),
                })
            }
        };
        match column {
            Some(values) => Ok(values?),
            None => Err(SourceError::UnsupportedField(name)),
        }
    }
}

impl EventSource for Hdf5Source {
    fn has_table(&self, table: &str) -> bool {
        self.file.link_exists(table)
    }

    fn column(&self, table: &str, field: &str) -> Result<Vec<f64>, SourceError> {
        if !self.has_table(table) {
            return Err(SourceError::FieldNotFound(table.to_owned()));
        }
        match self.file.group(table) {
            Ok(group) => self.group_column(&group, table, field),
            Err(_) => self.compound_column(table, field),
        }
    }
}

// HDF5 converts compound types member by member, matched by name. A
// single-member struct therefore reads one column of a wider table.
macro_rules! compound_member {
    ($($row:ident { $member:ident }),* $(,)?) => {
        $(
            #[allow(non_snake_case)]
            #[derive(Clone, Copy, H5Type)]
            #[repr(C)]
            struct $row {
                $member: f64,
            }
        )*

        fn read_numeric_member(
            dataset: &hdf5::Dataset,
            member: &str,
        ) -> Option<hdf5::Result<Vec<f64>>> {
            let column = match member {
                $(
                    stringify!($member) => dataset
                        .read_raw::<$row>()
                        .map(|rows| rows.into_iter().map(|row| row.$member).collect()),
                )*
                "type" => dataset
                    .read_raw::<ParticleType>()
                    .map(|rows| rows.into_iter().map(|row| row.pid).collect()),
                _ => return None,
            };
            Some(column)
        }
    };
}

compound_member! {
    RunNumber { Run },
    OneWeightMember { OneWeight },
    GeneratedEvents { NEvents },
    InteractionCode { InteractionType },
    Energy { energy },
    Zenith { zenith },
    CutValue { value },
}

#[derive(Clone, Copy, H5Type)]
#[repr(C)]
struct ParticleType {
    #[hdf5(rename = "type")]
    pid: f64,
}

#[derive(Clone, Copy, H5Type)]
#[repr(C)]
struct CutFlag {
    value: bool,
}

fn read_flag_member(dataset: &hdf5::Dataset, member: &str) -> Option<hdf5::Result<Vec<f64>>> {
    if member != "value" {
        return None;
    }
    let column = dataset
        .read_raw::<CutFlag>()
        .map(|rows| rows.into_iter().map(|row| f64::from(u8::from(row.value))).collect());
    Some(column)
}
