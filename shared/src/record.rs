use crate::error::WireError;
use crate::{ROW_ID_COLUMN, ROW_NUMBER_COLUMN};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned, page-stable identifier of a record within a dataset.
pub type RowId = u64;

/// Scalar cell value as delivered by the page endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Bool(_) | CellValue::Number(_) => false,
        }
    }

    /// Numeric reading of the value, accepting numeric strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(number) => Some(*number),
            CellValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            CellValue::Null | CellValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Text(text) => f.write_str(text),
        }
    }
}

/// One row of the dataset: ordered column values plus the backend row id.
///
/// The `_id` key of the incoming object becomes `row_id` and is removed from
/// `values`; the remaining keys keep the order the backend sent them in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "IndexMap<String, CellValue>", into = "IndexMap<String, CellValue>")]
pub struct Record {
    pub row_id: RowId,
    pub values: IndexMap<String, CellValue>,
}

impl Record {
    pub fn new(row_id: RowId, values: IndexMap<String, CellValue>) -> Self {
        Self { row_id, values }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl TryFrom<IndexMap<String, CellValue>> for Record {
    type Error = WireError;

    fn try_from(mut values: IndexMap<String, CellValue>) -> Result<Self, Self::Error> {
        let raw_id = values
            .shift_remove(ROW_ID_COLUMN)
            .ok_or(WireError::MissingRowId)?;
        values.shift_remove(ROW_NUMBER_COLUMN);
        let row_id = parse_row_id(&raw_id)?;
        Ok(Self { row_id, values })
    }
}

impl From<Record> for IndexMap<String, CellValue> {
    fn from(record: Record) -> Self {
        let mut map = IndexMap::with_capacity(record.values.len() + 1);
        map.insert(
            ROW_ID_COLUMN.to_string(),
            CellValue::Number(record.row_id as f64),
        );
        map.extend(record.values);
        map
    }
}

fn parse_row_id(value: &CellValue) -> Result<RowId, WireError> {
    match value {
        CellValue::Number(number) if *number >= 0.0 && number.fract() == 0.0 => Ok(*number as RowId),
        CellValue::Text(text) => text
            .trim()
            .parse::<RowId>()
            .map_err(|_| WireError::InvalidRowId(text.clone())),
        other => Err(WireError::InvalidRowId(other.to_string())),
    }
}
