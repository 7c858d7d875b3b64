//! Column classification and cell rendering.
//!
//! Classification inspects a sample of freshly loaded rows once per dataset.
//! The resulting descriptors are frozen for the lifetime of the dataset, even
//! when later pages carry values that would classify differently.

use crate::record::{CellValue, Record};
use crate::{ROW_ID_COLUMN, ROW_NUMBER_COLUMN, ROW_TAG_COLUMN};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Epoch seconds around the year 2000; smaller numbers are never timestamps.
pub const EPOCH_SECONDS_FLOOR: f64 = 9e8;
/// Values above this are read as epoch milliseconds, whatever the column name.
pub const EPOCH_MILLIS_FLOOR: f64 = 9e11;
/// Upper bound on rows inspected by [`classify_columns`].
pub const MAX_SAMPLE_ROWS: usize = 50;

const TIMESTAMP_KEYWORDS: &[&str] = &[
    "time", "date", "seen", "created", "modified", "timestamp", "last", "start", "end",
];

const IDENTIFIER_WIDTH: u32 = 70;
const TIMESTAMP_WIDTH: u32 = 170;
const GENERIC_WIDTH: u32 = 150;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Identifier,
    Timestamp,
    Generic,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatterKind {
    RowNumber,
    EpochTimestamp,
    Highlight,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub display_width: u32,
    pub formatter: FormatterKind,
}

impl ColumnDescriptor {
    fn identifier() -> Self {
        Self {
            name: ROW_NUMBER_COLUMN.to_string(),
            kind: ColumnKind::Identifier,
            display_width: IDENTIFIER_WIDTH,
            formatter: FormatterKind::RowNumber,
        }
    }

    fn data(name: &str, kind: ColumnKind) -> Self {
        let (display_width, formatter) = match kind {
            ColumnKind::Timestamp => (TIMESTAMP_WIDTH, FormatterKind::EpochTimestamp),
            ColumnKind::Identifier => (IDENTIFIER_WIDTH, FormatterKind::RowNumber),
            ColumnKind::Generic => (GENERIC_WIDTH, FormatterKind::Highlight),
        };
        Self {
            name: name.to_string(),
            kind,
            display_width,
            formatter,
        }
    }
}

pub fn is_reserved_column(name: &str) -> bool {
    matches!(name, ROW_ID_COLUMN | ROW_NUMBER_COLUMN | ROW_TAG_COLUMN)
}

/// Derives the column layout from the first rows of a dataset.
///
/// The row-number column always leads. Data columns follow in the order of
/// the first sampled record; each is judged on its first non-blank sample
/// value.
pub fn classify_columns(sample: &[Record]) -> Vec<ColumnDescriptor> {
    let sample = &sample[..sample.len().min(MAX_SAMPLE_ROWS)];
    let mut descriptors = vec![ColumnDescriptor::identifier()];

    let Some(first) = sample.first() else {
        return descriptors;
    };

    for name in first.column_names().filter(|name| !is_reserved_column(name)) {
        let sample_value = sample
            .iter()
            .filter_map(|record| record.get(name))
            .find(|value| !value.is_blank());
        let kind = match sample_value {
            Some(value) if looks_like_timestamp(name, value) => ColumnKind::Timestamp,
            _ => ColumnKind::Generic,
        };
        descriptors.push(ColumnDescriptor::data(name, kind));
    }
    descriptors
}

fn looks_like_timestamp(column: &str, value: &CellValue) -> bool {
    let Some(number) = value.as_number() else {
        return false;
    };
    if number <= EPOCH_SECONDS_FLOOR {
        return false;
    }
    has_timestamp_keyword(column) || number > EPOCH_MILLIS_FLOOR
}

fn has_timestamp_keyword(column: &str) -> bool {
    let lowered = column.to_lowercase();
    TIMESTAMP_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Display text of a cell under its column's formatter.
///
/// Timestamp cells that are missing or not numeric fall back to the raw value.
pub fn render_cell(descriptor: &ColumnDescriptor, value: Option<&CellValue>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match descriptor.formatter {
        FormatterKind::EpochTimestamp => format_epoch(value).unwrap_or_else(|| value.to_string()),
        FormatterKind::RowNumber | FormatterKind::Highlight => value.to_string(),
    }
}

fn format_epoch(value: &CellValue) -> Option<String> {
    let number = value.as_number()?;
    let millis = if number > EPOCH_MILLIS_FLOOR {
        number
    } else {
        number * 1000.0
    };
    let datetime = DateTime::from_timestamp_millis(millis as i64)?;
    Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// A run of cell text, flagged when it matches the search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSegment {
    pub text: String,
    pub highlighted: bool,
}

/// Splits `text` around case-insensitive literal matches of `query`.
pub fn highlight_segments(text: &str, query: &str) -> Vec<HighlightSegment> {
    let query = query.trim();
    if query.is_empty() || text.is_empty() {
        return vec![HighlightSegment {
            text: text.to_string(),
            highlighted: false,
        }];
    }

    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut segments = Vec::new();
    let mut plain_start = 0;
    let mut index = 0;

    while index < chars.len() {
        match match_len_at(&chars[index..], &needle) {
            Some(len) => {
                let match_start = chars[index].0;
                let match_end = chars.get(index + len).map_or(text.len(), |(pos, _)| *pos);
                if plain_start < match_start {
                    segments.push(HighlightSegment {
                        text: text[plain_start..match_start].to_string(),
                        highlighted: false,
                    });
                }
                segments.push(HighlightSegment {
                    text: text[match_start..match_end].to_string(),
                    highlighted: true,
                });
                plain_start = match_end;
                index += len;
            }
            None => index += 1,
        }
    }
    if plain_start < text.len() {
        segments.push(HighlightSegment {
            text: text[plain_start..].to_string(),
            highlighted: false,
        });
    }
    segments
}

// Number of haystack chars consumed by a case-insensitive match of `needle`.
fn match_len_at(haystack: &[(usize, char)], needle: &[char]) -> Option<usize> {
    let mut lowered = Vec::with_capacity(needle.len());
    for (consumed, (_, ch)) in haystack.iter().enumerate() {
        lowered.extend(ch.to_lowercase());
        if lowered.len() >= needle.len() {
            return (lowered == needle).then_some(consumed + 1);
        }
        if !needle.starts_with(&lowered) {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(row_id: u64, cells: &[(&str, CellValue)]) -> Record {
        let values: IndexMap<String, CellValue> = cells
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Record::new(row_id, values)
    }

    fn kind_of(descriptors: &[ColumnDescriptor], name: &str) -> ColumnKind {
        descriptors
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.kind)
            .unwrap()
    }

    #[test]
    fn keyword_column_with_epoch_seconds_is_timestamp() {
        let sample = vec![record(
            1,
            &[
                ("LastModified", CellValue::Number(1_700_000_000.0)),
                ("Count", CellValue::Number(1_700_000_000.0)),
            ],
        )];
        let descriptors = classify_columns(&sample);

        assert_eq!(kind_of(&descriptors, "LastModified"), ColumnKind::Timestamp);
        assert_eq!(kind_of(&descriptors, "Count"), ColumnKind::Generic);
    }

    #[test]
    fn millisecond_magnitude_overrides_missing_keyword() {
        let sample = vec![record(1, &[("Value", CellValue::Text("1700000000000".into()))])];
        assert_eq!(kind_of(&classify_columns(&sample), "Value"), ColumnKind::Timestamp);
    }

    #[test]
    fn small_numbers_are_never_timestamps() {
        let sample = vec![record(1, &[("EventTime", CellValue::Number(4624.0))])];
        assert_eq!(kind_of(&classify_columns(&sample), "EventTime"), ColumnKind::Generic);
    }

    #[test]
    fn first_non_blank_sample_value_decides() {
        let sample = vec![
            record(1, &[("Created", CellValue::Null)]),
            record(2, &[("Created", CellValue::Number(1_600_000_000.0))]),
        ];
        assert_eq!(kind_of(&classify_columns(&sample), "Created"), ColumnKind::Timestamp);
    }

    #[test]
    fn classification_is_idempotent_and_leads_with_row_number() {
        let sample = vec![record(
            1,
            &[
                ("Tag", CellValue::Null),
                ("Start", CellValue::Number(1_650_000_000.0)),
                ("User", CellValue::Text("admin".into())),
            ],
        )];
        let first = classify_columns(&sample);
        let second = classify_columns(&sample);

        assert_eq!(first, second);
        let names: Vec<&str> = first.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["No.", "Start", "User"]);
        assert_eq!(first[0].kind, ColumnKind::Identifier);
    }

    #[test]
    fn timestamp_rendering_disambiguates_units_and_tolerates_garbage() {
        let descriptor = ColumnDescriptor::data("Created", ColumnKind::Timestamp);

        let seconds = CellValue::Number(1_700_000_000.0);
        let millis = CellValue::Number(1_700_000_000_000.0);
        assert_eq!(render_cell(&descriptor, Some(&seconds)), "2023-11-14 22:13:20");
        assert_eq!(render_cell(&descriptor, Some(&millis)), "2023-11-14 22:13:20");

        let text = CellValue::Text("yesterday".into());
        assert_eq!(render_cell(&descriptor, Some(&text)), "yesterday");
        assert_eq!(render_cell(&descriptor, Some(&CellValue::Null)), "");
        assert_eq!(render_cell(&descriptor, None), "");
    }

    #[test]
    fn highlight_marks_case_insensitive_matches() {
        let segments = highlight_segments("cmd.exe spawned CMD", "cmd");
        let flagged: Vec<(&str, bool)> = segments
            .iter()
            .map(|s| (s.text.as_str(), s.highlighted))
            .collect();
        assert_eq!(
            flagged,
            vec![("cmd", true), (".exe spawned ", false), ("CMD", true)]
        );
    }

    #[test]
    fn highlight_without_query_is_single_plain_segment() {
        let segments = highlight_segments("svchost.exe", "  ");
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].highlighted);
    }
}
