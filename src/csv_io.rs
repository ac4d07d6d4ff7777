use crate::errors::{AppError, AppResult};
use crate::models::{CsvFileAttachment, OverrideField, OverrideRow};
use base64::Engine;
use once_cell::sync::Lazy;
use std::collections::HashMap;

const UTF8_BOM: &str = "\u{feff}";

// Legacy exports used `category` as the key column.
static HEADER_ALIASES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("category", "name")]));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Field(OverrideField),
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub rows: Vec<OverrideRow>,
    pub warnings: Vec<String>,
}

pub fn canonical_header() -> Vec<&'static str> {
    let mut header = vec!["name"];
    header.extend(OverrideField::ALL.iter().map(|field| field.as_str()));
    header
}

// Every cell quoted, embedded quotes doubled, BOM prefix for Excel.
pub fn serialize_rows(rows: &[OverrideRow]) -> AppResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(canonical_header())
        .map_err(|error| AppError::Internal(error.to_string()))?;

    for row in rows {
        let mut record = vec![row.name.as_str()];
        record.extend(OverrideField::ALL.iter().map(|field| row.field(*field)));
        writer
            .write_record(record)
            .map_err(|error| AppError::Internal(error.to_string()))?;
    }

    writer
        .flush()
        .map_err(|error| AppError::Internal(error.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|error| AppError::Internal(error.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|error| AppError::Internal(error.to_string()))?;

    Ok(format!("{}{}", UTF8_BOM, body))
}

pub fn parse_rows(text: &str) -> AppResult<ParsedCsv> {
    let body = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut columns: Option<Vec<Option<Column>>> = None;
    let mut parsed = ParsedCsv::default();

    for record in reader.records() {
        let record = record.map_err(|error| AppError::Parse(format!("CSV input rejected: {}", error)))?;

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if record
            .get(0)
            .map(|cell| cell.trim_start().starts_with('#'))
            .unwrap_or(false)
        {
            continue;
        }

        if columns.is_none() {
            columns = Some(map_header(&record, &mut parsed.warnings));
            continue;
        }

        let mut row = OverrideRow::default();
        if let Some(active) = columns.as_ref() {
            for (position, cell) in record.iter().enumerate() {
                match active.get(position).and_then(|column| *column) {
                    Some(Column::Name) => row.name = cell.trim().to_string(),
                    Some(Column::Field(field)) => row.set_field(field, cell.trim().to_string()),
                    None => {}
                }
            }
        }

        if row.name.trim().is_empty() {
            parsed
                .warnings
                .push("dropped a CSV row without a category name".to_string());
            continue;
        }
        parsed.rows.push(row);
    }

    if columns.is_none() {
        return Err(AppError::Parse("CSV input has no header row".to_string()));
    }

    Ok(parsed)
}

fn map_header(record: &csv::StringRecord, warnings: &mut Vec<String>) -> Vec<Option<Column>> {
    record
        .iter()
        .map(|cell| {
            let key = cell
                .trim()
                .trim_start_matches('\u{feff}')
                .to_ascii_lowercase();
            let canonical = HEADER_ALIASES.get(key.as_str()).copied().unwrap_or(key.as_str());
            if canonical == "name" {
                Some(Column::Name)
            } else if let Some(field) = OverrideField::parse(canonical) {
                Some(Column::Field(field))
            } else {
                warnings.push(format!("ignoring unknown CSV column '{}'", cell.trim()));
                None
            }
        })
        .collect()
}

pub fn decode_attachment(file: &CsvFileAttachment) -> AppResult<String> {
    let name_ok = file.name.to_ascii_lowercase().ends_with(".csv");
    let mime_ok = file.mime_type.is_empty()
        || file.mime_type.eq_ignore_ascii_case("text/csv")
        || file.mime_type.eq_ignore_ascii_case("application/vnd.ms-excel");
    if !name_ok && !mime_ok {
        return Err(AppError::Parse(format!(
            "'{}' ({}) is not a CSV file",
            file.name, file.mime_type
        )));
    }

    let (meta, payload) = file
        .data_url
        .split_once(',')
        .ok_or_else(|| AppError::Parse("file content must be a data URL".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(AppError::Parse("file content must be base64 encoded".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|error| AppError::Parse(format!("invalid base64 payload: {}", error)))?;
    String::from_utf8(bytes).map_err(|_| AppError::Parse("CSV file is not valid UTF-8".to_string()))
}
