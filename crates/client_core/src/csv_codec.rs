//! CSV import/export of entity lists.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde_json::Value;
use shared::domain::{Entity, EntityId};
use thiserror::Error;
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv input has no header row")]
    MissingHeader,
    #[error("csv header has an empty column name at position {position}")]
    EmptyColumn { position: usize },
    #[error("csv header repeats column '{name}'")]
    DuplicateColumn { name: String },
    #[error("failed to write csv file '{path}': {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait CsvCodec: Send + Sync {
    /// Decodes a CSV document into candidate entities, in row order.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Entity>, FormatError>;

    fn encode_to_bytes(&self, entities: &[Entity]) -> Result<Vec<u8>, FormatError>;

    /// Writes `entities` to `path`, replacing any existing file.
    fn encode(&self, entities: &[Entity], path: &Path) -> Result<(), FormatError> {
        let bytes = self.encode_to_bytes(entities)?;
        fs::write(path, bytes).map_err(|source| FormatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), records = entities.len(), "csv file exported");
        Ok(())
    }
}

/// Header-driven codec: the first row names the fields, `id_column` maps to the entity id.
#[derive(Debug, Clone)]
pub struct CsvFileCodec {
    id_column: String,
    delimiter: u8,
}

impl Default for CsvFileCodec {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            delimiter: b',',
        }
    }
}

impl CsvFileCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }

    fn validate_headers(headers: &csv::StringRecord) -> Result<(), FormatError> {
        if headers.is_empty() {
            return Err(FormatError::MissingHeader);
        }

        let mut seen = HashSet::new();
        for (position, name) in headers.iter().enumerate() {
            if name.is_empty() {
                return Err(FormatError::EmptyColumn { position });
            }
            if !seen.insert(name) {
                return Err(FormatError::DuplicateColumn {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn columns_for(&self, entities: &[Entity]) -> Vec<String> {
        let mut columns = vec![self.id_column.clone()];
        for entity in entities {
            for key in entity.attributes.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

impl CsvCodec for CsvFileCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Entity>, FormatError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        Self::validate_headers(&headers)?;

        let mut entities = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut entity = Entity::new();
            for (column, cell) in headers.iter().zip(record.iter()) {
                if cell.is_empty() {
                    continue;
                }
                if column == self.id_column {
                    entity.id = Some(EntityId::new(cell));
                } else {
                    entity
                        .attributes
                        .insert(column.to_string(), Value::String(cell.to_string()));
                }
            }
            // Rows made only of delimiters carry nothing to import.
            if entity.id.is_none() && entity.attributes.is_empty() {
                continue;
            }
            entities.push(entity);
        }

        Ok(entities)
    }

    fn encode_to_bytes(&self, entities: &[Entity]) -> Result<Vec<u8>, FormatError> {
        let columns = self.columns_for(entities);
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        writer.write_record(&columns)?;

        for entity in entities {
            let row = columns.iter().map(|column| {
                if *column == self.id_column {
                    entity
                        .id
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                } else {
                    render_cell(entity.attributes.get(column))
                }
            });
            writer.write_record(row)?;
        }

        writer
            .into_inner()
            .map_err(|err| FormatError::Csv(csv::Error::from(err.into_error())))
    }
}

#[cfg(test)]
#[path = "tests/csv_codec_tests.rs"]
mod tests;
