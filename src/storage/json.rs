use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::Result;
use crate::model::Instance;
use crate::schema::Schema;
use crate::storage::{Record, Storage};

/// File-backed JSON persistence: one file per model holding a
/// pretty-printed array of serialized records.
///
/// A missing or empty file reads as an empty collection.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonStorage {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write(&mut self, records: &[&Instance]) -> Result<bool> {
        let maps = records
            .iter()
            .map(|instance| instance.to_record())
            .collect::<Result<Vec<_>>>()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &maps)?;
        Ok(true)
    }

    fn read(&self, _schema: &Arc<Schema>) -> Result<Vec<Record>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let maps: Vec<serde_json::Map<String, Json>> = serde_json::from_str(&text)?;
        Ok(maps.into_iter().map(Record::Fields).collect())
    }
}
