use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::BasisError;

/// On-disk encoding of a [`FileDatabase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseFormat {
    /// Compact binary encoding (bincode).
    #[default]
    Binary,
    /// Human-readable JSON.
    Text,
}

impl DatabaseFormat {
    /// File extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            DatabaseFormat::Binary => "bin",
            DatabaseFormat::Text => "json",
        }
    }

    /// `<base>.<ext>` for this format.
    pub fn file_name(self, base: &str) -> PathBuf {
        PathBuf::from(format!("{base}.{}", self.extension()))
    }
}

/// Named scalar/array store used to persist bases.
///
/// Writes become durable at [`Database::flush`]; implementations must make
/// a flush all-or-nothing so readers never see half of one.
pub trait Database: fmt::Debug {
    /// Create (or truncate) the store at `path` and open it for writing.
    fn create(&mut self, path: &Path) -> Result<(), BasisError>;

    /// Open an existing store at `path`.
    fn open(&mut self, path: &Path) -> Result<(), BasisError>;

    /// Persist every write since the last flush.
    fn flush(&mut self) -> Result<(), BasisError>;

    /// Flush and release the store. Closing a closed store is a no-op.
    fn close(&mut self) -> Result<(), BasisError>;

    fn is_open(&self) -> bool;

    fn put_integer(&mut self, key: &str, value: i64) -> Result<(), BasisError>;

    fn put_double(&mut self, key: &str, value: f64) -> Result<(), BasisError>;

    fn put_double_array(&mut self, key: &str, data: &[f64]) -> Result<(), BasisError>;

    fn get_integer(&self, key: &str) -> Result<i64, BasisError>;

    fn get_double(&self, key: &str) -> Result<f64, BasisError>;

    fn get_double_array(&self, key: &str) -> Result<Vec<f64>, BasisError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Entry {
    Integer(i64),
    Double(f64),
    DoubleArray(Vec<f64>),
}

/// File-backed [`Database`] holding its entries in memory between flushes.
#[derive(Debug, Default)]
pub struct FileDatabase {
    format: DatabaseFormat,
    path: Option<PathBuf>,
    entries: BTreeMap<String, Entry>,
    dirty: bool,
}

fn io_error(path: &Path, err: std::io::Error) -> BasisError {
    BasisError::Storage(format!("{}: {err}", path.display()))
}

fn serde_error(path: &Path, err: impl ToString) -> BasisError {
    BasisError::Storage(format!("{}: {}", path.display(), err.to_string()))
}

impl FileDatabase {
    pub fn new(format: DatabaseFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    pub fn format(&self) -> DatabaseFormat {
        self.format
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn insert(&mut self, key: &str, entry: Entry) -> Result<(), BasisError> {
        if self.path.is_none() {
            return Err(BasisError::Storage(format!(
                "cannot write '{key}': database is not open"
            )));
        }
        self.entries.insert(key.to_string(), entry);
        self.dirty = true;
        Ok(())
    }

    fn entry(&self, key: &str) -> Result<&Entry, BasisError> {
        if self.path.is_none() {
            return Err(BasisError::Storage(format!(
                "cannot read '{key}': database is not open"
            )));
        }
        self.entries
            .get(key)
            .ok_or_else(|| BasisError::Storage(format!("key '{key}' not found")))
    }

    fn write_file(&self, path: &Path) -> Result<(), BasisError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let file = File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        match self.format {
            DatabaseFormat::Binary => bincode::serialize_into(&mut writer, &self.entries)
                .map_err(|e| serde_error(&tmp, e))?,
            DatabaseFormat::Text => serde_json::to_writer_pretty(&mut writer, &self.entries)
                .map_err(|e| serde_error(&tmp, e))?,
        }
        writer.flush().map_err(|e| io_error(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, path).map_err(|e| io_error(path, e))
    }

    fn read_file(&self, path: &Path) -> Result<BTreeMap<String, Entry>, BasisError> {
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let reader = BufReader::new(file);
        match self.format {
            DatabaseFormat::Binary => {
                bincode::deserialize_from(reader).map_err(|e| serde_error(path, e))
            }
            DatabaseFormat::Text => {
                serde_json::from_reader(reader).map_err(|e| serde_error(path, e))
            }
        }
    }
}

impl Database for FileDatabase {
    fn create(&mut self, path: &Path) -> Result<(), BasisError> {
        self.close()?;
        self.entries.clear();
        self.write_file(path)?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    fn open(&mut self, path: &Path) -> Result<(), BasisError> {
        self.close()?;
        self.entries = self.read_file(path)?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BasisError> {
        if let Some(path) = &self.path {
            if self.dirty {
                self.write_file(path)?;
                self.dirty = false;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), BasisError> {
        self.flush()?;
        self.path = None;
        self.entries.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.path.is_some()
    }

    fn put_integer(&mut self, key: &str, value: i64) -> Result<(), BasisError> {
        self.insert(key, Entry::Integer(value))
    }

    fn put_double(&mut self, key: &str, value: f64) -> Result<(), BasisError> {
        self.insert(key, Entry::Double(value))
    }

    fn put_double_array(&mut self, key: &str, data: &[f64]) -> Result<(), BasisError> {
        self.insert(key, Entry::DoubleArray(data.to_vec()))
    }

    fn get_integer(&self, key: &str) -> Result<i64, BasisError> {
        match self.entry(key)? {
            Entry::Integer(v) => Ok(*v),
            other => Err(type_mismatch(key, "integer", other)),
        }
    }

    fn get_double(&self, key: &str) -> Result<f64, BasisError> {
        match self.entry(key)? {
            Entry::Double(v) => Ok(*v),
            other => Err(type_mismatch(key, "double", other)),
        }
    }

    fn get_double_array(&self, key: &str) -> Result<Vec<f64>, BasisError> {
        match self.entry(key)? {
            Entry::DoubleArray(v) => Ok(v.clone()),
            other => Err(type_mismatch(key, "double array", other)),
        }
    }
}

fn type_mismatch(key: &str, expected: &str, found: &Entry) -> BasisError {
    let found = match found {
        Entry::Integer(_) => "integer",
        Entry::Double(_) => "double",
        Entry::DoubleArray(_) => "double array",
    };
    BasisError::Storage(format!("key '{key}' holds a {found}, expected {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn roundtrip(format: DatabaseFormat) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format.file_name("store"));

        let mut db = FileDatabase::new(format);
        db.create(&path).unwrap();
        db.put_integer("count", 3).unwrap();
        db.put_double("time", 0.1 + 0.2).unwrap();
        db.put_double_array("values", &[1.0 / 3.0, -2.5e-300, 7.0]).unwrap();
        db.close().unwrap();
        assert!(!db.is_open());

        let mut db = FileDatabase::new(format);
        db.open(&path).unwrap();
        assert_eq!(db.get_integer("count").unwrap(), 3);
        assert_eq!(db.get_double("time").unwrap(), 0.1 + 0.2);
        assert_eq!(
            db.get_double_array("values").unwrap(),
            vec![1.0 / 3.0, -2.5e-300, 7.0]
        );
    }

    #[test]
    fn test_roundtrip_binary() {
        roundtrip(DatabaseFormat::Binary);
    }

    #[test]
    fn test_roundtrip_text() {
        roundtrip(DatabaseFormat::Text);
    }

    #[test]
    fn test_unflushed_writes_not_visible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        let mut writer = FileDatabase::new(DatabaseFormat::Binary);
        writer.create(&path).unwrap();
        writer.put_double("a", 1.0).unwrap();
        writer.flush().unwrap();
        writer.put_double("b", 2.0).unwrap();

        let mut reader = FileDatabase::new(DatabaseFormat::Binary);
        reader.open(&path).unwrap();
        assert_eq!(reader.get_double("a").unwrap(), 1.0);
        assert!(reader.get_double("b").is_err());
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let mut db = FileDatabase::new(DatabaseFormat::Text);
        let err = db.open(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BasisError::Storage(_)));
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let mut db = FileDatabase::new(DatabaseFormat::Binary);
        let path = dir.path().join("no").join("such").join("dir.bin");
        assert!(matches!(db.create(&path), Err(BasisError::Storage(_))));
        assert!(!db.is_open());
    }

    #[test]
    fn test_closed_database_rejects_io() {
        let mut db = FileDatabase::new(DatabaseFormat::Binary);
        assert!(db.put_double("x", 1.0).is_err());
        assert!(db.get_double("x").is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let dir = tempdir().unwrap();
        let mut db = FileDatabase::new(DatabaseFormat::Binary);
        db.create(&dir.path().join("t.bin")).unwrap();
        db.put_integer("n", 2).unwrap();
        assert!(matches!(db.get_double("n"), Err(BasisError::Storage(_))));
    }
}
