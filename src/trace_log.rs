/// JSON Lines Emission
///
/// Trial and step records go to disk as one JSON object per line so that
/// downstream tooling can parse the logs a line at a time. Writes are
/// append-only for the lifetime of the logger; opening a path starts a
/// fresh file.
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonlLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlLogger {
    /// Open `path` for writing, truncating any previous run's output
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line
    pub fn log<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{}", json)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Write a whole batch of records to `path` in one go
pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> io::Result<()> {
    let mut logger = JsonlLogger::create(path)?;
    for record in records {
        logger.log(record)?;
    }
    logger.flush()
}
