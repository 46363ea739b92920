//! JSONL action log writer with daily file rotation.

use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, Utc};
use tracing::warn;

use super::{ActionEntry, ActionLog};
use crate::{AppError, Result};

const FILE_PREFIX: &str = "actions-";

/// Internal state protected by a mutex.
struct WriterState {
    current_date: NaiveDate,
    writer: BufWriter<fs::File>,
}

/// A daily-rotating JSONL action log.
///
/// Appends one JSON object per line to `<dir>/actions-YYYY-MM-DD.jsonl`,
/// opening a new file when the calendar date changes between writes.
pub struct JsonlActionLog {
    dir: PathBuf,
    state: Mutex<Option<WriterState>>,
}

impl JsonlActionLog {
    /// Construct a log that stores files in `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create action log directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir,
            state: Mutex::new(None),
        })
    }

    /// Path of the file holding entries recorded on `date`.
    #[must_use]
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{date}.jsonl"))
    }

    /// Entries recorded on `date`, in write order. Malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the file exists but cannot be read.
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<ActionEntry>> {
        let path = self.file_for(date);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Io(format!(
                    "failed to open action log {}: {e}",
                    path.display()
                )))
            }
        };
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| AppError::Io(format!("action log read failed: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(file = %path.display(), "skipping malformed action entry: {e}"),
            }
        }
        Ok(entries)
    }

    fn open_for_date(path: &Path) -> Result<BufWriter<fs::File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                AppError::Io(format!("failed to open action log {}: {e}", path.display()))
            })?;
        Ok(BufWriter::new(file))
    }
}

impl ActionLog for JsonlActionLog {
    fn record(&self, entry: ActionEntry) -> Result<()> {
        let today = Utc::now().date_naive();

        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::Io("action log mutex poisoned".to_string()))?;

        let needs_rotation = guard.as_ref().is_none_or(|s| s.current_date != today);

        if needs_rotation {
            let new_writer = Self::open_for_date(&self.file_for(today))?;
            *guard = Some(WriterState {
                current_date: today,
                writer: new_writer,
            });
        }

        if let Some(state) = guard.as_mut() {
            let line = serde_json::to_string(&entry)
                .map_err(|e| AppError::Io(format!("failed to serialize action entry: {e}")))?;
            if let Err(e) = writeln!(state.writer, "{line}") {
                warn!("failed to write action entry: {e}");
                return Err(AppError::Io(format!("action log write failed: {e}")));
            }
            if let Err(e) = state.writer.flush() {
                warn!("failed to flush action log: {e}");
                return Err(AppError::Io(format!("action log flush failed: {e}")));
            }
        }

        Ok(())
    }
}
