//! JSONL outbox writer with daily file rotation.

use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{NaiveDate, Utc};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::{RecomputeOutbox, RecomputeTask};
use crate::{AppError, Result};

const TASK_PREFIX: &str = "recompute-";
const ACK_FILE: &str = "acknowledged.jsonl";

/// Internal state protected by a mutex.
struct WriterState {
    current_date: NaiveDate,
    writer: BufWriter<fs::File>,
}

/// A daily-rotating JSONL outbox.
///
/// Appends one task per line to `<dir>/recompute-YYYY-MM-DD.jsonl` and
/// records acknowledged task ids in `<dir>/acknowledged.jsonl`. Compaction
/// deletes task files whose every task is acknowledged and trims the
/// acknowledgement file to ids still present in the remaining task files.
pub struct JsonlOutboxWriter {
    dir: PathBuf,
    state: Mutex<Option<WriterState>>,
}

impl JsonlOutboxWriter {
    /// Construct an outbox rooted at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Outbox`] if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Outbox(format!(
                "failed to create outbox directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir,
            state: Mutex::new(None),
        })
    }

    /// Directory holding the outbox files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn open_append(path: &Path) -> Result<fs::File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::Outbox(format!("failed to open {}: {e}", path.display())))
    }

    fn open_for_date(dir: &Path, date: NaiveDate) -> Result<BufWriter<fs::File>> {
        let path = dir.join(format!("{TASK_PREFIX}{date}.jsonl"));
        Ok(BufWriter::new(Self::open_append(&path)?))
    }

    fn task_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AppError::Outbox(format!("failed to list {}: {e}", self.dir.display()))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TASK_PREFIX) && n.ends_with(".jsonl"))
            })
            .collect();
        // Date-stamped names sort chronologically.
        files.sort();
        Ok(files)
    }

    fn read_lines(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(path)
            .map_err(|e| AppError::Outbox(format!("failed to open {}: {e}", path.display())))?;
        BufReader::new(file)
            .lines()
            .map(|l| l.map_err(|e| AppError::Outbox(format!("read failed: {e}"))))
            .filter(|l| !matches!(l, Ok(s) if s.trim().is_empty()))
            .collect()
    }

    /// Ids of well-formed tasks in `path` and whether any line was malformed.
    fn task_ids(path: &Path) -> Result<(Vec<String>, bool)> {
        let mut ids = Vec::new();
        let mut malformed = false;
        for line in Self::read_lines(path)? {
            match serde_json::from_str::<RecomputeTask>(&line) {
                Ok(task) => ids.push(task.id),
                Err(_) => malformed = true,
            }
        }
        Ok((ids, malformed))
    }

    fn rewrite_acknowledged(&self, ids: &[&String]) -> Result<()> {
        let target = self.dir.join(ACK_FILE);
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| AppError::Outbox(format!("failed to stage {ACK_FILE}: {e}")))?;
        for id in ids {
            let line = serde_json::to_string(id)?;
            writeln!(tmp, "{line}")
                .map_err(|e| AppError::Outbox(format!("ack write failed: {e}")))?;
        }
        tmp.flush()
            .map_err(|e| AppError::Outbox(format!("ack flush failed: {e}")))?;
        tmp.persist(&target).map_err(|e| {
            AppError::Outbox(format!("failed to replace {}: {e}", target.display()))
        })?;
        Ok(())
    }

    fn acknowledged_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for line in Self::read_lines(&self.dir.join(ACK_FILE))? {
            match serde_json::from_str::<String>(&line) {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(e) => warn!("skipping malformed acknowledgement: {e}"),
            }
        }
        Ok(ids)
    }
}

impl RecomputeOutbox for JsonlOutboxWriter {
    fn enqueue(&self, task: &RecomputeTask) -> Result<()> {
        let today = Utc::now().date_naive();

        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::Outbox("outbox writer mutex poisoned".to_string()))?;

        let needs_rotation = guard.as_ref().is_none_or(|s| s.current_date != today);

        if needs_rotation {
            let new_writer = Self::open_for_date(&self.dir, today)?;
            *guard = Some(WriterState {
                current_date: today,
                writer: new_writer,
            });
        }

        if let Some(state) = guard.as_mut() {
            let line = serde_json::to_string(task)
                .map_err(|e| AppError::Outbox(format!("failed to serialize task: {e}")))?;
            if let Err(e) = writeln!(state.writer, "{line}") {
                warn!("failed to write recompute task: {e}");
                return Err(AppError::Outbox(format!("outbox write failed: {e}")));
            }
            if let Err(e) = state.writer.flush() {
                warn!("failed to flush outbox: {e}");
                return Err(AppError::Outbox(format!("outbox flush failed: {e}")));
            }
        }

        Ok(())
    }

    fn read_unacknowledged(&self) -> Result<Vec<RecomputeTask>> {
        let acked = self.acknowledged_ids()?;
        let mut tasks = Vec::new();
        for path in self.task_files()? {
            for line in Self::read_lines(&path)? {
                match serde_json::from_str::<RecomputeTask>(&line) {
                    Ok(task) if !acked.contains(&task.id) => tasks.push(task),
                    Ok(_) => {}
                    Err(e) => warn!(file = %path.display(), "skipping malformed task: {e}"),
                }
            }
        }
        Ok(tasks)
    }

    fn acknowledge(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let _guard = self
            .state
            .lock()
            .map_err(|_| AppError::Outbox("outbox writer mutex poisoned".to_string()))?;

        let mut writer = BufWriter::new(Self::open_append(&self.dir.join(ACK_FILE))?);
        for id in ids {
            let line = serde_json::to_string(id)?;
            writeln!(writer, "{line}")
                .map_err(|e| AppError::Outbox(format!("ack write failed: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| AppError::Outbox(format!("ack flush failed: {e}")))?;
        Ok(())
    }

    fn compact(&self) -> Result<usize> {
        let _guard = self
            .state
            .lock()
            .map_err(|_| AppError::Outbox("outbox writer mutex poisoned".to_string()))?;

        let acked = self.acknowledged_ids()?;
        let today_file = self
            .dir
            .join(format!("{TASK_PREFIX}{}.jsonl", Utc::now().date_naive()));
        let mut removed = 0;
        let mut still_listed: HashSet<String> = HashSet::new();

        for path in self.task_files()? {
            let (ids, malformed) = Self::task_ids(&path)?;
            if malformed {
                warn!(file = %path.display(), "keeping task file with malformed lines");
            }
            // Today's file may still be appended to by a running writer.
            let done = !malformed && path != today_file && ids.iter().all(|id| acked.contains(id));
            if done {
                fs::remove_file(&path).map_err(|e| {
                    AppError::Outbox(format!("failed to remove {}: {e}", path.display()))
                })?;
                removed += ids.len();
            } else {
                still_listed.extend(ids);
            }
        }

        let mut kept: Vec<&String> = acked.iter().filter(|id| still_listed.contains(*id)).collect();
        kept.sort();
        self.rewrite_acknowledged(&kept)?;

        info!(removed, acknowledged_kept = kept.len(), "recompute outbox compacted");
        Ok(removed)
    }
}
