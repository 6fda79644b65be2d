//! Append-only JSONL journal and daily file log.
//!
//! The [`Journal`] records structured events (plans, tool output, LLM
//! calls, errors) as one JSON line per event, in one file per UTC day
//! under `blob/`. The [`FileLog`] is the same mechanism for operational
//! log lines under `logs/`. Appends never rewrite existing content.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vigil_types::Result;

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub timestamp: String,
    pub event_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Append-only event journal, one JSONL file per UTC day.
pub struct Journal {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl Journal {
    /// Create the journal under `data_dir/blob/`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("blob");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Append one event.
    pub fn store(&self, event_type: &str, content: &str, metadata: Map<String, Value>) -> Result<()> {
        let record = JournalRecord {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            content: content.to_string(),
            metadata,
        };
        self.append_line(&serde_json::to_string(&record)?)
    }

    /// Most recent records across day files, newest first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<JournalRecord>> {
        self.read_filtered(None, limit)
    }

    /// Most recent records matching `event_type`, newest first.
    pub fn read_filtered(
        &self,
        event_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JournalRecord>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();
        files.reverse();

        let mut records = Vec::new();
        for file in files {
            if records.len() >= limit {
                break;
            }
            let raw = std::fs::read_to_string(&file)?;
            for line in raw.lines().rev() {
                if records.len() >= limit {
                    break;
                }
                let Ok(record) = serde_json::from_str::<JournalRecord>(line) else {
                    continue;
                };
                if let Some(wanted) = event_type {
                    if record.event_type != wanted {
                        continue;
                    }
                }
                records.push(record);
            }
        }
        Ok(records)
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let path = self.dir.join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Daily operational log under `logs/`, same JSONL-per-day layout as the
/// journal but keyed by event name with free-form fields.
pub struct FileLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLog {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("logs");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Append one log line: `{timestamp, event, ...fields}`.
    pub fn log(&self, event: &str, fields: Map<String, Value>) -> Result<()> {
        let mut line = Map::new();
        line.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        line.insert("event".into(), Value::String(event.to_string()));
        line.extend(fields);

        let path = self.dir.join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", Value::Object(line))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn store_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal
            .store("plan", "the plan", meta(&[("iteration", json!(1))]))
            .unwrap();
        journal.store("tool_output", "ran a tool", Map::new()).unwrap();

        let records = journal.read_recent(10).unwrap();
        assert_eq!(records.len(), 2);
        // Newest first.
        assert_eq!(records[0].event_type, "tool_output");
        assert_eq!(records[1].event_type, "plan");
        assert_eq!(records[1].metadata["iteration"], 1);
    }

    #[test]
    fn filtered_read_skips_other_events() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        for i in 0..3 {
            journal
                .store("plan", &format!("plan {i}"), Map::new())
                .unwrap();
            journal
                .store("error", &format!("error {i}"), Map::new())
                .unwrap();
        }
        let errors = journal.read_filtered(Some("error"), 10).unwrap();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|r| r.event_type == "error"));
    }

    #[test]
    fn read_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        for i in 0..20 {
            journal.store("plan", &format!("p{i}"), Map::new()).unwrap();
        }
        assert_eq!(journal.read_recent(5).unwrap().len(), 5);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.store("plan", "good", Map::new()).unwrap();
        // Corrupt the file by hand.
        let day_file = dir
            .path()
            .join("blob")
            .join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));
        let mut f = OpenOptions::new().append(true).open(day_file).unwrap();
        writeln!(f, "this is not json").unwrap();

        let records = journal.read_recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "good");
    }

    #[test]
    fn empty_journal_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        assert!(journal.read_recent(10).unwrap().is_empty());
    }

    #[test]
    fn file_log_writes_event_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileLog::open(dir.path()).unwrap();
        log.log(
            "iteration_complete",
            meta(&[("iteration", json!(3)), ("actions", json!(2))]),
        )
        .unwrap();

        let day_file = dir
            .path()
            .join("logs")
            .join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));
        let raw = std::fs::read_to_string(day_file).unwrap();
        let line: Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(line["event"], "iteration_complete");
        assert_eq!(line["iteration"], 3);
        assert!(line["timestamp"].is_string());
    }
}
