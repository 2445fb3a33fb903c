//! Append-only JSONL journal writer.
//!
//! Single-writer discipline: every append goes through one mutex-guarded
//! file handle and is written as one complete line (single `write_all` +
//! flush), so the process image never produces a torn line. On open, the
//! sequence counter recovers from the existing file; a torn trailing line
//! left by a crash is truncated before the first new append.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;

use delta_domain::journal::{EventPayload, JournalEvent};
use delta_domain::{Error, Result};

#[derive(Debug)]
struct JournalInner {
    file: File,
    next_seq: u64,
}

#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    inner: Mutex<JournalInner>,
}

impl JournalWriter {
    /// Open (or create) the journal at `path`, recovering the sequence
    /// counter and repairing a torn tail if present.
    pub fn open(path: &Path) -> Result<Self> {
        let recovered = recover(path)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(JournalInner {
                file,
                next_seq: recovered + 1,
            }),
        })
    }

    /// Append one event, assigning the next sequence number and stamping
    /// the current time. Returns the assigned `seq`.
    pub fn append(&self, payload: EventPayload) -> Result<u64> {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        let event = JournalEvent {
            seq,
            timestamp: Utc::now(),
            payload,
        };
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        inner
            .file
            .write_all(line.as_bytes())
            .and_then(|()| inner.file.flush())
            .map_err(|e| Error::Journal(format!("append failed at seq {seq}: {e}")))?;

        inner.next_seq = seq + 1;
        Ok(seq)
    }

    /// Sequence number of the last appended event (0 if empty).
    pub fn last_seq(&self) -> u64 {
        self.inner.lock().next_seq - 1
    }

    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.flush()?;
        inner.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every well-formed event from a journal file.
pub fn read_events(path: &Path) -> Result<Vec<JournalEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: JournalEvent = serde_json::from_str(line).map_err(|e| {
            Error::Journal(format!(
                "malformed journal line {} in {}: {e}",
                idx + 1,
                path.display()
            ))
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Scan the existing journal, truncating a torn (unparseable, unterminated)
/// trailing line. Returns the maximum `seq` found (0 for a fresh journal).
fn recover(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;
    if raw.is_empty() {
        return Ok(0);
    }

    // Valid prefix = every LF-terminated line that parses. Anything after
    // the last good line is a torn write from a crash.
    let mut valid_len: usize = 0;
    let mut max_seq: u64 = 0;
    let mut offset = 0;
    for segment in raw.split_inclusive('\n') {
        let complete = segment.ends_with('\n');
        let parsed = serde_json::from_str::<JournalEvent>(segment.trim_end());
        match (complete, parsed) {
            (true, Ok(event)) => {
                if event.seq <= max_seq {
                    return Err(Error::Journal(format!(
                        "non-monotonic seq {} in {}",
                        event.seq,
                        path.display()
                    )));
                }
                max_seq = event.seq;
                offset += segment.len();
                valid_len = offset;
            }
            _ => break,
        }
    }

    if valid_len < raw.len() {
        tracing::warn!(
            path = %path.display(),
            truncated_bytes = raw.len() - valid_len,
            "truncating torn journal tail"
        );
        file.set_len(valid_len as u64)?;
        file.seek(SeekFrom::End(0))?;
    }

    Ok(max_seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_domain::journal::SystemLevel;

    fn system_message(content: &str) -> EventPayload {
        EventPayload::SystemMessage {
            level: SystemLevel::Info,
            content: content.into(),
        }
    }

    #[test]
    fn seq_starts_at_one_and_increments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let writer = JournalWriter::open(&path).unwrap();

        assert_eq!(writer.append(system_message("a")).unwrap(), 1);
        assert_eq!(writer.append(system_message("b")).unwrap(), 2);
        assert_eq!(writer.last_seq(), 2);
    }

    #[test]
    fn reopen_resumes_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        {
            let writer = JournalWriter::open(&path).unwrap();
            writer.append(system_message("a")).unwrap();
            writer.append(system_message("b")).unwrap();
        }
        let writer = JournalWriter::open(&path).unwrap();
        assert_eq!(writer.append(system_message("c")).unwrap(), 3);

        let events = read_events(&path).unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        {
            let writer = JournalWriter::open(&path).unwrap();
            writer.append(system_message("a")).unwrap();
        }
        // Simulate a crash mid-append.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"{\"seq\":2,\"timest").unwrap();
        }

        let writer = JournalWriter::open(&path).unwrap();
        assert_eq!(writer.append(system_message("b")).unwrap(), 2);

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].seq, 2);
    }

    #[test]
    fn unterminated_but_parseable_tail_is_discarded() {
        // A line without the trailing LF is still a torn write, even if
        // the JSON itself happens to be complete.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        {
            let writer = JournalWriter::open(&path).unwrap();
            writer.append(system_message("a")).unwrap();
        }
        let full_line = {
            let raw = std::fs::read_to_string(&path).unwrap();
            raw.lines().next().unwrap().replace("\"seq\":1", "\"seq\":2")
        };
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(full_line.as_bytes()).unwrap(); // no '\n'
        }

        let writer = JournalWriter::open(&path).unwrap();
        assert_eq!(writer.last_seq(), 1);
        writer.append(system_message("b")).unwrap();
        assert_eq!(read_events(&path).unwrap().len(), 2);
    }

    #[test]
    fn read_events_empty_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let events = read_events(&dir.path().join("nope.jsonl")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn concurrent_appends_never_tear_lines() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let writer = Arc::new(JournalWriter::open(&path).unwrap());

        let mut handles = Vec::new();
        for t in 0..4 {
            let w = writer.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    w.append(system_message(&format!("t{t}-{i}"))).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 100);
        for (i, ev) in events.iter().enumerate() {
            assert_eq!(ev.seq, i as u64 + 1);
        }
    }
}
