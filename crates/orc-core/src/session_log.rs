// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use orc_model::Message;

/// Scalar session metadata, persisted as the last-wins entry of its kind
/// in the journal (spec §6: "the last `session-metadata` entry wins").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub current_round: u64,
    /// `None` means unbounded.
    pub remaining_rounds: Option<u64>,
    pub work_dir: PathBuf,
    pub config: Value,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum JournalLine {
    InstructorMessage { timestamp: DateTime<Utc>, message: Message },
    SessionMetadata {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        metadata: SessionMetadata,
    },
}

/// Append-only per-session journal. Writes are incremental: only messages
/// not yet written since the last append call go to disk. Files are
/// created with owner-only permissions.
pub struct SessionLog {
    path: PathBuf,
    file: File,
    persisted_messages: usize,
}

impl SessionLog {
    /// Create (or open-for-append, if resuming) the journal file for
    /// `session_id` under `session_dir`, creating the directory with
    /// 0o700 permissions if it does not already exist.
    pub fn open(session_dir: &Path, session_id: &str) -> anyhow::Result<Self> {
        create_dir_0700(session_dir)?;
        let path = session_dir.join(format!("session-{session_id}.jsonl"));
        let existed = path.exists();
        let file = open_append_0600(&path)?;
        let persisted_messages = if existed { count_instructor_messages(&path)? } else { 0 };
        Ok(Self { path, file, persisted_messages })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append only the Instructor messages beyond what was already
    /// persisted (tracked by `persisted_messages`).
    pub fn append_instructor_messages(&mut self, all_messages: &[Message]) -> anyhow::Result<()> {
        for message in &all_messages[self.persisted_messages..] {
            let line = JournalLine::InstructorMessage {
                timestamp: Utc::now(),
                message: message.clone(),
            };
            writeln!(self.file, "{}", serde_json::to_string(&line)?)?;
        }
        self.persisted_messages = all_messages.len();
        self.file.flush()?;
        Ok(())
    }

    /// Reset the incremental-append counter after an in-memory history
    /// rewrite (compaction). The journal stays append-only: the next
    /// `append_instructor_messages` call writes the now-shorter history as
    /// new entries rather than trying to slice from a position past the
    /// rewritten vector's end.
    pub fn mark_compacted(&mut self) {
        self.persisted_messages = 0;
    }

    pub fn append_metadata(&mut self, metadata: &SessionMetadata) -> anyhow::Result<()> {
        let line = JournalLine::SessionMetadata { timestamp: Utc::now(), metadata: metadata.clone() };
        writeln!(self.file, "{}", serde_json::to_string(&line)?)?;
        self.file.flush()?;
        Ok(())
    }

    /// Replay the journal at `path`, reconstructing the Instructor history
    /// in order and the last-metadata-wins scalar state.
    pub fn replay(path: &Path) -> anyhow::Result<(Vec<Message>, Option<SessionMetadata>)> {
        let file = File::open(path).with_context(|| format!("opening session log {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut messages = Vec::new();
        let mut metadata = None;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalLine>(&line)? {
                JournalLine::InstructorMessage { message, .. } => messages.push(message),
                JournalLine::SessionMetadata { metadata: m, .. } => metadata = Some(m),
            }
        }
        Ok((messages, metadata))
    }
}

fn count_instructor_messages(path: &Path) -> anyhow::Result<usize> {
    let (messages, _) = SessionLog::replay(path)?;
    Ok(messages.len())
}

/// Write the id of the most recently saved session so `--continue`/
/// `--resume` (with no id) can find it without scanning the directory.
pub fn write_current_pointer(session_dir: &Path, session_id: &str, work_dir: &Path) -> anyhow::Result<()> {
    create_dir_0700(session_dir)?;
    let path = session_dir.join("current.json");
    let body = serde_json::json!({"session_id": session_id, "work_dir": work_dir});
    let mut file = open_truncate_0600(&path)?;
    file.write_all(serde_json::to_string_pretty(&body)?.as_bytes())?;
    Ok(())
}

pub fn read_current_pointer(session_dir: &Path) -> anyhow::Result<Option<(String, PathBuf)>> {
    let path = session_dir.join("current.json");
    if !path.exists() {
        return Ok(None);
    }
    let body: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let session_id = body.get("session_id").and_then(|v| v.as_str()).map(str::to_string);
    let work_dir = body.get("work_dir").and_then(|v| v.as_str()).map(PathBuf::from);
    Ok(session_id.zip(work_dir))
}

#[cfg(unix)]
fn create_dir_0700(dir: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(dir)?;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn create_dir_0700(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(unix)]
fn open_append_0600(path: &Path) -> anyhow::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(OpenOptions::new().create(true).append(true).mode(0o600).open(path)?)
}

#[cfg(not(unix))]
fn open_append_0600(path: &Path) -> anyhow::Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(unix)]
fn open_truncate_0600(path: &Path) -> anyhow::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?)
}

#[cfg(not(unix))]
fn open_truncate_0600(path: &Path) -> anyhow::Result<File> {
    Ok(OpenOptions::new().write(true).create(true).truncate(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(session_id: &str, round: u64, remaining: Option<u64>) -> SessionMetadata {
        SessionMetadata {
            session_id: session_id.to_string(),
            created_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            last_updated_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            current_round: round,
            remaining_rounds: remaining,
            work_dir: PathBuf::from("/tmp/work"),
            config: serde_json::json!({}),
        }
    }

    #[test]
    fn append_and_replay_round_trips_messages_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::open(dir.path(), "abc").unwrap();

        let messages = vec![Message::user("hi"), Message::assistant("Tell worker: go")];
        log.append_instructor_messages(&messages).unwrap();
        log.append_metadata(&meta("abc", 4, Some(6))).unwrap();

        let (replayed_messages, replayed_meta) = SessionLog::replay(log.path()).unwrap();
        assert_eq!(replayed_messages.len(), 2);
        let m = replayed_meta.unwrap();
        assert_eq!(m.current_round, 4);
        assert_eq!(m.remaining_rounds, Some(6));
    }

    #[test]
    fn append_is_incremental_not_duplicating_already_persisted_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::open(dir.path(), "inc").unwrap();

        let mut messages = vec![Message::user("one")];
        log.append_instructor_messages(&messages).unwrap();
        messages.push(Message::user("two"));
        log.append_instructor_messages(&messages).unwrap();

        let (replayed, _) = SessionLog::replay(log.path()).unwrap();
        assert_eq!(replayed.len(), 2);
    }

    #[test]
    fn last_metadata_entry_wins_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::open(dir.path(), "meta").unwrap();
        log.append_metadata(&meta("meta", 1, Some(10))).unwrap();
        log.append_metadata(&meta("meta", 3, Some(8))).unwrap();

        let (_, replayed_meta) = SessionLog::replay(log.path()).unwrap();
        assert_eq!(replayed_meta.unwrap().current_round, 3);
    }

    #[cfg(unix)]
    #[test]
    fn session_file_has_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::open(dir.path(), "perm").unwrap();
        let mode = std::fs::metadata(log.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn current_pointer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write_current_pointer(dir.path(), "latest-id", Path::new("/tmp/proj")).unwrap();
        let (id, work_dir) = read_current_pointer(dir.path()).unwrap().unwrap();
        assert_eq!(id, "latest-id");
        assert_eq!(work_dir, PathBuf::from("/tmp/proj"));
    }
}
