//! Per-session append-only progress log
//!
//! Observers consume a session's log either by polling (`since`) or by
//! subscription (`subscribe`). Entry ids are assigned here and strictly
//! increase within a session, which makes polling idempotent: repeating a
//! call with an unchanged last-seen id returns nothing. All synchronization
//! is internal; the pipeline writes and any number of observers read without
//! caller-side locking.

use shared::{LogEntry, LogLevel, SessionId, Stage};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Buffered push entries per subscriber before lag kicks in
const SUBSCRIBER_BUFFER: usize = 256;

/// Log state for one session
struct SessionLog {
    entries: Vec<LogEntry>,
    next_id: u64,
    sender: broadcast::Sender<LogEntry>,
}

impl SessionLog {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        SessionLog {
            entries: Vec::new(),
            next_id: 1,
            sender,
        }
    }
}

/// Append-only, monotonically-id'd event log for all sessions
pub struct LogStream {
    sessions: RwLock<HashMap<SessionId, SessionLog>>,
}

impl LogStream {
    pub fn new() -> Self {
        LogStream {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append an entry to a session's log
    ///
    /// Assigns the next id for the session and pushes the entry to any
    /// live subscribers. Returns the stored entry.
    pub async fn append(
        &self,
        session_id: &SessionId,
        stage: Stage,
        level: LogLevel,
        message: impl Into<String>,
    ) -> LogEntry {
        self.append_with(session_id, stage, level, message, None, None).await
    }

    /// Append an entry carrying a measured duration and/or metadata
    pub async fn append_with(
        &self,
        session_id: &SessionId,
        stage: Stage,
        level: LogLevel,
        message: impl Into<String>,
        duration_ms: Option<u64>,
        metadata: Option<serde_json::Value>,
    ) -> LogEntry {
        let mut sessions = self.sessions.write().await;
        let log = sessions
            .entry(session_id.clone())
            .or_insert_with(SessionLog::new);

        let entry = LogEntry {
            id: log.next_id,
            session_id: session_id.clone(),
            stage,
            level,
            message: message.into(),
            timestamp: chrono::Utc::now(),
            duration_ms,
            metadata,
        };
        log.next_id += 1;
        log.entries.push(entry.clone());

        // No receivers is fine; polling observers read the buffer instead
        let _ = log.sender.send(entry.clone());

        entry
    }

    /// Return all entries with id greater than `last_seen_id`, in order
    ///
    /// Unknown sessions and unchanged ids both yield an empty vec.
    pub async fn since(&self, session_id: &SessionId, last_seen_id: u64) -> Vec<LogEntry> {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(log) => log
                .entries
                .iter()
                .filter(|e| e.id > last_seen_id)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Subscribe to a session's log for push consumption
    ///
    /// Subscribing before the first append is valid; the session's log is
    /// created on demand. Entries appended before the subscription are not
    /// replayed; catch up with `since` first.
    pub async fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<LogEntry> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.clone())
            .or_insert_with(SessionLog::new)
            .sender
            .subscribe()
    }

    /// Number of entries recorded for a session
    pub async fn entry_count(&self, session_id: &SessionId) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(|l| l.entries.len()).unwrap_or(0)
    }

    /// Drop a session's log once its observers are done with it
    ///
    /// Callers invoke this after the session reaches a terminal state;
    /// the engine never releases logs on its own.
    pub async fn release(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
    }
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::from_string("log-test")
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let stream = LogStream::new();
        let id = session();

        for i in 0..5 {
            stream
                .append(&id, Stage::Init, LogLevel::Info, format!("entry {i}"))
                .await;
        }

        let entries = stream.since(&id, 0).await;
        assert_eq!(entries.len(), 5);
        for pair in entries.windows(2) {
            assert!(pair[1].id > pair[0].id);
        }
    }

    #[tokio::test]
    async fn test_since_never_returns_seen_ids() {
        let stream = LogStream::new();
        let id = session();

        stream.append(&id, Stage::Init, LogLevel::Info, "first").await;
        stream.append(&id, Stage::ConfigLoad, LogLevel::Info, "second").await;
        stream.append(&id, Stage::PromptBuild, LogLevel::Info, "third").await;

        let tail = stream.since(&id, 2).await;
        assert_eq!(tail.len(), 1);
        assert!(tail.iter().all(|e| e.id > 2));
    }

    #[tokio::test]
    async fn test_since_is_idempotent() {
        let stream = LogStream::new();
        let id = session();

        stream.append(&id, Stage::Init, LogLevel::Info, "only").await;
        let first = stream.since(&id, 0).await;
        let last_id = first.last().unwrap().id;

        // Repeating with the same last-seen id returns nothing
        assert!(stream.since(&id, last_id).await.is_empty());
        assert!(stream.since(&id, last_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let stream = LogStream::new();
        assert!(stream.since(&SessionId::from_string("nobody"), 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_receives_appends() {
        let stream = LogStream::new();
        let id = session();

        let mut rx = stream.subscribe(&id).await;
        stream.append(&id, Stage::ApiCall, LogLevel::Info, "calling").await;

        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.id, 1);
        assert_eq!(pushed.stage, Stage::ApiCall);
        assert_eq!(pushed.message, "calling");
    }

    #[tokio::test]
    async fn test_ids_are_scoped_per_session() {
        let stream = LogStream::new();
        let a = SessionId::from_string("a");
        let b = SessionId::from_string("b");

        stream.append(&a, Stage::Init, LogLevel::Info, "a1").await;
        stream.append(&a, Stage::Init, LogLevel::Info, "a2").await;
        let b1 = stream.append(&b, Stage::Init, LogLevel::Info, "b1").await;

        // Session b starts over at 1 regardless of a's progress
        assert_eq!(b1.id, 1);
    }

    #[tokio::test]
    async fn test_release_drops_the_log() {
        let stream = LogStream::new();
        let id = session();

        stream.append(&id, Stage::Complete, LogLevel::Success, "done").await;
        assert_eq!(stream.entry_count(&id).await, 1);

        stream.release(&id).await;
        assert_eq!(stream.entry_count(&id).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_readers_during_writes() {
        use std::sync::Arc;

        let stream = Arc::new(LogStream::new());
        let id = session();

        let writer = {
            let stream = stream.clone();
            let id = id.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    stream
                        .append(&id, Stage::Scoring, LogLevel::Debug, format!("w{i}"))
                        .await;
                }
            })
        };

        let reader = {
            let stream = stream.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let mut last_seen = 0;
                let mut total = 0;
                while total < 50 {
                    let batch = stream.since(&id, last_seen).await;
                    for entry in &batch {
                        assert!(entry.id > last_seen);
                        last_seen = entry.id;
                    }
                    total += batch.len();
                    tokio::task::yield_now().await;
                }
                total
            })
        };

        writer.await.unwrap();
        assert_eq!(reader.await.unwrap(), 50);
    }
}
