//! Consent, recent questions and the anonymized audit log

use super::json_file::JsonFile;
use crate::config::SessionConfig;
use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static LONG_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w{5,}\b").unwrap());

/// Replace every word of five or more characters with `[REDACTED]`
///
/// Crude, but strips most names, places and specifics from what is kept.
pub fn anonymize(text: &str) -> String {
    LONG_WORD_RE.replace_all(text, "[REDACTED]").into_owned()
}

/// On-disk shape of the session memory file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,

    #[serde(default)]
    pub audit_logs: Vec<AuditEntry>,
}

/// Per-session state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub user_consent: bool,

    /// Most recent last
    #[serde(default)]
    pub previous_questions: Vec<QuestionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub q: String,
    pub t: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub session: String,
    pub anon_query: String,
    pub response_level: u8,
}

/// Session memory backed by one JSON file
#[derive(Debug)]
pub struct SessionStore {
    file: JsonFile,
    history_limit: usize,
    audit_limit: usize,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, config: &SessionConfig) -> Self {
        Self {
            file: JsonFile::new(path),
            history_limit: config.history_limit,
            audit_limit: config.audit_limit,
        }
    }

    async fn record(&self, session: &str) -> SessionRecord {
        let mut doc: SessionFile = self.file.read().await;
        doc.sessions.remove(session).unwrap_or_default()
    }

    /// Whether this session agreed to have its questions remembered
    pub async fn has_consent(&self, session: &str) -> bool {
        self.record(session).await.user_consent
    }

    pub async fn set_consent(&self, session: &str, consent: bool) -> Result<()> {
        self.file
            .update(|doc: &mut SessionFile| {
                let record = doc.sessions.entry(session.to_string()).or_default();
                record.user_consent = consent;
                if !consent {
                    record.previous_questions.clear();
                }
            })
            .await
    }

    /// Remember a question for a consenting session; returns false otherwise
    pub async fn remember_question(&self, session: &str, question: &str) -> Result<bool> {
        let limit = self.history_limit;
        self.file
            .update(|doc: &mut SessionFile| {
                let Some(record) = doc.sessions.get_mut(session) else {
                    return false;
                };
                if !record.user_consent {
                    return false;
                }
                record.previous_questions.push(QuestionEntry {
                    q: question.to_string(),
                    t: Utc::now(),
                });
                let excess = record.previous_questions.len().saturating_sub(limit);
                record.previous_questions.drain(..excess);
                true
            })
            .await
    }

    /// Context line about the last remembered question, empty without consent
    pub async fn recall_context(&self, session: &str) -> String {
        let record = self.record(session).await;
        if !record.user_consent {
            return String::new();
        }
        match record.previous_questions.last() {
            Some(prev) => format!("Earlier you asked: '{}'", prev.q),
            None => String::new(),
        }
    }

    /// Append an anonymized audit entry, keeping only the newest ones
    pub async fn log_interaction(&self, session: &str, message: &str, level: u8) -> Result<()> {
        let limit = self.audit_limit;
        let entry = AuditEntry {
            timestamp: Utc::now(),
            session: session.to_string(),
            anon_query: anonymize(message),
            response_level: level,
        };
        self.file
            .update(|doc: &mut SessionFile| {
                doc.audit_logs.push(entry);
                let excess = doc.audit_logs.len().saturating_sub(limit);
                doc.audit_logs.drain(..excess);
            })
            .await
    }

    /// Full document, for inspection in tests
    #[cfg(test)]
    pub async fn snapshot(&self) -> SessionFile {
        self.file.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(
            dir.path().join("session_memory.json"),
            &SessionConfig::default(),
        )
    }

    #[test]
    fn test_anonymize() {
        assert_eq!(
            anonymize("I am John Smith from Chennai with chest pain"),
            "I am John [REDACTED] from [REDACTED] with [REDACTED] pain"
        );
        assert_eq!(anonymize("BP 140/90"), "BP 140/90");
    }

    #[tokio::test]
    async fn test_no_memory_without_consent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(!store.has_consent("default").await);
        assert!(!store.remember_question("default", "palpitations?").await.unwrap());
        assert_eq!(store.recall_context("default").await, "");
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.set_consent("default", true).await.unwrap();

        for i in 0..8 {
            assert!(
                store
                    .remember_question("default", &format!("question {}", i))
                    .await
                    .unwrap()
            );
        }

        let snapshot = store.snapshot().await;
        let history = &snapshot.sessions["default"].previous_questions;
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].q, "question 3");
        assert_eq!(
            store.recall_context("default").await,
            "Earlier you asked: 'question 7'"
        );
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.set_consent("alice", true).await.unwrap();
        store.remember_question("alice", "statins?").await.unwrap();

        assert_eq!(store.recall_context("bob").await, "");
        assert!(!store.has_consent("bob").await);
    }

    #[tokio::test]
    async fn test_withdrawing_consent_forgets() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.set_consent("default", true).await.unwrap();
        store.remember_question("default", "cholesterol").await.unwrap();
        store.set_consent("default", false).await.unwrap();

        let snapshot = store.snapshot().await;
        assert!(snapshot.sessions["default"].previous_questions.is_empty());
    }

    #[tokio::test]
    async fn test_audit_log_bounded_and_anonymized() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(
            dir.path().join("session_memory.json"),
            &SessionConfig {
                audit_limit: 3,
                ..Default::default()
            },
        );

        for level in [3u8, 2, 1, 3] {
            store
                .log_interaction("default", "Severe crushing chest pain", level)
                .await
                .unwrap();
        }

        let logs = store.snapshot().await.audit_logs;
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].response_level, 2);
        assert_eq!(logs[2].anon_query, "[REDACTED] [REDACTED] [REDACTED] pain");
    }
}
