use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use mirage_core::ConversationSession;
use parking_lot::RwLock;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Process-wide keyed collection of live sessions. Each entry carries its own
/// async mutex: a handler holds that mutex for the whole turn, so mutation of
/// one session is serialized while distinct session ids proceed in parallel.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `session_id`, creating it when unseen. The
    /// double-checked write lock makes first contact atomic: concurrent
    /// requests for the same new id observe exactly one session object.
    pub fn checkout(&self, session_id: &str) -> (SessionHandle, bool) {
        if let Some(handle) = self.sessions.read().get(session_id) {
            return (handle.clone(), false);
        }

        let mut guard = self.sessions.write();
        if let Some(handle) = guard.get(session_id) {
            return (handle.clone(), false);
        }

        let handle = Arc::new(Mutex::new(ConversationSession::new(session_id)));
        guard.insert(session_id.to_string(), handle.clone());
        (handle, true)
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Evicts sessions whose final report has been delivered. Entries locked
    /// by an in-flight turn are left for a later sweep.
    pub fn purge_reported(&self) -> usize {
        let mut removed = 0_usize;
        self.sessions.write().retain(|_, handle| {
            let keep = match handle.try_lock() {
                Ok(session) => !session.reported,
                Err(_) => true,
            };
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

pub trait ArchiveRepository: Send + Sync {
    async fn archive_session(&self, session: &ConversationSession) -> Result<()>;
    async fn archived_count(&self) -> Result<u64>;
}

#[derive(Clone, Default)]
pub struct MemoryArchive {
    records: Arc<RwLock<HashMap<String, ConversationSession>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<ConversationSession> {
        self.records.read().get(session_id).cloned()
    }
}

impl ArchiveRepository for MemoryArchive {
    async fn archive_session(&self, session: &ConversationSession) -> Result<()> {
        self.records
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn archived_count(&self) -> Result<u64> {
        Ok(self.records.read().len() as u64)
    }
}

#[derive(Clone)]
pub struct SqliteArchive {
    pool: SqlitePool,
}

impl SqliteArchive {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let archive = Self { pool };
        archive.ensure_schema().await?;
        Ok(archive)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS archived_sessions (
              session_id TEXT PRIMARY KEY,
              scam_detected INTEGER NOT NULL,
              scam_confidence REAL NOT NULL,
              message_count INTEGER NOT NULL,
              stage TEXT NOT NULL,
              session_json TEXT NOT NULL,
              archived_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl ArchiveRepository for SqliteArchive {
    async fn archive_session(&self, session: &ConversationSession) -> Result<()> {
        let session_json = serde_json::to_string(session)?;

        sqlx::query(
            r#"
            INSERT INTO archived_sessions
              (session_id, scam_detected, scam_confidence, message_count, stage, session_json, archived_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(session_id) DO UPDATE SET
              scam_detected=excluded.scam_detected,
              scam_confidence=excluded.scam_confidence,
              message_count=excluded.message_count,
              stage=excluded.stage,
              session_json=excluded.session_json,
              archived_at=excluded.archived_at
            "#,
        )
        .bind(&session.id)
        .bind(session.scam_detected)
        .bind(session.scam_confidence)
        .bind(session.message_count() as i64)
        .bind(session.stage.as_code())
        .bind(session_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn archived_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM archived_sessions")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }
}

#[derive(Clone)]
pub enum Archive {
    Memory(MemoryArchive),
    Sqlite(SqliteArchive),
}

impl Archive {
    pub fn memory() -> Self {
        Self::Memory(MemoryArchive::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let archive = SqliteArchive::connect(database_url).await?;
        Ok(Self::Sqlite(archive))
    }
}

impl ArchiveRepository for Archive {
    async fn archive_session(&self, session: &ConversationSession) -> Result<()> {
        match self {
            Archive::Memory(archive) => archive.archive_session(session).await,
            Archive::Sqlite(archive) => archive.archive_session(session).await,
        }
    }

    async fn archived_count(&self) -> Result<u64> {
        match self {
            Archive::Memory(archive) => archive.archived_count().await,
            Archive::Sqlite(archive) => archive.archived_count().await,
        }
    }
}
