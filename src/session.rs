//! Bearer-token sessions for the admin, partner and merchant surfaces.
//!
//! A `Session` is created on login and invalidated on logout or on any `401`
//! from the backend. `SessionStore` keeps tokens in a small SQLite database so
//! the CLI stays logged in between invocations.
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::fmt;
use tracing::{info, instrument};

pub type Pool = SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Admin,
    Partner,
    Merchant,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Admin => "admin",
            SessionKind::Partner => "partner",
            SessionKind::Merchant => "merchant",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit login state for one surface.
#[derive(Clone)]
pub struct Session {
    kind: SessionKind,
    token: Option<String>,
    store: Option<SessionStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind)
            .field("logged_in", &self.token.is_some())
            .finish()
    }
}

impl Session {
    /// An in-memory session that starts logged out.
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            token: None,
            store: None,
        }
    }

    /// A session backed by `store`, restoring a previously saved token.
    pub async fn restore(kind: SessionKind, store: SessionStore) -> Result<Self> {
        let token = store.load(kind).await?;
        Ok(Self {
            kind,
            token,
            store: Some(store),
        })
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn login(&mut self, token: String) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(self.kind, &token).await?;
        }
        info!(kind=%self.kind, "session started");
        self.token = Some(token);
        Ok(())
    }

    /// Drop the token in memory and in the store. Used for logout and `401`.
    pub async fn invalidate(&mut self) -> Result<()> {
        self.token = None;
        if let Some(store) = &self.store {
            store.clear(self.kind).await?;
        }
        info!(kind=%self.kind, "session ended");
        Ok(())
    }
}

/// SQLite-backed token store.
#[derive(Clone, Debug)]
pub struct SessionStore {
    pool: Pool,
}

impl SessionStore {
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    #[instrument(skip_all)]
    pub async fn save(&self, kind: SessionKind, token: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (kind, token, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(kind) DO UPDATE SET token = excluded.token, created_at = excluded.created_at",
        )
        .bind(kind.as_str())
        .bind(token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self, kind: SessionKind) -> Result<Option<String>> {
        let token = sqlx::query_scalar::<_, String>("SELECT token FROM sessions WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }

    pub async fn created_at(&self, kind: SessionKind) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT created_at FROM sessions WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(r.try_get::<DateTime<Utc>, _>("created_at")?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all)]
    pub async fn clear(&self, kind: SessionKind) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = store_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow!("session store migration failed: {}", e))?;
    Ok(())
}

/// File-backed store URLs get `mode=rwc` so SQLite creates the file.
/// The data directory itself comes from `Config::ensure_dirs`.
fn store_url(url: &str) -> String {
    if url.starts_with("sqlite::memory") || url.contains("mode=") {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}mode=rwc", url, sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_get_create_mode() {
        assert_eq!(store_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            store_url("sqlite://./data/sessions.db"),
            "sqlite://./data/sessions.db?mode=rwc"
        );
        assert_eq!(
            store_url("sqlite://./data/sessions.db?cache=shared"),
            "sqlite://./data/sessions.db?cache=shared&mode=rwc"
        );
        assert_eq!(
            store_url("sqlite://s.db?mode=ro"),
            "sqlite://s.db?mode=ro"
        );
    }

    #[tokio::test]
    async fn opens_file_store_inside_data_dir() {
        let td = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/sessions.db", td.path().display());
        let store = SessionStore::open(&url).await.unwrap();
        store.save(SessionKind::Merchant, "m-1").await.unwrap();
        assert!(td.path().join("sessions.db").exists());
    }

    #[tokio::test]
    async fn store_round_trips_tokens_per_kind() {
        let store = SessionStore::open("sqlite::memory:").await.unwrap();
        store.save(SessionKind::Admin, "a-1").await.unwrap();
        store.save(SessionKind::Partner, "p-1").await.unwrap();
        store.save(SessionKind::Admin, "a-2").await.unwrap();
        assert_eq!(
            store.load(SessionKind::Admin).await.unwrap().as_deref(),
            Some("a-2")
        );
        assert!(store.created_at(SessionKind::Admin).await.unwrap().is_some());
        store.clear(SessionKind::Admin).await.unwrap();
        assert_eq!(store.load(SessionKind::Admin).await.unwrap(), None);
        assert_eq!(
            store.load(SessionKind::Partner).await.unwrap().as_deref(),
            Some("p-1")
        );
    }

    #[tokio::test]
    async fn session_lifecycle_persists_and_invalidates() {
        let store = SessionStore::open("sqlite::memory:").await.unwrap();
        let mut session = Session::restore(SessionKind::Admin, store.clone())
            .await
            .unwrap();
        assert!(!session.is_active());
        session.login("tok".into()).await.unwrap();
        assert_eq!(session.token(), Some("tok"));

        let restored = Session::restore(SessionKind::Admin, store.clone())
            .await
            .unwrap();
        assert!(restored.is_active());

        session.invalidate().await.unwrap();
        assert!(!session.is_active());
        assert_eq!(store.load(SessionKind::Admin).await.unwrap(), None);
    }
}
