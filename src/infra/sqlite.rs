use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::OnceCell;

use crate::domain::ticket::{Priority, Ticket, TicketStatus, TicketTriageUpdate};
use crate::domain::user::{Role, User};
use crate::error::{AppError, AppResult};
use crate::services::{DeliveryLedger, TicketStore, UserDirectory};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',   -- 'user', 'moderator', 'admin'
        skills TEXT NOT NULL DEFAULT '[]',   -- JSON array
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tickets (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'TODO',
        priority TEXT NOT NULL DEFAULT 'medium',
        related_skills TEXT NOT NULL DEFAULT '[]',  -- JSON array
        assigned_to TEXT REFERENCES users(id),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS notification_deliveries (
        key TEXT PRIMARY KEY,
        ticket_id TEXT NOT NULL,
        recipient TEXT NOT NULL,
        sent_at TEXT NOT NULL
    );
";

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Shared database handle. The connection is opened and migrated on first
/// use and reused for the life of the handle.
pub struct Database {
    location: Location,
    conn: OnceCell<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Self {
        Self {
            location: Location::File(path),
            conn: OnceCell::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    async fn connection(&self) -> AppResult<&Mutex<Connection>> {
        self.conn
            .get_or_try_init(|| async { self.connect().map(Mutex::new) })
            .await
    }

    fn connect(&self) -> AppResult<Connection> {
        let conn = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)
            }
            Location::Memory => Connection::open_in_memory(),
        }
        .map_err(|err| {
            tracing::error!("database connection failed: {err}");
            AppError::Storage(format!("failed to open database: {err}"))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        match &self.location {
            Location::File(path) => tracing::info!("connected to database {}", path.display()),
            Location::Memory => tracing::debug!("connected to in-memory database"),
        }
        Ok(conn)
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T> + Send,
        T: Send,
    {
        let cell = self.connection().await?;
        let conn = cell
            .lock()
            .map_err(|_| AppError::Storage("database lock poisoned".to_string()))?;
        f(&*conn)
    }

    #[cfg(test)]
    pub async fn insert_user(&self, user: &User) -> AppResult<()> {
        let skills = encode_list(&user.skills)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, role, skills, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user.id, user.email, user.role.as_str(), skills, now()],
            )?;
            Ok(())
        })
        .await
    }

    #[cfg(test)]
    pub async fn insert_ticket(&self, id: &str, title: &str, description: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            let created = now();
            conn.execute(
                "INSERT INTO tickets (id, title, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, title, description, created],
            )?;
            Ok(())
        })
        .await
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn encode_list(values: &[String]) -> AppResult<String> {
    serde_json::to_string(values)
        .map_err(|err| AppError::Storage(format!("failed to encode list: {err}")))
}

fn decode_list(raw: &str) -> AppResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|err| AppError::Storage(format!("invalid list column '{raw}': {err}")))
}

fn ensure_updated(changed: usize, id: &str) -> AppResult<()> {
    if changed == 0 {
        return Err(AppError::TicketNotFound(id.to_string()));
    }
    Ok(())
}

struct TicketRow {
    id: String,
    title: String,
    description: String,
    status: String,
    priority: String,
    related_skills: String,
    assigned_to: Option<String>,
}

impl TicketRow {
    fn into_ticket(self) -> AppResult<Ticket> {
        let status = TicketStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Storage(format!("ticket {} has unknown status '{}'", self.id, self.status))
        })?;
        let priority = Priority::from_str(&self.priority).ok_or_else(|| {
            AppError::Storage(format!(
                "ticket {} has unknown priority '{}'",
                self.id, self.priority
            ))
        })?;
        Ok(Ticket {
            related_skills: decode_list(&self.related_skills)?,
            id: self.id,
            title: self.title,
            description: self.description,
            status,
            priority,
            assigned_to: self.assigned_to,
        })
    }
}

#[async_trait]
impl TicketStore for Database {
    async fn find_ticket(&self, id: &str) -> AppResult<Option<Ticket>> {
        let row = self
            .with_conn(|conn| {
                let row = conn
                    .query_row(
                        "SELECT id, title, description, status, priority, related_skills, assigned_to
                         FROM tickets WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(TicketRow {
                                id: row.get(0)?,
                                title: row.get(1)?,
                                description: row.get(2)?,
                                status: row.get(3)?,
                                priority: row.get(4)?,
                                related_skills: row.get(5)?,
                                assigned_to: row.get(6)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(TicketRow::into_ticket).transpose()
    }

    async fn set_status(&self, id: &str, status: TicketStatus) -> AppResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tickets SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, status.as_str(), now()],
            )?;
            ensure_updated(changed, id)
        })
        .await
    }

    async fn apply_triage(&self, id: &str, update: &TicketTriageUpdate) -> AppResult<()> {
        let skills = encode_list(&update.related_skills)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tickets
                 SET priority = ?2, description = COALESCE(?3, description), related_skills = ?4, status = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    update.priority.as_str(),
                    update.description,
                    skills,
                    TicketStatus::InProgress.as_str(),
                    now(),
                ],
            )?;
            ensure_updated(changed, id)
        })
        .await
    }

    async fn assign(&self, id: &str, user_id: Option<&str>) -> AppResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tickets SET assigned_to = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, user_id, now()],
            )?;
            ensure_updated(changed, id)
        })
        .await
    }
}

#[async_trait]
impl UserDirectory for Database {
    async fn users_with_role(&self, role: Role) -> AppResult<Vec<User>> {
        let rows = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, email, skills FROM users WHERE role = ?1 ORDER BY rowid",
                )?;
                let rows = stmt
                    .query_map(params![role.as_str()], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, email, skills)| -> AppResult<User> {
                Ok(User {
                    skills: decode_list(&skills)?,
                    id,
                    email,
                    role,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryLedger for Database {
    async fn was_delivered(&self, key: &str) -> AppResult<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM notification_deliveries WHERE key = ?1",
                    params![key],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn record_delivery(&self, key: &str, ticket_id: &str, recipient: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO notification_deliveries (key, ticket_id, recipient, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, ticket_id, recipient, now()],
            )?;
            Ok(())
        })
        .await
    }
}
