use crate::config::Config;
use crate::error::StoreError;
use crate::store::{
    CREATED_AT, Document, DocumentStore, Fields, OrderBy, generate_id, server_timestamp, union_into, validate_field,
};
use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_documents.sql", include_str!("migrations/001_documents.sql")),
    ("002_collection_name_index.sql", include_str!("migrations/002_collection_name_index.sql")),
];

/// Document store backed by a single libsql `documents` table, either a
/// local file or a Turso embedded replica.
pub struct Database {
    db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<()>,
    turso_url: Option<String>,
    turso_auth_token: Option<String>,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_replica(turso_url: &Option<String>, turso_auth_token: &Option<String>) -> bool {
        turso_url.is_some() && turso_auth_token.is_some()
    }

    pub async fn sync(&self) -> Result<()> {
        if Self::is_replica(&self.turso_url, &self.turso_auth_token) {
            self.db
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("sync failed: {}", e))?;
        }
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(cfg.app.get_db());
        let turso_url = cfg.app.turso_url.clone();
        let turso_auth_token = cfg.app.turso_auth_token.clone();

        let db = match (&turso_url, &turso_auth_token) {
            (Some(url), Some(token)) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(cfg.app.sync_interval_seconds);
                Builder::new_synced_database(&path, url.clone(), token.clone())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
            _ => {
                tracing::info!(path = ?path, "[db] running in local database mode");
                Builder::new_local(&path).build().await?
            }
        };

        Self::open(db, turso_url, turso_auth_token).await
    }

    /// Throwaway database, used by tests.
    pub async fn in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::open(db, None, None).await
    }

    async fn open(db: LibsqlDatabase, turso_url: Option<String>, turso_auth_token: Option<String>) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            db,
            conn,
            tx_lock: Mutex::new(()),
            turso_url,
            turso_auth_token,
        })
    }

    fn parse_fields(collection: &str, id: &str, data: &str) -> Result<Fields, StoreError> {
        match serde_json::from_str::<Value>(data)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(StoreError::Malformed {
                collection: collection.to_string(),
                id: id.to_string(),
                reason: "document body is not an object".to_string(),
            }),
        }
    }

    fn row_to_document(collection: &str, row: &libsql::Row) -> Result<Document, StoreError> {
        let id: String = row.get(0)?;
        let data: String = row.get(1)?;
        let fields = Self::parse_fields(collection, &id, &data)?;
        Ok(Document { id, fields })
    }

    async fn union_merge_internal(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: &[String],
    ) -> Result<(), StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT data FROM documents WHERE collection = ? AND id = ?",
                libsql::params![collection, id],
            )
            .await?;

        let data: String = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
        };

        let mut fields = Self::parse_fields(collection, id, &data)?;
        if !union_into(&mut fields, field, values)? {
            tracing::debug!(collection, id, field, "union merge left document unchanged");
            return Ok(());
        }

        let data = serde_json::to_string(&fields)?;
        self.conn
            .execute(
                "UPDATE documents SET data = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE collection = ? AND id = ?",
                libsql::params![data, collection, id],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn create_document(&self, collection: &str, mut fields: Fields) -> Result<String, StoreError> {
        let id = generate_id(collection);
        let created_at = server_timestamp();
        fields.insert(CREATED_AT.to_string(), Value::String(created_at.clone()));
        let data = serde_json::to_string(&fields)?;

        let _guard = self.tx_lock.lock().await;
        self.conn
            .execute(
                "INSERT INTO documents (collection, id, data, created_at) VALUES (?, ?, ?, ?)",
                libsql::params![collection, id.as_str(), data, created_at],
            )
            .await?;

        Ok(id)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, data FROM documents WHERE collection = ? AND id = ?",
                libsql::params![collection, id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_document(collection, &row)?)),
            None => Ok(None),
        }
    }

    async fn list_documents(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>, StoreError> {
        let mut rows = match order {
            Some(order) => {
                validate_field(&order.field)?;
                let path = format!("$.{}", order.field);
                let query = format!(
                    r#"
SELECT id, data
FROM documents
WHERE collection = ? AND json_type(data, ?) IS NOT NULL
ORDER BY json_extract(data, ?) {}, rowid ASC
"#,
                    order.direction.as_sql()
                );
                self.conn
                    .query(&query, libsql::params![collection, path.as_str(), path.as_str()])
                    .await?
            }
            None => {
                self.conn
                    .query(
                        "SELECT id, data FROM documents WHERE collection = ? ORDER BY rowid ASC",
                        libsql::params![collection],
                    )
                    .await?
            }
        };

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(Self::row_to_document(collection, &row)?);
        }
        Ok(documents)
    }

    async fn union_merge(&self, collection: &str, id: &str, field: &str, values: &[String]) -> Result<(), StoreError> {
        validate_field(field)?;
        let _guard = self.tx_lock.lock().await;

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let result = self.union_merge_internal(collection, id, field, values).await;

        match result {
            Ok(_) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let _guard = self.tx_lock.lock().await;
        let removed = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                libsql::params![collection, id],
            )
            .await?;
        Ok(removed > 0)
    }
}
