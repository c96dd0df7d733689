use crate::error::ServiceError;
use crate::pipeline::updater::BulkUpdateService;
use crate::pipeline::validator::IdentifierValidationService;
use async_trait::async_trait;
use common::model::mass_update::{UpdateOutcome, UpdateRequest, ValidationResponse};
use log::debug;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS epos_records (
    id TEXT PRIMARY KEY,
    updated_fields TEXT,
    update_count INTEGER NOT NULL DEFAULT 0,
    last_updated_at TEXT
)";

/// A row of `epos_records`.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EposRecord {
    pub id: String,
    pub updated_fields: Option<String>,
    pub update_count: i64,
    pub last_updated_at: Option<String>,
}

/// EPOS records kept in a SQLite file.
///
/// Every call opens its own connection on the blocking thread pool, the same
/// way the rest of the backend reaches its database.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
}

impl SqliteRecordStore {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, rusqlite::Error> {
        let store = Self { path: path.into() };
        store.connect()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        connect(&self.path)
    }

    /// Inserts the given ids, ignoring ones already present. Returns how many
    /// rows were added.
    pub fn insert_records(&self, ids: &[String]) -> Result<usize, rusqlite::Error> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO epos_records (id) VALUES (?1)")?;
            for id in ids {
                inserted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    #[cfg(test)]
    pub fn record(&self, id: &str) -> Result<Option<EposRecord>, rusqlite::Error> {
        use rusqlite::OptionalExtension;

        self.connect()?
            .query_row(
                "SELECT id, updated_fields, update_count, last_updated_at FROM epos_records WHERE id = ?1",
                params![id],
                |row| {
                    Ok(EposRecord {
                        id: row.get(0)?,
                        updated_fields: row.get(1)?,
                        update_count: row.get(2)?,
                        last_updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
    }
}

fn connect(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn validate_blocking(path: &Path, ids: &[String]) -> Result<ValidationResponse, ServiceError> {
    let conn = connect(path)?;
    let mut stmt =
        conn.prepare("SELECT EXISTS(SELECT 1 FROM epos_records WHERE id = ?1)")?;

    let mut response = ValidationResponse::default();
    for id in ids {
        let exists: bool = stmt.query_row(params![id], |row| row.get(0))?;
        if exists {
            response.valid_ids.push(id.clone());
        } else {
            response.invalid_ids.push(id.clone());
        }
    }
    debug!(
        "Validated {} ids: {} valid, {} invalid",
        ids.len(),
        response.valid_ids.len(),
        response.invalid_ids.len()
    );
    Ok(response)
}

fn update_blocking(path: &Path, request: &UpdateRequest) -> Result<UpdateOutcome, ServiceError> {
    let mut conn = connect(path)?;
    let fields = request.options.join(",");

    let tx = conn.transaction()?;
    let mut updated = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE epos_records
             SET updated_fields = ?1,
                 update_count = update_count + 1,
                 last_updated_at = datetime('now')
             WHERE id = ?2",
        )?;
        let mut seen = HashSet::new();
        for id in &request.ids {
            if seen.insert(id.as_str()) {
                updated += stmt.execute(params![fields, id])?;
            }
        }
    }
    tx.commit()?;
    Ok(UpdateOutcome { updated })
}

#[async_trait]
impl IdentifierValidationService for SqliteRecordStore {
    async fn validate_ids(&self, ids: &[String]) -> Result<ValidationResponse, ServiceError> {
        let path = self.path.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || validate_blocking(&path, &ids)).await?
    }
}

#[async_trait]
impl BulkUpdateService for SqliteRecordStore {
    async fn update_records(&self, request: &UpdateRequest) -> Result<UpdateOutcome, ServiceError> {
        let path = self.path.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || update_blocking(&path, &request)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn seeded_store(ids: &[&str]) -> (SqliteRecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite")).unwrap();
        store.insert_records(&strings(ids)).unwrap();
        (store, dir)
    }

    #[test]
    fn insert_ignores_existing_ids() {
        let (store, _dir) = seeded_store(&["A001", "A002"]);
        assert_eq!(store.insert_records(&strings(&["A002", "A003"])).unwrap(), 1);
    }

    #[actix_web::test]
    async fn validation_keeps_order_and_duplicates() {
        let (store, _dir) = seeded_store(&["A001", "A002"]);

        let response = store
            .validate_ids(&strings(&["A003", "A001", "A002", "A001", "a001"]))
            .await
            .unwrap();

        assert_eq!(response.valid_ids, strings(&["A001", "A002", "A001"]));
        assert_eq!(response.invalid_ids, strings(&["A003", "a001"]));
    }

    #[actix_web::test]
    async fn update_touches_each_requested_record_once() {
        let (store, _dir) = seeded_store(&["A001", "A002", "A003"]);
        let request = UpdateRequest {
            ids: strings(&["A001", "A002", "A001"]),
            options: strings(&["price", "status"]),
        };

        let outcome = store.update_records(&request).await.unwrap();

        assert_eq!(outcome.updated, 2);
        let a001 = store.record("A001").unwrap().unwrap();
        assert_eq!(a001.update_count, 1);
        assert_eq!(a001.updated_fields.as_deref(), Some("price,status"));
        assert!(a001.last_updated_at.is_some());

        let untouched = store.record("A003").unwrap().unwrap();
        assert_eq!(untouched.update_count, 0);
        assert_eq!(untouched.updated_fields, None);
    }

    #[actix_web::test]
    async fn unknown_ids_are_not_created_by_update() {
        let (store, _dir) = seeded_store(&["A001"]);
        let request = UpdateRequest {
            ids: strings(&["A001", "ZZZ"]),
            options: Vec::new(),
        };

        let outcome = store.update_records(&request).await.unwrap();

        assert_eq!(outcome.updated, 1);
        assert!(store.record("ZZZ").unwrap().is_none());
    }

    #[actix_web::test]
    async fn unreachable_database_is_a_backend_error() {
        let dir = TempDir::new().unwrap();
        let store = SqliteRecordStore {
            path: dir.path().join("missing").join("records.sqlite"),
        };
        let err = store.validate_ids(&strings(&["A001"])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Backend(_)));
    }
}
