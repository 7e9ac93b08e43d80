use crate::models::StoredCase;
use futures_util::stream::Stream;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;

pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<Snapshot, StorageError>> + Send + 'static>>;

/// One full listing of a collection.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Number of changes the collection had seen when it was read.
    pub version: u64,
    pub records: Vec<StoredCase>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

pub struct Storage {
    pool: SqlitePool,
    changes: Mutex<HashMap<String, Arc<watch::Sender<u64>>>>,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            changes: Mutex::new(HashMap::new()),
        }
    }

    fn changes(&self, collection: &str) -> Arc<watch::Sender<u64>> {
        let mut changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            changes
                .entry(collection.to_string())
                .or_insert_with(|| Arc::new(watch::channel(0).0)),
        )
    }

    fn bump(&self, collection: &str) {
        self.changes(collection).send_modify(|version| *version += 1);
    }

    pub async fn create(&self, collection: &str, case: StoredCase) -> Result<String, StorageError> {
        sqlx::query(
            "INSERT INTO cases (collection, id, name, issue, treatment, routine, improvement, result, created_at, date_str, stored_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&case.id)
        .bind(&case.name)
        .bind(&case.issue)
        .bind(&case.treatment)
        .bind(&case.routine)
        .bind(case.improvement)
        .bind(&case.result)
        .bind(case.created_at)
        .bind(&case.date_str)
        .bind(case.stored_at)
        .execute(&self.pool)
        .await?;

        self.bump(collection);
        Ok(case.id)
    }

    /// Returns whether a document was removed. Missing ids are not an error.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM cases WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.bump(collection);
        }
        Ok(removed)
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<StoredCase>, StorageError> {
        list_cases(&self.pool, collection).await
    }

    /// Yields the whole collection now and after every change to it.
    ///
    /// Changes that land while a listing is being read are coalesced into
    /// the next listing.
    pub fn subscribe(&self, collection: &str) -> SnapshotStream {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let mut changes = self.changes(&collection).subscribe();

        Box::pin(async_stream::stream! {
            loop {
                let version = *changes.borrow_and_update();
                match list_cases(&pool, &collection).await {
                    Ok(records) => yield Ok(Snapshot { version, records }),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

async fn list_cases(pool: &SqlitePool, collection: &str) -> Result<Vec<StoredCase>, StorageError> {
    let rows = sqlx::query(
        "SELECT id, name, issue, treatment, routine, improvement, result, created_at, date_str, stored_at
         FROM cases WHERE collection = ? ORDER BY ordinal",
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;

    rows.iter().map(case_from_row).collect()
}

fn case_from_row(row: &SqliteRow) -> Result<StoredCase, StorageError> {
    Ok(StoredCase {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        issue: row.try_get("issue")?,
        treatment: row.try_get("treatment")?,
        routine: row.try_get("routine")?,
        improvement: row.try_get("improvement")?,
        result: row.try_get("result")?,
        created_at: row.try_get("created_at")?,
        date_str: row.try_get("date_str")?,
        stored_at: row.try_get("stored_at")?,
    })
}
