//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `vault` and `activity` tables.
//! Every mutating call runs in its own transaction on one table.
//! Activity order comes from the implicit `rowid`, which an upsert keeps,
//! so replacing a record never moves it in the history.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use bidvault_core::error::{Error, Result};
use bidvault_core::models::{ActivityRecord, QaPair, VaultDocument};
use bidvault_core::store::Store;

use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait.
///
/// Construct once at process start with [`SqliteStore::open`] and share it
/// (as `Arc<dyn Store>`) with every component that needs persistence.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `db_path` and bring the schema up to date.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{:#}", e)))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Translate a driver error into the store taxonomy.
pub(crate) fn map_sqlx(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            Error::StoreUnavailable(e.to_string())
        }
        other => Error::StoreIo(other.to_string()),
    }
}

fn decode_err(column: &str, detail: impl std::fmt::Display) -> Error {
    Error::StoreIo(format!("invalid value in column {}: {}", column, detail))
}

fn row_to_vault(row: &SqliteRow) -> Result<VaultDocument> {
    let category: String = row.get("category");
    let status: String = row.get("status");
    let kind: String = row.get("kind");
    Ok(VaultDocument {
        id: row.get("id"),
        name: row.get("name"),
        content: row.get("content"),
        category: category.parse().map_err(|e| decode_err("category", e))?,
        size: row.get("size"),
        date: row.get("date"),
        status: status.parse().map_err(|e| decode_err("status", e))?,
        kind: kind.parse().map_err(|e| decode_err("kind", e))?,
    })
}

fn row_to_activity(row: &SqliteRow) -> Result<ActivityRecord> {
    let status: String = row.get("status");
    let kind: String = row.get("kind");
    let results_json: Option<String> = row.get("results_json");
    let results = match results_json {
        Some(json) => Some(
            serde_json::from_str::<Vec<QaPair>>(&json)
                .map_err(|e| decode_err("results_json", e))?,
        ),
        None => None,
    };
    Ok(ActivityRecord {
        id: row.get("id"),
        name: row.get("name"),
        kind: kind.parse().map_err(|e| decode_err("kind", e))?,
        size: row.get("size"),
        date: row.get("date"),
        created_ts: row.get("created_ts"),
        status: status.parse().map_err(|e| decode_err("status", e))?,
        results,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_vault(&self, doc: &VaultDocument) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query(
            r#"
            INSERT INTO vault (id, name, content, category, size, date, status, kind)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                content = excluded.content,
                category = excluded.category,
                size = excluded.size,
                date = excluded.date,
                status = excluded.status,
                kind = excluded.kind
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.name)
        .bind(&doc.content)
        .bind(doc.category.as_str())
        .bind(&doc.size)
        .bind(&doc.date)
        .bind(doc.status.as_str())
        .bind(doc.kind.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        tracing::debug!(id = %doc.id, name = %doc.name, "vault put");
        Ok(())
    }

    async fn all_vault(&self) -> Result<Vec<VaultDocument>> {
        let rows = sqlx::query(
            "SELECT id, name, content, category, size, date, status, kind FROM vault ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let docs = rows.iter().map(row_to_vault).collect::<Result<Vec<_>>>()?;
        tracing::debug!(count = docs.len(), "vault fetched");
        Ok(docs)
    }

    async fn delete_vault(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("DELETE FROM vault WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        tracing::debug!(id, "vault delete");
        Ok(())
    }

    async fn clear_vault(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("DELETE FROM vault")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        tracing::debug!("vault cleared");
        Ok(())
    }

    async fn put_activity(&self, record: &ActivityRecord) -> Result<()> {
        let results_json = match &record.results {
            Some(results) => Some(
                serde_json::to_string(results).map_err(|e| Error::StoreIo(e.to_string()))?,
            ),
            None => None,
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query(
            r#"
            INSERT INTO activity (id, name, kind, size, date, created_ts, status, results_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                size = excluded.size,
                date = excluded.date,
                created_ts = excluded.created_ts,
                status = excluded.status,
                results_json = excluded.results_json
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.kind.as_str())
        .bind(&record.size)
        .bind(&record.date)
        .bind(record.created_ts)
        .bind(record.status.as_str())
        .bind(&results_json)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        tracing::debug!(id = %record.id, name = %record.name, "activity put");
        Ok(())
    }

    async fn all_activity(&self) -> Result<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, kind, size, date, created_ts, status, results_json FROM activity ORDER BY rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let records = rows
            .iter()
            .map(row_to_activity)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(count = records.len(), "activity fetched");
        Ok(records)
    }

    async fn delete_activity(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("DELETE FROM activity WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        tracing::debug!(id, "activity delete");
        Ok(())
    }

    async fn clear_activity(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        sqlx::query("DELETE FROM activity")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        tracing::debug!("activity cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidvault_core::models::{Category, FileDescriptor, FileKind};
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("data/bidvault.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    fn record(name: &str) -> ActivityRecord {
        let file = FileDescriptor {
            name: name.to_string(),
            size_bytes: 4096,
            kind: FileKind::Docx,
        };
        ActivityRecord::completed(&file, vec![QaPair::new("Q", "A")])
    }

    #[tokio::test]
    async fn vault_round_trips_through_sqlite() {
        let (_tmp, store) = open_temp().await;
        let doc = VaultDocument::new(
            "policy.txt",
            "All data must be encrypted at rest.".into(),
            Category::Policy,
            35,
            FileKind::Txt,
        );
        store.put_vault(&doc).await.unwrap();
        store.put_vault(&doc).await.unwrap();

        let all = store.all_vault().await.unwrap();
        assert_eq!(all, vec![doc]);
    }

    #[tokio::test]
    async fn activity_comes_back_most_recent_first() {
        let (_tmp, store) = open_temp().await;
        let (r1, r2, r3) = (record("r1.docx"), record("r2.docx"), record("r3.docx"));
        for r in [&r1, &r2, &r3] {
            store.put_activity(r).await.unwrap();
        }
        let ids: Vec<String> = store
            .all_activity()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![r3.id.clone(), r2.id.clone(), r1.id.clone()]);

        // Replacing keeps position.
        store.put_activity(&r1).await.unwrap();
        let first = store.all_activity().await.unwrap().remove(0);
        assert_eq!(first.id, r3.id);
    }

    #[tokio::test]
    async fn results_survive_serialization_in_order() {
        let (_tmp, store) = open_temp().await;
        let file = FileDescriptor {
            name: "t.pdf".into(),
            size_bytes: 1,
            kind: FileKind::Pdf,
        };
        let pairs = vec![QaPair::new("first?", "one"), QaPair::new("second?", "two")];
        let rec = ActivityRecord::completed(&file, pairs.clone());
        store.put_activity(&rec).await.unwrap();
        let back = store.all_activity().await.unwrap().remove(0);
        assert_eq!(back.results, Some(pairs));
    }

    #[tokio::test]
    async fn clear_leaves_empty_collections() {
        let (_tmp, store) = open_temp().await;
        store.put_activity(&record("x.docx")).await.unwrap();
        store
            .put_vault(&VaultDocument::new(
                "a.txt",
                "a".into(),
                Category::PastBid,
                1,
                FileKind::Txt,
            ))
            .await
            .unwrap();
        store.clear_vault().await.unwrap();
        store.clear_activity().await.unwrap();
        assert!(store.all_vault().await.unwrap().is_empty());
        assert!(store.all_activity().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_pool_is_store_unavailable() {
        let (_tmp, store) = open_temp().await;
        store.close().await;
        let err = store.all_vault().await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
