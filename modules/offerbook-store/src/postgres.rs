//! PgRecordStore — canonical records as JSONB documents in Postgres.
//!
//! One row per record: store-assigned UUID, the full document, and a
//! version counter. Every overwrite goes through `update_versioned`, a
//! compare-and-swap on that counter; a blind overwrite path does not exist.

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use offerbook_common::{OfferbookError, PlacementRecord};

use crate::store::{InsertOutcome, RecordStore, StoredRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS placement_records (
    id          UUID PRIMARY KEY,
    company     TEXT NOT NULL,
    doc         JSONB NOT NULL,
    version     BIGINT NOT NULL DEFAULT 1,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS placement_records_company ON placement_records (company);

CREATE TABLE IF NOT EXISTS offer_fingerprints (
    fingerprint TEXT PRIMARY KEY,
    seen_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables if missing. Safe to run on every startup.
    pub async fn ensure_schema(&self) -> Result<(), OfferbookError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for PgRecordStore {
    async fn ping(&self) -> Result<(), OfferbookError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| OfferbookError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn find_by_company(&self, company: &str) -> Result<Vec<StoredRecord>, OfferbookError> {
        let rows = sqlx::query_as::<_, (Uuid, i64, serde_json::Value)>(
            r#"
            SELECT id, version, doc
            FROM placement_records
            WHERE company = $1
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .bind(company)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(to_stored).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredRecord>, OfferbookError> {
        let row = sqlx::query_as::<_, (Uuid, i64, serde_json::Value)>(
            r#"
            SELECT id, version, doc
            FROM placement_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(to_stored).transpose()
    }

    async fn insert(&self, record: &PlacementRecord) -> Result<StoredRecord, OfferbookError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO placement_records (id, company, doc, version, created_at, updated_at)
            VALUES ($1, $2, $3, 1, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&record.company)
        .bind(to_doc(record)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(%id, company = %record.company, "Inserted placement record");
        Ok(StoredRecord {
            id,
            version: 1,
            record: record.clone(),
        })
    }

    async fn update_versioned(
        &self,
        id: Uuid,
        expected_version: i64,
        record: &PlacementRecord,
    ) -> Result<bool, OfferbookError> {
        let result = sqlx::query(
            r#"
            UPDATE placement_records
            SET doc = $3, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(to_doc(record)?)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn all_records(&self) -> Result<Vec<StoredRecord>, OfferbookError> {
        let rows = sqlx::query_as::<_, (Uuid, i64, serde_json::Value)>(
            r#"
            SELECT id, version, doc
            FROM placement_records
            ORDER BY company ASC, updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(to_stored).collect()
    }

    async fn fingerprint_seen(&self, fingerprint: &str) -> Result<bool, OfferbookError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT count(*) FROM offer_fingerprints WHERE fingerprint = $1",
        )
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.0 > 0)
    }

    async fn record_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<InsertOutcome, OfferbookError> {
        let result = sqlx::query(
            r#"
            INSERT INTO offer_fingerprints (fingerprint)
            VALUES ($1)
            ON CONFLICT (fingerprint) DO NOTHING
            "#,
        )
        .bind(fingerprint)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 1 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }
}

fn to_doc(record: &PlacementRecord) -> Result<serde_json::Value, OfferbookError> {
    serde_json::to_value(record).map_err(|e| OfferbookError::Store(e.to_string()))
}

fn to_stored((id, version, doc): (Uuid, i64, serde_json::Value)) -> Result<StoredRecord, OfferbookError> {
    let record: PlacementRecord =
        serde_json::from_value(doc).map_err(|e| OfferbookError::Store(e.to_string()))?;
    Ok(StoredRecord {
        id,
        version,
        record,
    })
}

fn store_err(e: sqlx::Error) -> OfferbookError {
    match e {
        e @ (sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => {
            OfferbookError::StoreUnavailable(e.to_string())
        }
        other => OfferbookError::Store(other.to_string()),
    }
}
