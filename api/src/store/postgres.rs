//! Postgres backend built on a shared `sqlx::PgPool`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use spycat_core::mission::{AgentId, Completion, MissionId, NewTarget, Target, TargetId};

use super::{
    AgentLookup, StoreHealth, MissionRecord, MissionTx, StorageError, TransactionManager,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NoRows,
            sqlx::Error::Database(ref db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => StorageError::UniqueViolation { constraint },
                    Some(FOREIGN_KEY_VIOLATION) => StorageError::ForeignKeyViolation { constraint },
                    _ => StorageError::Backend(err.to_string()),
                }
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TransactionManager for PgStore {
    type Tx = PgMissionTx;

    async fn begin(&self) -> Result<PgMissionTx, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(PgMissionTx { tx })
    }
}

impl AgentLookup for PgStore {
    async fn agent_exists(&self, id: AgentId) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cats WHERE id = $1)")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// Open Postgres transaction. sqlx rolls it back when dropped unfinished.
pub struct PgMissionTx {
    tx: Transaction<'static, Postgres>,
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct MissionRow {
    id: i64,
    cat_id: Option<i64>,
    notes: String,
    completed: bool,
    created_at: DateTime<Utc>,
}

impl MissionRow {
    fn into_record(self) -> MissionRecord {
        MissionRecord {
            id: MissionId(self.id),
            cat_id: self.cat_id.map(AgentId),
            notes: self.notes,
            completed: Completion::from_stored(self.completed),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TargetRow {
    id: i64,
    mission_id: i64,
    name: String,
    country: String,
    notes: String,
    completed: bool,
    created_at: DateTime<Utc>,
}

impl TargetRow {
    fn into_target(self) -> Target {
        Target {
            id: TargetId(self.id),
            mission_id: MissionId(self.mission_id),
            name: self.name,
            country: self.country,
            notes: self.notes,
            completed: Completion::from_stored(self.completed),
            created_at: self.created_at,
        }
    }
}

fn expect_rows(rows_affected: u64) -> Result<(), StorageError> {
    if rows_affected == 0 {
        return Err(StorageError::NoRows);
    }
    Ok(())
}

impl MissionTx for PgMissionTx {
    async fn insert_mission(
        &mut self,
        cat_id: Option<AgentId>,
        notes: &str,
        completed: Completion,
    ) -> Result<MissionId, StorageError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO missions (cat_id, notes, completed) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(cat_id.map(|c| c.0))
        .bind(notes)
        .bind(completed.is_completed())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(MissionId(id))
    }

    async fn insert_target(
        &mut self,
        mission_id: MissionId,
        target: &NewTarget,
    ) -> Result<TargetId, StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO targets (mission_id, name, country, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(mission_id.0)
        .bind(&target.name)
        .bind(&target.country)
        .bind(&target.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(TargetId(id))
    }

    async fn mission_by_id(&mut self, id: MissionId) -> Result<MissionRecord, StorageError> {
        let row = sqlx::query_as::<_, MissionRow>(
            "SELECT id, cat_id, notes, completed, created_at FROM missions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(MissionRow::into_record).ok_or(StorageError::NoRows)
    }

    async fn target_by_id(&mut self, id: TargetId) -> Result<Target, StorageError> {
        let row = sqlx::query_as::<_, TargetRow>(
            r#"
            SELECT id, mission_id, name, country, notes, completed, created_at
            FROM targets
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(TargetRow::into_target).ok_or(StorageError::NoRows)
    }

    async fn list_missions(&mut self) -> Result<Vec<MissionRecord>, StorageError> {
        let rows = sqlx::query_as::<_, MissionRow>(
            r#"
            SELECT id, cat_id, notes, completed, created_at
            FROM missions
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(MissionRow::into_record).collect())
    }

    async fn list_targets(&mut self) -> Result<Vec<Target>, StorageError> {
        let rows = sqlx::query_as::<_, TargetRow>(
            r#"
            SELECT id, mission_id, name, country, notes, completed, created_at
            FROM targets
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(TargetRow::into_target).collect())
    }

    async fn assign_agent(
        &mut self,
        mission_id: MissionId,
        agent_id: AgentId,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE missions SET cat_id = $1 WHERE id = $2")
            .bind(agent_id.0)
            .bind(mission_id.0)
            .execute(&mut *self.tx)
            .await?;
        expect_rows(result.rows_affected())
    }

    async fn complete_mission(&mut self, id: MissionId) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE missions SET completed = true WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;
        expect_rows(result.rows_affected())
    }

    async fn complete_target(&mut self, id: TargetId) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE targets SET completed = true WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;
        expect_rows(result.rows_affected())
    }

    async fn move_target_to_open_mission(
        &mut self,
        target_id: TargetId,
        mission_id: MissionId,
    ) -> Result<(), StorageError> {
        // FOR SHARE holds the destination row until commit, so a concurrent
        // `SET completed = true` waits for us instead of racing past the check.
        let result = sqlx::query(
            r#"
            WITH destination AS (
                SELECT id FROM missions
                WHERE id = $1 AND completed = false
                FOR SHARE
            )
            UPDATE targets
            SET mission_id = destination.id
            FROM destination
            WHERE targets.id = $2
            "#,
        )
        .bind(mission_id.0)
        .bind(target_id.0)
        .execute(&mut *self.tx)
        .await?;
        expect_rows(result.rows_affected())
    }

    async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
