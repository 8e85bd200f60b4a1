//! Storage seam for missions and targets.
//!
//! [`TransactionManager`] opens a unit of work; the returned [`MissionTx`]
//! carries the repository primitives and must end in `commit` or `rollback`.
//! Dropping an unfinished transaction rolls it back, so a cancelled request
//! never leaves a partial write behind.
//!
//! Primitives report raw storage conditions ([`StorageError`]). Turning those
//! into domain errors is the engine's job.

use std::future::Future;

use chrono::{DateTime, Utc};
use spycat_core::mission::{AgentId, Completion, MissionId, NewTarget, Target, TargetId};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// Storage-level outcome of a failed primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A lookup found nothing, or an update affected zero rows
    #[error("no rows matched")]
    NoRows,
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A mission row without its targets.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionRecord {
    pub id: MissionId,
    pub cat_id: Option<AgentId>,
    pub notes: String,
    pub completed: Completion,
    pub created_at: DateTime<Utc>,
}

pub trait TransactionManager: Send + Sync {
    type Tx: MissionTx;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StorageError>> + Send;
}

/// Repository primitives scoped to one open transaction.
///
/// Statements run in the order they are issued. Updates that match no row
/// return [`StorageError::NoRows`].
pub trait MissionTx: Send {
    fn insert_mission(
        &mut self,
        cat_id: Option<AgentId>,
        notes: &str,
        completed: Completion,
    ) -> impl Future<Output = Result<MissionId, StorageError>> + Send;

    fn insert_target(
        &mut self,
        mission_id: MissionId,
        target: &NewTarget,
    ) -> impl Future<Output = Result<TargetId, StorageError>> + Send;

    fn mission_by_id(
        &mut self,
        id: MissionId,
    ) -> impl Future<Output = Result<MissionRecord, StorageError>> + Send;

    fn target_by_id(
        &mut self,
        id: TargetId,
    ) -> impl Future<Output = Result<Target, StorageError>> + Send;

    fn list_missions(&mut self) -> impl Future<Output = Result<Vec<MissionRecord>, StorageError>> + Send;

    fn list_targets(&mut self) -> impl Future<Output = Result<Vec<Target>, StorageError>> + Send;

    fn assign_agent(
        &mut self,
        mission_id: MissionId,
        agent_id: AgentId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Sets `completed = true`. Never clears it.
    fn complete_mission(
        &mut self,
        id: MissionId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn complete_target(
        &mut self,
        id: TargetId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Points the target at `mission_id` in a single conditional statement that
    /// only matches while the mission exists and is not completed.
    ///
    /// `NoRows` means the mission is missing or completed, or the target is missing.
    fn move_target_to_open_mission(
        &mut self,
        target_id: TargetId,
        mission_id: MissionId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StorageError>> + Send
    where
        Self: Sized;

    fn rollback(self) -> impl Future<Output = Result<(), StorageError>> + Send
    where
        Self: Sized;
}

/// Existence checks for cats, which are owned by another part of the system.
pub trait AgentLookup: Send + Sync {
    fn agent_exists(&self, id: AgentId) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// Liveness check behind `GET /health`.
pub trait StoreHealth: Send + Sync {
    fn ping(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Everything the HTTP layer needs from a backend.
pub trait MissionStore: TransactionManager + AgentLookup + StoreHealth + Clone + 'static {}

impl<T> MissionStore for T where T: TransactionManager + AgentLookup + StoreHealth + Clone + 'static {}
