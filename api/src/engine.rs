//! Mission consistency engine.
//!
//! Every write opens one transaction, runs its repository primitives through
//! it and ends it exactly once: commit on success, rollback on any error. The
//! engine is the only place where storage conditions become domain errors.
//!
//! Invariants kept here:
//! - a mission is created with at most three targets, together with all of
//!   them or not at all;
//! - a target never lands on a completed mission;
//! - nothing clears a mission's `completed` flag.

use std::collections::HashMap;

use spycat_core::mission::{
    AgentId, Completion, CreateMissionRequest, Mission, MissionId, Target, TargetCapExceeded,
    TargetId,
};

use crate::store::{AgentLookup, MissionRecord, MissionTx, StorageError, TransactionManager};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissionError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("a mission accepts at most {max} targets, got {count}")]
    TooManyTargets { count: usize, max: usize },
    #[error("mission {mission_id} is completed")]
    MissionCompleted { mission_id: MissionId },
    #[error("already exists: {constraint}")]
    AlreadyExists { constraint: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TargetCapExceeded> for MissionError {
    fn from(cap: TargetCapExceeded) -> Self {
        MissionError::TooManyTargets {
            count: cap.count,
            max: cap.max,
        }
    }
}

impl MissionError {
    /// Translate a storage condition. `missing` names the row an update or
    /// lookup expected to find when the store reports no rows.
    fn from_storage(err: StorageError, missing: impl FnOnce() -> String) -> Self {
        match err {
            StorageError::NoRows => MissionError::NotFound { resource: missing() },
            StorageError::UniqueViolation { constraint } => {
                MissionError::AlreadyExists { constraint }
            }
            StorageError::ForeignKeyViolation { constraint } => MissionError::NotFound {
                resource: referenced_entity(&constraint).to_string(),
            },
            StorageError::Backend(message) => MissionError::Internal(message),
        }
    }
}

/// Name of the row a foreign key points at, from the Postgres default
/// constraint name (`<table>_<column>_fkey`).
fn referenced_entity(constraint: &str) -> &'static str {
    if constraint.contains("cat_id") {
        "cat"
    } else if constraint.contains("mission_id") {
        "mission"
    } else {
        "referenced row"
    }
}

fn missing_cat(id: AgentId) -> MissionError {
    MissionError::NotFound {
        resource: format!("cat {id}"),
    }
}

fn mission_resource(id: MissionId) -> impl FnOnce() -> String {
    move || format!("mission {id}")
}

fn target_resource(id: TargetId) -> impl FnOnce() -> String {
    move || format!("target {id}")
}

/// Attach to each mission every target whose `mission_id` points at it.
fn hydrate(records: Vec<MissionRecord>, targets: Vec<Target>) -> Vec<Mission> {
    let mut by_mission: HashMap<MissionId, Vec<Target>> = HashMap::new();
    for target in targets {
        by_mission.entry(target.mission_id).or_default().push(target);
    }

    records
        .into_iter()
        .map(|record| {
            let targets = by_mission.remove(&record.id).unwrap_or_default();
            into_mission(record, targets)
        })
        .collect()
}

fn into_mission(record: MissionRecord, targets: Vec<Target>) -> Mission {
    Mission {
        id: record.id,
        cat_id: record.cat_id,
        notes: record.notes,
        completed: record.completed,
        targets,
        created_at: record.created_at,
    }
}

#[derive(Clone)]
pub struct MissionEngine<S> {
    store: S,
}

impl<S> MissionEngine<S>
where
    S: TransactionManager + AgentLookup,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn begin(&self, operation: &'static str) -> Result<S::Tx, MissionError> {
        self.store.begin().await.map_err(|err| {
            MissionError::Internal(format!("{operation}: failed to open transaction: {err}"))
        })
    }

    /// Create a mission and its initial targets in one transaction.
    ///
    /// More than three targets fail before the store is touched.
    pub async fn create_mission(
        &self,
        req: CreateMissionRequest,
    ) -> Result<MissionId, MissionError> {
        if let Err(cap) = req.ensure_target_cap() {
            tracing::warn!(
                operation = "create_mission",
                targets = cap.count,
                max = cap.max,
                "mission rejected: too many targets"
            );
            return Err(cap.into());
        }

        let mut tx = self.begin("create_mission").await?;
        let outcome = insert_mission_with_targets(&mut tx, &req).await;
        let mission_id = finish(tx, "create_mission", outcome).await?;

        tracing::info!(
            mission_id = %mission_id,
            cat_id = ?req.cat_id,
            targets = req.targets.len(),
            "mission created"
        );
        Ok(mission_id)
    }

    /// All missions, each with its current targets.
    pub async fn list_missions(&self) -> Result<Vec<Mission>, MissionError> {
        let mut tx = self.begin("list_missions").await?;
        let outcome = load_all(&mut tx).await;
        finish(tx, "list_missions", outcome).await
    }

    pub async fn get_mission(&self, id: MissionId) -> Result<Mission, MissionError> {
        let mut tx = self.begin("get_mission").await?;
        let outcome = load_one(&mut tx, id).await;
        finish(tx, "get_mission", outcome).await
    }

    /// Assign a cat to a mission. Targets and completion are left untouched.
    ///
    /// The cat is looked up before the transaction opens; the foreign key on
    /// `missions.cat_id` re-checks it atomically with the update.
    pub async fn assign_mission_to_cat(
        &self,
        cat_id: AgentId,
        mission_id: MissionId,
    ) -> Result<(), MissionError> {
        let exists = self
            .store
            .agent_exists(cat_id)
            .await
            .map_err(|err| MissionError::from_storage(err, || format!("cat {cat_id}")))?;
        if !exists {
            tracing::warn!(cat_id = %cat_id, mission_id = %mission_id, "assignment rejected: cat not found");
            return Err(missing_cat(cat_id));
        }

        let mut tx = self.begin("assign_mission_to_cat").await?;
        let outcome = tx
            .assign_agent(mission_id, cat_id)
            .await
            .map_err(|err| match err {
                StorageError::ForeignKeyViolation { .. } => missing_cat(cat_id),
                err => MissionError::from_storage(err, mission_resource(mission_id)),
            });
        finish(tx, "assign_mission_to_cat", outcome).await?;

        tracing::info!(cat_id = %cat_id, mission_id = %mission_id, "mission assigned");
        Ok(())
    }

    /// Mark a mission completed. Completing twice is not an error.
    pub async fn complete_mission(&self, id: MissionId) -> Result<(), MissionError> {
        let mut tx = self.begin("complete_mission").await?;
        let outcome = tx
            .complete_mission(id)
            .await
            .map_err(|err| MissionError::from_storage(err, mission_resource(id)));
        finish(tx, "complete_mission", outcome).await?;

        tracing::info!(mission_id = %id, "mission completed");
        Ok(())
    }

    /// Move a target onto a mission that is not completed.
    ///
    /// The target leaves its previous mission. Missing rows win over the
    /// completed check when both apply.
    pub async fn add_target_to_mission(
        &self,
        mission_id: MissionId,
        target_id: TargetId,
    ) -> Result<(), MissionError> {
        let mut tx = self.begin("add_target_to_mission").await?;
        let outcome = move_target(&mut tx, mission_id, target_id).await;
        finish(tx, "add_target_to_mission", outcome).await?;

        tracing::info!(mission_id = %mission_id, target_id = %target_id, "target moved");
        Ok(())
    }

    /// Mark a target completed, independently of its mission.
    pub async fn complete_target(&self, id: TargetId) -> Result<(), MissionError> {
        let mut tx = self.begin("complete_target").await?;
        let outcome = tx
            .complete_target(id)
            .await
            .map_err(|err| MissionError::from_storage(err, target_resource(id)));
        finish(tx, "complete_target", outcome).await?;

        tracing::info!(target_id = %id, "target completed");
        Ok(())
    }
}

/// End the transaction according to `outcome`. A failed rollback replaces
/// the operation's error with `Internal` carrying both messages.
async fn finish<Tx, T>(
    tx: Tx,
    operation: &'static str,
    outcome: Result<T, MissionError>,
) -> Result<T, MissionError>
where
    Tx: MissionTx,
{
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|err| {
                tracing::error!(operation, error = %err, "commit failed");
                MissionError::Internal(format!("{operation}: commit failed: {err}"))
            })?;
            Ok(value)
        }
        Err(err) => match tx.rollback().await {
            Ok(()) => {
                if let MissionError::Internal(ref message) = err {
                    tracing::error!(operation, error = %message, "operation failed");
                } else {
                    tracing::warn!(operation, error = %err, "operation rejected");
                }
                Err(err)
            }
            Err(rollback_err) => {
                tracing::error!(
                    operation,
                    error = %err,
                    rollback_error = %rollback_err,
                    "rollback failed"
                );
                Err(MissionError::Internal(format!(
                    "{operation}: {err}; rollback failed: {rollback_err}"
                )))
            }
        },
    }
}

async fn insert_mission_with_targets<Tx: MissionTx>(
    tx: &mut Tx,
    req: &CreateMissionRequest,
) -> Result<MissionId, MissionError> {
    let completion = if req.completed {
        Completion::open().complete()
    } else {
        Completion::open()
    };
    let mission_id = tx
        .insert_mission(req.cat_id, &req.notes, completion)
        .await
        .map_err(|err| match (err, req.cat_id) {
            (StorageError::ForeignKeyViolation { .. }, Some(cat_id)) => missing_cat(cat_id),
            (err, _) => MissionError::from_storage(err, || "mission".to_string()),
        })?;

    for target in &req.targets {
        tx.insert_target(mission_id, target)
            .await
            .map_err(|err| MissionError::from_storage(err, mission_resource(mission_id)))?;
    }

    Ok(mission_id)
}

async fn load_all<Tx: MissionTx>(tx: &mut Tx) -> Result<Vec<Mission>, MissionError> {
    let records = tx
        .list_missions()
        .await
        .map_err(|err| MissionError::from_storage(err, || "missions".to_string()))?;
    let targets = tx
        .list_targets()
        .await
        .map_err(|err| MissionError::from_storage(err, || "targets".to_string()))?;
    Ok(hydrate(records, targets))
}

async fn load_one<Tx: MissionTx>(tx: &mut Tx, id: MissionId) -> Result<Mission, MissionError> {
    let record = tx
        .mission_by_id(id)
        .await
        .map_err(|err| MissionError::from_storage(err, mission_resource(id)))?;
    let targets = tx
        .list_targets()
        .await
        .map_err(|err| MissionError::from_storage(err, || "targets".to_string()))?;
    let own: Vec<Target> = targets.into_iter().filter(|t| t.mission_id == id).collect();
    Ok(into_mission(record, own))
}

async fn move_target<Tx: MissionTx>(
    tx: &mut Tx,
    mission_id: MissionId,
    target_id: TargetId,
) -> Result<(), MissionError> {
    match tx.move_target_to_open_mission(target_id, mission_id).await {
        Ok(()) => Ok(()),
        Err(StorageError::NoRows) => Err(explain_rejected_move(tx, mission_id, target_id).await),
        Err(err) => Err(MissionError::from_storage(err, target_resource(target_id))),
    }
}

/// The conditional move matched nothing; read both rows in the same
/// transaction to report why.
async fn explain_rejected_move<Tx: MissionTx>(
    tx: &mut Tx,
    mission_id: MissionId,
    target_id: TargetId,
) -> MissionError {
    let mission = match tx.mission_by_id(mission_id).await {
        Ok(mission) => mission,
        Err(err) => return MissionError::from_storage(err, mission_resource(mission_id)),
    };
    if let Err(err) = tx.target_by_id(target_id).await {
        return MissionError::from_storage(err, target_resource(target_id));
    }
    if mission.completed.is_completed() {
        return MissionError::MissionCompleted { mission_id };
    }
    MissionError::Internal(format!(
        "move of target {target_id} to mission {mission_id} matched no rows"
    ))
}
