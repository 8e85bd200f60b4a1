//! In-process backend used by the engine and route tests.
//!
//! One transaction at a time holds the table lock; it edits a private copy
//! that replaces the shared tables only on commit. The same foreign-key rules
//! as the Postgres schema are enforced. [`Faults`] switch on failures the
//! real database produces rarely.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use spycat_core::mission::{AgentId, Completion, MissionId, NewTarget, Target, TargetId};

use super::{
    AgentLookup, StoreHealth, MissionRecord, MissionTx, StorageError, TransactionManager,
};

const MISSION_CAT_FK: &str = "missions_cat_id_fkey";
const TARGET_MISSION_FK: &str = "targets_mission_id_fkey";

#[derive(Debug, Clone, Default)]
struct Tables {
    cats: BTreeSet<AgentId>,
    missions: BTreeMap<MissionId, MissionRecord>,
    targets: BTreeMap<TargetId, Target>,
    next_mission_id: i64,
    next_target_id: i64,
}

impl Tables {
    fn check_cat(&self, cat_id: Option<AgentId>) -> Result<(), StorageError> {
        match cat_id {
            Some(id) if !self.cats.contains(&id) => Err(StorageError::ForeignKeyViolation {
                constraint: MISSION_CAT_FK.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Failures injected into transactions opened after [`MemoryStore::inject`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// The n-th `insert_target` of a transaction (1-based) fails.
    pub target_insert: Option<usize>,
    pub commit: bool,
    pub rollback: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_cat(&self, id: AgentId) {
        self.tables.lock().await.cats.insert(id);
    }

    pub async fn inject(&self, faults: Faults) {
        *self.faults.lock().await = faults;
    }

    pub async fn mission_count(&self) -> usize {
        self.tables.lock().await.missions.len()
    }

    pub async fn target_count(&self) -> usize {
        self.tables.lock().await.targets.len()
    }
}

impl TransactionManager for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StorageError> {
        let faults = *self.faults.lock().await;
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            faults,
            targets_inserted: 0,
        })
    }
}

impl AgentLookup for MemoryStore {
    async fn agent_exists(&self, id: AgentId) -> Result<bool, StorageError> {
        Ok(self.tables.lock().await.cats.contains(&id))
    }
}

impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Faults,
    targets_inserted: usize,
}

impl MissionTx for MemoryTx {
    async fn insert_mission(
        &mut self,
        cat_id: Option<AgentId>,
        notes: &str,
        completed: Completion,
    ) -> Result<MissionId, StorageError> {
        self.working.check_cat(cat_id)?;
        self.working.next_mission_id += 1;
        let id = MissionId(self.working.next_mission_id);
        self.working.missions.insert(
            id,
            MissionRecord {
                id,
                cat_id,
                notes: notes.to_string(),
                completed,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn insert_target(
        &mut self,
        mission_id: MissionId,
        target: &NewTarget,
    ) -> Result<TargetId, StorageError> {
        self.targets_inserted += 1;
        if self.faults.target_insert == Some(self.targets_inserted) {
            return Err(StorageError::Backend(format!(
                "injected failure on target insert {}",
                self.targets_inserted
            )));
        }
        if !self.working.missions.contains_key(&mission_id) {
            return Err(StorageError::ForeignKeyViolation {
                constraint: TARGET_MISSION_FK.to_string(),
            });
        }
        self.working.next_target_id += 1;
        let id = TargetId(self.working.next_target_id);
        self.working.targets.insert(
            id,
            Target {
                id,
                mission_id,
                name: target.name.clone(),
                country: target.country.clone(),
                notes: target.notes.clone(),
                completed: Completion::open(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn mission_by_id(&mut self, id: MissionId) -> Result<MissionRecord, StorageError> {
        self.working
            .missions
            .get(&id)
            .cloned()
            .ok_or(StorageError::NoRows)
    }

    async fn target_by_id(&mut self, id: TargetId) -> Result<Target, StorageError> {
        self.working
            .targets
            .get(&id)
            .cloned()
            .ok_or(StorageError::NoRows)
    }

    async fn list_missions(&mut self) -> Result<Vec<MissionRecord>, StorageError> {
        Ok(self.working.missions.values().rev().cloned().collect())
    }

    async fn list_targets(&mut self) -> Result<Vec<Target>, StorageError> {
        Ok(self.working.targets.values().rev().cloned().collect())
    }

    async fn assign_agent(
        &mut self,
        mission_id: MissionId,
        agent_id: AgentId,
    ) -> Result<(), StorageError> {
        if !self.working.missions.contains_key(&mission_id) {
            return Err(StorageError::NoRows);
        }
        self.working.check_cat(Some(agent_id))?;
        if let Some(mission) = self.working.missions.get_mut(&mission_id) {
            mission.cat_id = Some(agent_id);
        }
        Ok(())
    }

    async fn complete_mission(&mut self, id: MissionId) -> Result<(), StorageError> {
        let mission = self
            .working
            .missions
            .get_mut(&id)
            .ok_or(StorageError::NoRows)?;
        mission.completed = mission.completed.complete();
        Ok(())
    }

    async fn complete_target(&mut self, id: TargetId) -> Result<(), StorageError> {
        let target = self
            .working
            .targets
            .get_mut(&id)
            .ok_or(StorageError::NoRows)?;
        target.completed = target.completed.complete();
        Ok(())
    }

    async fn move_target_to_open_mission(
        &mut self,
        target_id: TargetId,
        mission_id: MissionId,
    ) -> Result<(), StorageError> {
        let open = self
            .working
            .missions
            .get(&mission_id)
            .is_some_and(|m| !m.completed.is_completed());
        match self.working.targets.get_mut(&target_id) {
            Some(target) if open => {
                target.mission_id = mission_id;
                Ok(())
            }
            _ => Err(StorageError::NoRows),
        }
    }

    async fn commit(self) -> Result<(), StorageError> {
        if self.faults.commit {
            return Err(StorageError::Backend("injected commit failure".to_string()));
        }
        let MemoryTx {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        if self.faults.rollback {
            return Err(StorageError::Backend("injected rollback failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_target(name: &str) -> NewTarget {
        NewTarget {
            name: name.to_string(),
            country: "DE".to_string(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mission = tx.insert_mission(None, "n", Completion::open()).await.unwrap();
        tx.insert_target(mission, &new_target("a")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.mission_count().await, 1);
        assert_eq!(store.target_count().await, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_mission(None, "n", Completion::open()).await.unwrap();
        drop(tx);

        assert_eq!(store.mission_count().await, 0);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_mission(None, "n", Completion::open()).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.mission_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_cat_violates_foreign_key() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_mission(Some(AgentId(9)), "n", Completion::open())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StorageError::ForeignKeyViolation {
                constraint: MISSION_CAT_FK.to_string()
            }
        );
    }

    #[tokio::test]
    async fn duplicate_target_names_are_allowed() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mission = tx.insert_mission(None, "n", Completion::open()).await.unwrap();
        let first = tx.insert_target(mission, &new_target("a")).await.unwrap();
        let second = tx.insert_target(mission, &new_target("a")).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn injected_target_failure_hits_only_the_nth_insert() {
        let store = MemoryStore::new();
        store
            .inject(Faults {
                target_insert: Some(2),
                ..Faults::default()
            })
            .await;
        let mut tx = store.begin().await.unwrap();
        let mission = tx.insert_mission(None, "n", Completion::open()).await.unwrap();
        tx.insert_target(mission, &new_target("a")).await.unwrap();
        assert!(matches!(
            tx.insert_target(mission, &new_target("b")).await,
            Err(StorageError::Backend(_))
        ));
        tx.insert_target(mission, &new_target("c")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_commit_publishes_nothing() {
        let store = MemoryStore::new();
        store
            .inject(Faults {
                commit: true,
                ..Faults::default()
            })
            .await;
        let mut tx = store.begin().await.unwrap();
        tx.insert_mission(None, "n", Completion::open()).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.mission_count().await, 0);
    }

    #[tokio::test]
    async fn conditional_move_requires_open_mission() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_mission(None, "first", Completion::open()).await.unwrap();
        let target = tx.insert_target(first, &new_target("a")).await.unwrap();
        let closed = tx.insert_mission(None, "closed", Completion::open().complete()).await.unwrap();
        let open = tx.insert_mission(None, "open", Completion::open()).await.unwrap();

        assert_eq!(
            tx.move_target_to_open_mission(target, closed).await,
            Err(StorageError::NoRows)
        );
        assert_eq!(
            tx.move_target_to_open_mission(target, MissionId(99)).await,
            Err(StorageError::NoRows)
        );
        tx.move_target_to_open_mission(target, open).await.unwrap();
        assert_eq!(tx.target_by_id(target).await.unwrap().mission_id, open);
    }

    #[tokio::test]
    async fn update_of_missing_row_reports_no_rows() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.complete_mission(MissionId(1)).await,
            Err(StorageError::NoRows)
        );
        assert_eq!(
            tx.complete_target(TargetId(1)).await,
            Err(StorageError::NoRows)
        );
        assert_eq!(
            tx.assign_agent(MissionId(1), AgentId(1)).await,
            Err(StorageError::NoRows)
        );
    }
}
