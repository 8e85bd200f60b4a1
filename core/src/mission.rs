//! Missions, their targets and the agents ("cats") they are assigned to.
//!
//! Identifiers are assigned by the store. A mission owns the targets whose
//! `mission_id` points at it, but targets can be moved between missions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A mission may be created with at most this many targets.
pub const MAX_TARGETS_PER_MISSION: usize = 3;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Store-assigned mission identifier
    MissionId
);
id_type!(
    /// Store-assigned target identifier
    TargetId
);
id_type!(
    /// Identifier of a cat (agent). Cats are managed elsewhere.
    AgentId
);

/// Completion state of a mission or target.
///
/// New rows start [`Completion::open`]; the only transition is
/// [`Completion::complete`]. There is no way back to open. The plain flag
/// is only read at the boundaries: JSON via serde and storage rows via
/// [`Completion::from_stored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Completion {
    completed: bool,
}

impl Completion {
    pub const fn open() -> Self {
        Self { completed: false }
    }

    /// Rebuild the state a storage backend persisted.
    pub const fn from_stored(completed: bool) -> Self {
        Self { completed }
    }

    pub fn is_completed(self) -> bool {
        self.completed
    }

    /// `Open -> Completed`; completing twice yields the same state.
    #[must_use]
    pub fn complete(self) -> Self {
        Self { completed: true }
    }
}

impl From<Completion> for bool {
    fn from(state: Completion) -> Self {
        state.is_completed()
    }
}

/// A location or person of interest. Belongs to exactly one mission at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Target {
    pub id: TargetId,
    pub mission_id: MissionId,
    pub name: String,
    pub country: String,
    pub notes: String,
    #[schema(value_type = bool)]
    pub completed: Completion,
    pub created_at: DateTime<Utc>,
}

/// A mission with its targets hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Mission {
    pub id: MissionId,
    /// Assigned cat, if any
    pub cat_id: Option<AgentId>,
    pub notes: String,
    #[schema(value_type = bool)]
    pub completed: Completion,
    /// Every target whose `mission_id` equals this mission's id. Order is not meaningful.
    pub targets: Vec<Target>,
    pub created_at: DateTime<Utc>,
}

/// Target payload inside a mission creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewTarget {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub notes: String,
}

/// Request to create a mission together with its initial targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateMissionRequest {
    #[serde(default)]
    pub cat_id: Option<AgentId>,
    #[serde(default)]
    pub targets: Vec<NewTarget>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a mission accepts at most {max} targets, got {count}")]
pub struct TargetCapExceeded {
    pub count: usize,
    pub max: usize,
}

impl CreateMissionRequest {
    pub fn ensure_target_cap(&self) -> Result<(), TargetCapExceeded> {
        let count = self.targets.len();
        if count > MAX_TARGETS_PER_MISSION {
            return Err(TargetCapExceeded {
                count,
                max: MAX_TARGETS_PER_MISSION,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(name: &str) -> NewTarget {
        NewTarget {
            name: name.to_string(),
            country: "UA".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn completion_only_moves_forward() {
        let open = Completion::default();
        assert!(!open.is_completed());
        let done = open.complete();
        assert!(done.is_completed());
        assert_eq!(done.complete(), done);
        assert_eq!(Completion::open(), open);
    }

    #[test]
    fn completion_serializes_as_flag() {
        let done = Completion::open().complete();
        assert_eq!(serde_json::to_value(done).unwrap(), json!(true));
        assert_eq!(serde_json::to_value(Completion::open()).unwrap(), json!(false));
        let parsed: Completion = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(parsed, done);
    }

    #[test]
    fn stored_flag_round_trips() {
        assert!(Completion::from_stored(true).is_completed());
        assert_eq!(Completion::from_stored(false), Completion::open());
        assert!(bool::from(Completion::from_stored(true)));
    }

    #[test]
    fn create_request_defaults_optional_fields() {
        let req: CreateMissionRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.cat_id, None);
        assert!(req.targets.is_empty());
        assert_eq!(req.notes, "");
        assert!(!req.completed);
    }

    #[test]
    fn target_cap_allows_three() {
        let req = CreateMissionRequest {
            targets: vec![target("a"), target("b"), target("c")],
            ..Default::default()
        };
        assert!(req.ensure_target_cap().is_ok());
    }

    #[test]
    fn target_cap_rejects_four() {
        let req = CreateMissionRequest {
            targets: vec![target("a"), target("b"), target("c"), target("d")],
            ..Default::default()
        };
        assert_eq!(
            req.ensure_target_cap(),
            Err(TargetCapExceeded { count: 4, max: 3 })
        );
    }

    #[test]
    fn mission_json_uses_plain_ids() {
        let mission = Mission {
            id: MissionId(7),
            cat_id: Some(AgentId(2)),
            notes: "recon".to_string(),
            completed: Completion::open(),
            targets: Vec::new(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&mission).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["cat_id"], json!(2));
        assert_eq!(value["completed"], json!(false));
    }
}
