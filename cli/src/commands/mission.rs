use clap::Subcommand;

use spycat_core::mission::{AgentId, CreateMissionRequest, MAX_TARGETS_PER_MISSION, NewTarget};

use crate::util::{api_request, exit_error};

#[derive(Subcommand)]
pub enum MissionCommands {
    /// Create a mission with its initial targets
    Create {
        /// Free-form mission notes
        #[arg(long, default_value = "")]
        notes: String,
        /// Cat to assign the mission to
        #[arg(long)]
        cat_id: Option<i64>,
        /// Target as NAME:COUNTRY[:NOTES] (repeatable, at most 3)
        #[arg(long = "target", value_parser = parse_target)]
        targets: Vec<NewTarget>,
        /// Create the mission already completed
        #[arg(long)]
        completed: bool,
    },
    /// List all missions with their targets
    List,
    /// Get one mission with its targets
    Get {
        /// Mission ID
        #[arg(long)]
        id: i64,
    },
    /// Assign a mission to a cat
    Assign {
        /// Mission ID
        #[arg(long)]
        id: i64,
        /// Cat ID
        #[arg(long)]
        cat_id: i64,
    },
    /// Mark a mission completed
    Complete {
        /// Mission ID
        #[arg(long)]
        id: i64,
    },
}

pub async fn run(api_url: &str, command: MissionCommands) -> i32 {
    match command {
        MissionCommands::Create {
            notes,
            cat_id,
            targets,
            completed,
        } => create(api_url, notes, cat_id, targets, completed).await,
        MissionCommands::List => {
            api_request(api_url, reqwest::Method::GET, "/api/v1/missions", None).await
        }
        MissionCommands::Get { id } => {
            api_request(
                api_url,
                reqwest::Method::GET,
                &format!("/api/v1/missions/{id}"),
                None,
            )
            .await
        }
        MissionCommands::Assign { id, cat_id } => {
            api_request(
                api_url,
                reqwest::Method::PATCH,
                &format!("/api/v1/missions/{id}/cats/{cat_id}"),
                None,
            )
            .await
        }
        MissionCommands::Complete { id } => {
            api_request(
                api_url,
                reqwest::Method::PATCH,
                &format!("/api/v1/missions/{id}"),
                None,
            )
            .await
        }
    }
}

async fn create(
    api_url: &str,
    notes: String,
    cat_id: Option<i64>,
    targets: Vec<NewTarget>,
    completed: bool,
) -> i32 {
    let request = CreateMissionRequest {
        cat_id: cat_id.map(AgentId::from),
        targets,
        notes,
        completed,
    };

    // The server enforces the cap too; failing here saves a round trip.
    if let Err(cap) = request.ensure_target_cap() {
        exit_error(
            &cap.to_string(),
            Some(&format!(
                "Pass --target at most {MAX_TARGETS_PER_MISSION} times"
            )),
        );
    }

    let body = match serde_json::to_value(&request) {
        Ok(v) => v,
        Err(e) => exit_error(&format!("Failed to encode request: {e}"), None),
    };

    api_request(api_url, reqwest::Method::POST, "/api/v1/missions", Some(body)).await
}

/// Parse `NAME:COUNTRY[:NOTES]`. Notes keep any further colons.
pub fn parse_target(raw: &str) -> Result<NewTarget, String> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let country = parts.next().map(str::trim).unwrap_or_default();
    let notes = parts.next().map(str::trim).unwrap_or_default();

    if name.is_empty() || country.is_empty() {
        return Err(format!(
            "invalid target '{raw}': expected NAME:COUNTRY[:NOTES]"
        ));
    }

    Ok(NewTarget {
        name: name.to_string(),
        country: country.to_string(),
        notes: notes.to_string(),
    })
}
