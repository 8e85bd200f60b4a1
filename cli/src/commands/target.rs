use clap::Subcommand;

use crate::util::api_request;

#[derive(Subcommand)]
pub enum TargetCommands {
    /// Mark a target completed
    Complete {
        /// Target ID
        #[arg(long)]
        id: i64,
    },
    /// Move a target onto another (open) mission
    Move {
        /// Target ID
        #[arg(long)]
        id: i64,
        /// Destination mission ID
        #[arg(long)]
        mission_id: i64,
    },
}

pub async fn run(api_url: &str, command: TargetCommands) -> i32 {
    match command {
        TargetCommands::Complete { id } => {
            api_request(
                api_url,
                reqwest::Method::PATCH,
                &format!("/api/v1/targets/{id}"),
                None,
            )
            .await
        }
        TargetCommands::Move { id, mission_id } => {
            api_request(
                api_url,
                reqwest::Method::PATCH,
                &format!("/api/v1/missions/{mission_id}/targets/{id}"),
                None,
            )
            .await
        }
    }
}
