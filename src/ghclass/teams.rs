//! Team management for student access control.

use log::info;

use crate::errors::Result;
use crate::github::GitHubApi;

/// Create one team per student and put the student on it. `setup` runs
/// this implicitly; on its own it is useful when student accounts were
/// activated after the repositories were created.
pub async fn add_students_to_teams(students: &[String], api: &GitHubApi) -> Result<()> {
    let teams = api.ensure_teams_and_members(students).await?;
    info!("{} students are on their teams", teams.len());
    Ok(())
}
